//! Parser - Parse HCL configuration files
//!
//! Convert a subset of HCL into resources using pest

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;
use std::collections::HashMap;

use crate::resource::{PathStep, Reference, Resource, ResourceId, TemplatePart, Value};

#[derive(Parser)]
#[grammar = "parser/hcl.pest"]
struct HclParser;

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Invalid expression at line {line}: {message}")]
    InvalidExpression { line: usize, message: String },

    #[error("Duplicate {kind} at line {line}: {name}")]
    Duplicate {
        kind: &'static str,
        name: String,
        line: usize,
    },
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub attributes: HashMap<String, Value>,
}

/// Parse result
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub providers: Vec<ProviderConfig>,
    /// Managed resources and data sources in declaration order
    pub resources: Vec<Resource>,
}

impl ParsedFile {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Parse an HCL file
pub fn parse(input: &str) -> Result<ParsedFile, ParseError> {
    let pairs = HclParser::parse(Rule::file, input).map_err(Box::new)?;

    let mut parsed = ParsedFile::default();

    for pair in pairs {
        if pair.as_rule() != Rule::file {
            continue;
        }
        for block in pair.into_inner() {
            let line = line_of(&block);
            match block.as_rule() {
                Rule::provider_block => {
                    let provider = parse_provider_block(block)?;
                    if parsed.provider(&provider.name).is_some() {
                        return Err(ParseError::Duplicate {
                            kind: "provider",
                            name: provider.name,
                            line,
                        });
                    }
                    parsed.providers.push(provider);
                }
                Rule::resource_block | Rule::data_block => {
                    let resource = parse_resource_block(block)?;
                    if parsed.resources.iter().any(|r| r.id == resource.id) {
                        return Err(ParseError::Duplicate {
                            kind: "resource",
                            name: resource.id.to_string(),
                            line,
                        });
                    }
                    parsed.resources.push(resource);
                }
                _ => {}
            }
        }
    }

    Ok(parsed)
}

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, line: usize, what: &str) -> Result<Pair<'i, Rule>, ParseError> {
    pairs.next().ok_or_else(|| ParseError::InvalidExpression {
        line,
        message: format!("expected {}", what),
    })
}

fn parse_provider_block(pair: Pair<Rule>) -> Result<ProviderConfig, ParseError> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let name = label_text(next_pair(&mut inner, line, "provider name")?);
    let attributes = parse_body(next_pair(&mut inner, line, "block body")?)?;
    Ok(ProviderConfig { name, attributes })
}

fn parse_resource_block(pair: Pair<Rule>) -> Result<Resource, ParseError> {
    let line = line_of(&pair);
    let is_data = pair.as_rule() == Rule::data_block;
    let mut inner = pair.into_inner();
    let resource_type = label_text(next_pair(&mut inner, line, "resource type")?);
    let name = label_text(next_pair(&mut inner, line, "resource name")?);
    if resource_type.is_empty() || name.is_empty() {
        return Err(ParseError::InvalidExpression {
            line,
            message: "block labels must not be empty".to_string(),
        });
    }
    let attributes = parse_body(next_pair(&mut inner, line, "block body")?)?;

    let id = if is_data {
        ResourceId::data(resource_type, name)
    } else {
        ResourceId::new(resource_type, name)
    };
    Ok(Resource { id, attributes })
}

fn label_text(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// Parse a block body; nested blocks with the same name collect into a list of maps
fn parse_body(pair: Pair<Rule>) -> Result<HashMap<String, Value>, ParseError> {
    let mut attributes: HashMap<String, Value> = HashMap::new();
    let mut nested_blocks: Vec<(String, Vec<Value>)> = Vec::new();

    for content in pair.into_inner() {
        let line = line_of(&content);
        match content.as_rule() {
            Rule::attribute => {
                let mut inner = content.into_inner();
                let key = next_pair(&mut inner, line, "attribute name")?.as_str().to_string();
                // `attr = null` leaves the attribute unset
                let Some(value) = parse_optional_expression(next_pair(&mut inner, line, "expression")?)?
                else {
                    continue;
                };
                if attributes.insert(key.clone(), value).is_some() {
                    return Err(ParseError::Duplicate {
                        kind: "attribute",
                        name: key,
                        line,
                    });
                }
            }
            Rule::nested_block => {
                let mut inner = content.into_inner();
                let name = next_pair(&mut inner, line, "block name")?.as_str().to_string();
                let body = parse_body(next_pair(&mut inner, line, "block body")?)?;
                match nested_blocks.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, blocks)) => blocks.push(Value::Map(body)),
                    None => nested_blocks.push((name, vec![Value::Map(body)])),
                }
            }
            _ => {}
        }
    }

    for (name, blocks) in nested_blocks {
        if attributes.contains_key(&name) {
            return Err(ParseError::Duplicate {
                kind: "attribute",
                name,
                line: 0,
            });
        }
        attributes.insert(name, Value::List(blocks));
    }

    Ok(attributes)
}

/// Parse an expression; `null` yields `None`
fn parse_optional_expression(pair: Pair<Rule>) -> Result<Option<Value>, ParseError> {
    let line = line_of(&pair);
    match pair.as_rule() {
        Rule::null => Ok(None),
        Rule::boolean => Ok(Some(Value::Bool(pair.as_str() == "true"))),
        Rule::number => {
            let n: i64 = pair.as_str().parse().map_err(|_| ParseError::InvalidExpression {
                line,
                message: format!("number out of range: {}", pair.as_str()),
            })?;
            Ok(Some(Value::Int(n)))
        }
        Rule::string => parse_string(pair).map(Some),
        Rule::list => {
            let mut items = Vec::new();
            for item in pair.into_inner() {
                if let Some(v) = parse_optional_expression(item)? {
                    items.push(v);
                }
            }
            Ok(Some(Value::List(items)))
        }
        Rule::object => {
            let mut map = HashMap::new();
            for entry in pair.into_inner() {
                let line = line_of(&entry);
                let mut inner = entry.into_inner();
                let key_pair = next_pair(&mut inner, line, "object key")?;
                let key = match key_pair.as_rule() {
                    Rule::string => match parse_string(key_pair)? {
                        Value::String(s) => s,
                        _ => {
                            return Err(ParseError::InvalidExpression {
                                line,
                                message: "object keys cannot be interpolated".to_string(),
                            });
                        }
                    },
                    _ => key_pair.as_str().to_string(),
                };
                if let Some(v) = parse_optional_expression(next_pair(&mut inner, line, "expression")?)? {
                    map.insert(key, v);
                }
            }
            Ok(Some(Value::Map(map)))
        }
        Rule::traversal => parse_traversal(pair).map(|r| Some(Value::ResourceRef(r))),
        other => Err(ParseError::InvalidExpression {
            line,
            message: format!("unexpected {:?}", other),
        }),
    }
}

/// Parse a string literal, producing a Template when it interpolates
fn parse_string(pair: Pair<Rule>) -> Result<Value, ParseError> {
    let mut parts: Vec<TemplatePart> = Vec::new();
    let mut literal = String::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::literal_chars => literal.push_str(part.as_str()),
            Rule::escape => literal.push(match &part.as_str()[1..] {
                "n" => '\n',
                "t" => '\t',
                "r" => '\r',
                "\"" => '"',
                "$" => '$',
                _ => '\\',
            }),
            Rule::interpolation => {
                let line = line_of(&part);
                let mut inner = part.into_inner();
                let reference = parse_traversal(next_pair(&mut inner, line, "reference")?)?;
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(TemplatePart::Interpolation(reference));
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        return Ok(Value::String(literal));
    }
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    // "${ref}" alone keeps the referenced value's type
    if let [TemplatePart::Interpolation(reference)] = parts.as_slice() {
        return Ok(Value::ResourceRef(reference.clone()));
    }
    Ok(Value::Template(parts))
}

/// `type.name.attr...` or `data.type.name.attr...`
fn parse_traversal(pair: Pair<Rule>) -> Result<Reference, ParseError> {
    let line = line_of(&pair);
    let text = pair.as_str().to_string();
    let invalid = |message: &str| ParseError::InvalidExpression {
        line,
        message: format!("{}: {}", message, text),
    };

    let mut steps: Vec<PathStep> = Vec::new();
    for step in pair.into_inner() {
        match step.as_rule() {
            Rule::identifier => steps.push(PathStep::Attr(step.as_str().to_string())),
            Rule::index => {
                let i: usize = step
                    .as_str()
                    .parse()
                    .map_err(|_| invalid("index out of range"))?;
                steps.push(PathStep::Index(i));
            }
            _ => {}
        }
    }

    let attr = |step: Option<&PathStep>| match step {
        Some(PathStep::Attr(s)) => Some(s.clone()),
        _ => None,
    };

    let is_data = matches!(steps.first(), Some(PathStep::Attr(s)) if s == "data");
    let skip = if is_data { 1 } else { 0 };
    let resource_type = attr(steps.get(skip)).ok_or_else(|| invalid("expected resource type"))?;
    let name = attr(steps.get(skip + 1)).ok_or_else(|| invalid("expected resource name"))?;
    let path: Vec<PathStep> = steps.into_iter().skip(skip + 2).collect();
    if !matches!(path.first(), Some(PathStep::Attr(_))) {
        return Err(invalid("reference must name an attribute"));
    }

    let target = if is_data {
        ResourceId::data(resource_type, name)
    } else {
        ResourceId::new(resource_type, name)
    };
    Ok(Reference::new(target, path))
}
