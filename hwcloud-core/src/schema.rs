//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type and data source,
//! enabling type validation before any API call is made.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Unordered collection of unique values
    Set(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block, stored as a list of maps
    Block(Box<BlockSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    ///
    /// Values that are not known until apply (references, templates) pass
    /// any check; they are validated again once resolved.
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        if matches!(
            value,
            Value::ResourceRef(_) | Value::Template(_) | Value::Unknown
        ) {
            return Ok(());
        }

        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(block), Value::List(items)) => block.validate_items(items),

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        match self {
            AttributeType::Set(_) => true,
            AttributeType::Block(block) => block.set,
            _ => false,
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", .expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedOnly { name: String },

    #[error("Attribute '{name}' conflicts with '{other}'")]
    ConflictsWith { name: String, other: String },

    #[error("One of {} must be specified", .names.join(", "))]
    AtLeastOneOf { names: Vec<String> },

    #[error("Too many '{name}' blocks: at most {max} allowed")]
    TooManyBlocks { name: String, max: usize },

    #[error("Invalid duration '{value}': expected a number followed by s, m or h")]
    InvalidDuration { value: String },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Changing this attribute replaces the resource
    pub force_new: bool,
    /// Value is masked in plan output
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Deprecation message shown when the attribute is set
    pub deprecated: Option<String>,
    pub conflicts_with: Vec<String>,
    pub at_least_one_of: Vec<String>,
}

impl AttributeSchema {
    /// Create an optional attribute
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            optional: true,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            deprecated: None,
            conflicts_with: Vec::new(),
            at_least_one_of: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Optional attribute whose value the provider fills in when unset
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Attribute set only by the provider
    pub fn computed_only(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self.required = false;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.conflicts_with = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn at_least_one_of(mut self, names: &[&str]) -> Self {
        self.at_least_one_of = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// True when configuration may not set this attribute
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Schema of a nested block
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    pub attributes: HashMap<String, AttributeSchema>,
    /// Blocks are unordered
    pub set: bool,
    pub max_items: Option<usize>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn as_set(mut self) -> Self {
        self.set = true;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    fn validate_items(&self, items: &[Value]) -> Result<(), TypeError> {
        for (i, item) in items.iter().enumerate() {
            let wrap = |e: TypeError| TypeError::ListItemError {
                index: i,
                inner: Box::new(e),
            };
            let map = match item {
                Value::Map(map) => map,
                Value::Unknown => continue,
                other => {
                    return Err(wrap(TypeError::TypeMismatch {
                        expected: "Block".to_string(),
                        got: other.type_name(),
                    }));
                }
            };
            if let Some(e) = validate_attributes(&self.attributes, map).into_iter().next() {
                return Err(wrap(e));
            }
        }
        Ok(())
    }
}

/// Whether a schema describes a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Resource,
    DataSource,
}

/// Operation a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Create,
    Read,
    Update,
    Delete,
}

impl TimeoutKind {
    fn key(&self) -> &'static str {
        match self {
            TimeoutKind::Create => "create",
            TimeoutKind::Read => "read",
            TimeoutKind::Update => "update",
            TimeoutKind::Delete => "delete",
        }
    }
}

/// Default operation timeouts declared by a resource
#[derive(Debug, Clone, Default)]
pub struct Timeouts {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl Timeouts {
    pub fn get(&self, kind: TimeoutKind) -> Option<Duration> {
        match kind {
            TimeoutKind::Create => self.create,
            TimeoutKind::Read => self.read,
            TimeoutKind::Update => self.update,
            TimeoutKind::Delete => self.delete,
        }
    }

    fn is_empty(&self) -> bool {
        self.create.is_none() && self.read.is_none() && self.update.is_none() && self.delete.is_none()
    }
}

/// Name of the block used to override operation timeouts
pub const TIMEOUTS_BLOCK: &str = "timeouts";

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub kind: ResourceKind,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub timeouts: Timeouts,
    pub importable: bool,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            kind: ResourceKind::Resource,
            attributes: HashMap::new(),
            description: None,
            timeouts: Timeouts::default(),
            importable: false,
        }
    }

    pub fn data_source(resource_type: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::DataSource,
            ..Self::new(resource_type)
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn importable(mut self) -> Self {
        self.importable = true;
        self
    }

    /// Validate resource attributes, collecting every error
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        let mut user_attributes = attributes.clone();
        if let Some(block) = user_attributes.remove(TIMEOUTS_BLOCK) {
            if self.timeouts.is_empty() {
                errors.push(TypeError::UnknownAttribute {
                    name: TIMEOUTS_BLOCK.to_string(),
                });
            } else if let Err(e) = self.validate_timeouts(&block) {
                errors.push(e);
            }
        }

        errors.extend(validate_attributes(&self.attributes, &user_attributes));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Warnings for deprecated attributes set in configuration
    pub fn deprecation_warnings(&self, attributes: &HashMap<String, Value>) -> Vec<String> {
        let mut warnings: Vec<String> = attributes
            .keys()
            .filter_map(|name| {
                let schema = self.attributes.get(name)?;
                let message = schema.deprecated.as_ref()?;
                Some(format!("Attribute '{}' is deprecated: {}", name, message))
            })
            .collect();
        warnings.sort();
        warnings
    }

    /// Timeout for an operation: the `timeouts` block wins over the default
    pub fn timeout(&self, attributes: &HashMap<String, Value>, kind: TimeoutKind) -> Option<Duration> {
        let configured = attributes
            .get(TIMEOUTS_BLOCK)
            .and_then(|v| v.as_list())
            .and_then(|items| items.first())
            .and_then(|item| item.as_map())
            .and_then(|map| map.get(kind.key()))
            .and_then(|v| v.as_str())
            .and_then(|s| parse_duration(s).ok());
        configured.or_else(|| self.timeouts.get(kind))
    }

    fn validate_timeouts(&self, block: &Value) -> Result<(), TypeError> {
        let wrap = |e: TypeError| TypeError::AttributeError {
            name: TIMEOUTS_BLOCK.to_string(),
            inner: Box::new(e),
        };
        let items = block.as_list().ok_or_else(|| {
            wrap(TypeError::TypeMismatch {
                expected: "Block".to_string(),
                got: block.type_name(),
            })
        })?;
        if items.len() > 1 {
            return Err(TypeError::TooManyBlocks {
                name: TIMEOUTS_BLOCK.to_string(),
                max: 1,
            });
        }
        for item in items {
            let Some(map) = item.as_map() else {
                return Err(wrap(TypeError::TypeMismatch {
                    expected: "Block".to_string(),
                    got: item.type_name(),
                }));
            };
            for (key, value) in map {
                let kind = match key.as_str() {
                    "create" => TimeoutKind::Create,
                    "read" => TimeoutKind::Read,
                    "update" => TimeoutKind::Update,
                    "delete" => TimeoutKind::Delete,
                    _ => return Err(wrap(TypeError::UnknownAttribute { name: key.clone() })),
                };
                if self.timeouts.get(kind).is_none() {
                    return Err(wrap(TypeError::UnknownAttribute { name: key.clone() }));
                }
                types::duration().validate(value).map_err(wrap)?;
            }
        }
        Ok(())
    }
}

fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> Vec<TypeError> {
    let mut errors = Vec::new();

    let mut names: Vec<&String> = schemas.keys().collect();
    names.sort();

    for name in &names {
        let schema = &schemas[*name];
        if schema.required && !attributes.contains_key(*name) && schema.default.is_none() {
            errors.push(TypeError::MissingRequired {
                name: (*name).clone(),
            });
        }
    }

    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();

    for name in keys {
        let value = &attributes[name];
        let Some(schema) = schemas.get(name) else {
            errors.push(TypeError::UnknownAttribute { name: name.clone() });
            continue;
        };
        if schema.is_computed_only() {
            errors.push(TypeError::ComputedOnly { name: name.clone() });
            continue;
        }
        if let Err(e) = schema.attr_type.validate(value) {
            errors.push(TypeError::AttributeError {
                name: name.clone(),
                inner: Box::new(e),
            });
        }
        if let AttributeType::Block(block) = &schema.attr_type
            && let (Some(max), Some(items)) = (block.max_items, value.as_list())
            && items.len() > max
        {
            errors.push(TypeError::TooManyBlocks {
                name: name.clone(),
                max,
            });
        }
        for other in &schema.conflicts_with {
            // Report each conflicting pair once
            if attributes.contains_key(other) && name < other {
                errors.push(TypeError::ConflictsWith {
                    name: name.clone(),
                    other: other.clone(),
                });
            }
        }
    }

    let mut reported: Vec<Vec<String>> = Vec::new();
    for name in names {
        let group = &schemas[name].at_least_one_of;
        if group.is_empty() {
            continue;
        }
        let mut sorted = group.clone();
        sorted.sort();
        if reported.contains(&sorted) {
            continue;
        }
        if !group.iter().any(|n| attributes.contains_key(n)) {
            errors.push(TypeError::AtLeastOneOf {
                names: sorted.clone(),
            });
        }
        reported.push(sorted);
    }

    errors
}

/// Parse durations such as `30s`, `15m`, `1h` or `1h30m`
pub fn parse_duration(input: &str) -> Result<Duration, TypeError> {
    let invalid = || TypeError::InvalidDuration {
        value: input.to_string(),
    };

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            _ => return Err(invalid()),
        };
        total += n * unit;
        digits.clear();
    }
    if !digits.is_empty() || total == 0 && !input.trim().starts_with('0') {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// Duration string (e.g., "50m")
    pub fn duration() -> AttributeType {
        AttributeType::Custom {
            name: "Duration".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => parse_duration(s).map(|_| ()).map_err(|e| e.to_string()),
                _ => Err("Expected string".to_string()),
            },
        }
    }
}
