//! Resource - Representing resources and their state

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Whether a block declares a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub mode: ResourceMode,
    /// Resource type (e.g., "huaweicloud_apig_group")
    pub resource_type: String,
    /// Resource name (second label of the block)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn is_data_source(&self) -> bool {
        self.mode == ResourceMode::Data
    }

    /// Parse an address such as `huaweicloud_apig_group.test` or
    /// `data.huaweicloud_dds_instances.test`
    pub fn parse_address(address: &str) -> Option<Self> {
        let parts: Vec<&str> = address.split('.').collect();
        match parts.as_slice() {
            ["data", resource_type, name] if !resource_type.is_empty() && !name.is_empty() => {
                Some(Self::data(*resource_type, *name))
            }
            [resource_type, name] if !resource_type.is_empty() && !name.is_empty() => {
                Some(Self::new(*resource_type, *name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ResourceMode::Managed => write!(f, "{}.{}", self.resource_type, self.name),
            ResourceMode::Data => write!(f, "data.{}.{}", self.resource_type, self.name),
        }
    }
}

/// One step of a reference path after the resource address
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    Attr(String),
    Index(usize),
}

/// Reference to an attribute of another resource (e.g., `huaweicloud_vpc.test.id`)
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub target: ResourceId,
    pub path: Vec<PathStep>,
}

impl Reference {
    pub fn new(target: ResourceId, path: Vec<PathStep>) -> Self {
        Self { target, path }
    }

    /// Shorthand for a single attribute reference
    pub fn attr(target: ResourceId, attribute: impl Into<String>) -> Self {
        Self {
            target,
            path: vec![PathStep::Attr(attribute.into())],
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        for step in &self.path {
            match step {
                PathStep::Attr(name) => write!(f, ".{}", name)?,
                PathStep::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Interpolation(Reference),
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute
    ResourceRef(Reference),
    /// String with `${...}` interpolations
    Template(Vec<TemplatePart>),
    /// Value that will only be known after apply
    Unknown,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Zero values: empty string, 0, false, empty collections
    pub fn is_zero(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Int(i) => *i == 0,
            Value::Bool(b) => !*b,
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    /// True when the value contains no references, templates or unknowns
    pub fn is_known(&self) -> bool {
        match self {
            Value::ResourceRef(_) | Value::Template(_) | Value::Unknown => false,
            Value::List(items) => items.iter().all(Value::is_known),
            Value::Map(map) => map.values().all(Value::is_known),
            _ => true,
        }
    }

    /// Collect every reference contained in this value
    pub fn references(&self) -> Vec<&Reference> {
        let mut refs = Vec::new();
        collect_references(self, &mut refs);
        refs
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(r) => format!("ResourceRef({})", r),
            Value::Template(_) => "Template".to_string(),
            Value::Unknown => "Unknown".to_string(),
        }
    }
}

fn collect_references<'a>(value: &'a Value, out: &mut Vec<&'a Reference>) {
    match value {
        Value::ResourceRef(r) => out.push(r),
        Value::Template(parts) => {
            for part in parts {
                if let TemplatePart::Interpolation(r) = part {
                    out.push(r);
                }
            }
        }
        Value::List(items) => items.iter().for_each(|v| collect_references(v, out)),
        Value::Map(map) => map.values().for_each(|v| collect_references(v, out)),
        _ => {}
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::String).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Sets are stored as sorted lists
impl From<BTreeSet<String>> for Value {
    fn from(items: BTreeSet<String>) -> Self {
        Value::List(items.into_iter().map(Value::String).collect())
    }
}

impl From<HashMap<String, String>> for Value {
    fn from(map: HashMap<String, String>) -> Self {
        Value::Map(
            map.into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::data(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.id.is_data_source()
    }

    /// Resources this one references, deduplicated, in first-seen order
    pub fn dependencies(&self) -> Vec<ResourceId> {
        let mut keys: Vec<&String> = self.attributes.keys().collect();
        keys.sort();
        let mut deps: Vec<ResourceId> = Vec::new();
        for key in keys {
            for r in self.attributes[key].references() {
                if !deps.contains(&r.target) {
                    deps.push(r.target.clone());
                }
            }
        }
        deps
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Vendor-side identifier (e.g., an instance UUID)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
    /// Resources this one depended on when it was applied
    pub dependencies: Vec<ResourceId>,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
            dependencies: Vec::new(),
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
            dependencies: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ResourceId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Look up a path such as `id`, `names[0]` or `instances[0].name`
    ///
    /// `id` resolves to the identifier when no attribute of that name exists.
    pub fn lookup(&self, path: &[PathStep]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        let root = match first {
            PathStep::Attr(name) => match self.attributes.get(name) {
                Some(v) => v.clone(),
                None if name == "id" => Value::String(self.identifier.clone()?),
                None => return None,
            },
            PathStep::Index(_) => return None,
        };

        let mut current = root;
        for step in rest {
            current = match (step, current) {
                (PathStep::Attr(name), Value::Map(map)) => map.get(name)?.clone(),
                (PathStep::Index(i), Value::List(items)) => items.get(*i)?.clone(),
                _ => return None,
            };
        }
        Some(current)
    }
}
