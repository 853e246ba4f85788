//! Typed view of a resource during one operation
//!
//! Combines the prior state with the configuration (when there is one) the
//! way handlers expect: configured attributes win, computed attributes left
//! out of configuration keep their prior value, and other attributes left
//! out fall back to their default or drop out.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use hwcloud_core::differ::{changed_attributes, zero_value};
use hwcloud_core::resource::Value;
use hwcloud_core::schema::{AttributeType, ResourceSchema, TIMEOUTS_BLOCK, TimeoutKind, TypeError};

/// Used when neither the resource nor its configuration names a timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: ResourceSchema,
    id: String,
    prior: HashMap<String, Value>,
    attributes: HashMap<String, Value>,
    changed: BTreeSet<String>,
    timeouts: Option<Value>,
}

impl ResourceData {
    /// Data for create or a data source read
    pub fn from_config(schema: &ResourceSchema, config: &HashMap<String, Value>) -> Self {
        Self::new(schema, "", &HashMap::new(), Some(config))
    }

    /// Data for read, delete and import, with no configuration
    pub fn from_state(schema: &ResourceSchema, id: &str, state: &HashMap<String, Value>) -> Self {
        Self::new(schema, id, state, None)
    }

    /// Data for update: `prior` is the current state, `config` the target
    pub fn for_update(
        schema: &ResourceSchema,
        id: &str,
        prior: &HashMap<String, Value>,
        config: &HashMap<String, Value>,
    ) -> Self {
        Self::new(schema, id, prior, Some(config))
    }

    fn new(
        schema: &ResourceSchema,
        id: &str,
        prior: &HashMap<String, Value>,
        config: Option<&HashMap<String, Value>>,
    ) -> Self {
        let mut attributes = prior.clone();
        let mut changed = BTreeSet::new();
        let mut timeouts = None;

        if let Some(config) = config {
            for (name, attr) in &schema.attributes {
                match config.get(name) {
                    Some(v) => {
                        attributes.insert(name.clone(), normalize(&attr.attr_type, v.clone()));
                    }
                    None if attr.computed => {}
                    None => match &attr.default {
                        Some(default) => {
                            attributes.insert(name.clone(), default.clone());
                        }
                        None => {
                            attributes.remove(name);
                        }
                    },
                }
            }
            changed = changed_attributes(schema, &attributes, prior)
                .into_iter()
                .collect();
            timeouts = config.get(TIMEOUTS_BLOCK).cloned();
        }

        Self {
            schema: schema.clone(),
            id: id.to_string(),
            prior: prior.clone(),
            attributes,
            changed,
            timeouts,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty ID marks the resource as gone
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Current value of an attribute, falling back to its zero value
    pub fn get(&self, key: &str) -> Value {
        if let Some(v) = self.attributes.get(key) {
            return v.clone();
        }
        match self.schema.attributes.get(key) {
            Some(attr) => attr
                .default
                .clone()
                .unwrap_or_else(|| zero_value(&attr.attr_type)),
            None => Value::String(String::new()),
        }
    }

    /// Value of an attribute only when it is set to a non-zero value
    pub fn get_ok(&self, key: &str) -> Option<Value> {
        self.attributes
            .get(key)
            .filter(|v| !v.is_zero())
            .cloned()
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key).as_str().unwrap_or_default().to_string()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).as_int().unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or_default()
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        string_list(&self.get(key))
    }

    pub fn get_string_map(&self, key: &str) -> HashMap<String, String> {
        string_map(&self.get(key))
    }

    /// Whether the configuration changes `key` compared to the prior state
    pub fn has_change(&self, key: &str) -> bool {
        self.changed.contains(key)
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// Prior and new value of an attribute
    pub fn get_change(&self, key: &str) -> (Value, Value) {
        let old = match self.prior.get(key) {
            Some(v) => v.clone(),
            None => self
                .schema
                .attributes
                .get(key)
                .map(|attr| zero_value(&attr.attr_type))
                .unwrap_or(Value::String(String::new())),
        };
        (old, self.get(key))
    }

    /// Set an attribute in the resulting state
    ///
    /// Sets are stored sorted and deduplicated.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), TypeError> {
        let attr = self
            .schema
            .attributes
            .get(key)
            .ok_or_else(|| TypeError::UnknownAttribute {
                name: key.to_string(),
            })?;
        let value = normalize(&attr.attr_type, value.into());
        attr.attr_type
            .validate(&value)
            .map_err(|e| TypeError::AttributeError {
                name: key.to_string(),
                inner: Box::new(e),
            })?;
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Timeout for an operation, from the `timeouts` block or the schema
    pub fn timeout(&self, kind: TimeoutKind) -> Duration {
        let mut config = HashMap::new();
        if let Some(block) = &self.timeouts {
            config.insert(TIMEOUTS_BLOCK.to_string(), block.clone());
        }
        self.schema
            .timeout(&config, kind)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> HashMap<String, Value> {
        self.attributes
    }
}

/// Canonical stored form: sets sorted and deduplicated, recursively for
/// nested blocks
fn normalize(attr_type: &AttributeType, value: Value) -> Value {
    match (attr_type, value) {
        (AttributeType::Set(inner), Value::List(items)) => {
            let mut items: Vec<Value> = items.into_iter().map(|v| normalize(inner, v)).collect();
            items.sort_by_key(sort_key);
            items.dedup();
            Value::List(items)
        }
        (AttributeType::List(inner), Value::List(items)) => {
            Value::List(items.into_iter().map(|v| normalize(inner, v)).collect())
        }
        (AttributeType::Block(block), Value::List(items)) => {
            let mut items: Vec<Value> = items
                .into_iter()
                .map(|item| match item {
                    Value::Map(map) => Value::Map(
                        map.into_iter()
                            .map(|(k, v)| {
                                let v = match block.attributes.get(&k) {
                                    Some(attr) => normalize(&attr.attr_type, v),
                                    None => v,
                                };
                                (k, v)
                            })
                            .collect(),
                    ),
                    other => other,
                })
                .collect();
            if block.set {
                items.sort_by_key(sort_key);
            }
            Value::List(items)
        }
        (_, v) => v,
    }
}

/// Ordering key for set members; maps order by their sorted entries
fn sort_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Map(map) => {
            let mut entries: Vec<(&String, String)> =
                map.iter().map(|(k, v)| (k, sort_key(v))).collect();
            entries.sort();
            format!("{:?}", entries)
        }
        Value::List(items) => format!("{:?}", items.iter().map(sort_key).collect::<Vec<_>>()),
        other => format!("{:?}", other),
    }
}

pub fn string_list(value: &Value) -> Vec<String> {
    value
        .as_list()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn string_map(value: &Value) -> HashMap<String, String> {
    value
        .as_map()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
