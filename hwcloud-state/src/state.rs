//! Persisted state file
//!
//! Attributes are stored as plain JSON. Only concrete values reach the
//! state: references and templates are resolved before apply, and unknown
//! values are never written.

use std::collections::{BTreeMap, HashMap};

use hwcloud_core::resource::{ResourceId, ResourceMode, State, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::backend::{BackendError, BackendResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Bumped on every write
    pub serial: u64,
    /// Fixed when the file is first created
    pub lineage: String,
    pub hwcloud_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            hwcloud_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.hwcloud_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.matches(id))
    }

    /// Replace the stored resources with the existing managed ones in
    /// `states`, sorted by address
    pub fn replace_states(&mut self, states: &HashMap<ResourceId, State>) {
        let mut ids: Vec<&ResourceId> = states
            .iter()
            .filter(|(id, s)| !id.is_data_source() && s.exists)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        self.resources = ids
            .into_iter()
            .map(|id| ResourceState::from_state(&states[id]))
            .collect();
    }

    pub fn to_states(&self) -> BackendResult<HashMap<ResourceId, State>> {
        self.resources
            .iter()
            .map(|r| r.to_state().map(|s| (s.id.clone(), s)))
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Managed,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub mode: Mode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub identifier: String,
    pub attributes: BTreeMap<String, Json>,
    /// Addresses of the resources this one referenced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl ResourceState {
    pub fn from_state(state: &State) -> Self {
        Self {
            mode: match state.id.mode {
                ResourceMode::Managed => Mode::Managed,
                ResourceMode::Data => Mode::Data,
            },
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            identifier: state.identifier.clone().unwrap_or_default(),
            attributes: state
                .attributes
                .iter()
                .filter_map(|(k, v)| value_to_json(v).map(|j| (k.clone(), j)))
                .collect(),
            dependencies: state.dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn id(&self) -> ResourceId {
        match self.mode {
            Mode::Managed => ResourceId::new(&self.resource_type, &self.name),
            Mode::Data => ResourceId::data(&self.resource_type, &self.name),
        }
    }

    fn matches(&self, id: &ResourceId) -> bool {
        self.id() == *id
    }

    pub fn address(&self) -> String {
        self.id().to_string()
    }

    pub fn to_state(&self) -> BackendResult<State> {
        let id = self.id();
        if self.identifier.is_empty() {
            return Err(BackendError::InvalidState(format!("{} has no identifier", id)));
        }
        let attributes = self
            .attributes
            .iter()
            .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
            .collect();
        let dependencies = self
            .dependencies
            .iter()
            .map(|address| {
                ResourceId::parse_address(address).ok_or_else(|| {
                    BackendError::InvalidState(format!(
                        "{}: invalid dependency address '{}'",
                        id, address
                    ))
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(State::existing(id, attributes)
            .with_identifier(self.identifier.clone())
            .with_dependencies(dependencies))
    }
}

/// `None` for values that are not known yet
pub fn value_to_json(value: &Value) -> Option<Json> {
    match value {
        Value::String(s) => Some(Json::String(s.clone())),
        Value::Int(i) => Some(Json::from(*i)),
        Value::Bool(b) => Some(Json::Bool(*b)),
        Value::List(items) => items.iter().map(value_to_json).collect::<Option<Vec<_>>>().map(Json::Array),
        Value::Map(map) => map
            .iter()
            .map(|(k, v)| value_to_json(v).map(|j| (k.clone(), j)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Json::Object),
        Value::ResourceRef(_) | Value::Template(_) | Value::Unknown => None,
    }
}

/// `None` for JSON null; fractional numbers are kept as strings
pub fn json_to_value(json: &Json) -> Option<Value> {
    match json {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::String(n.to_string()),
        }),
        Json::String(s) => Some(Value::String(s.clone())),
        Json::Array(items) => Some(Value::List(items.iter().filter_map(json_to_value).collect())),
        Json::Object(map) => Some(Value::Map(
            map.iter()
                .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_state() -> State {
        let mut variable = HashMap::new();
        variable.insert("name".to_string(), Value::from("TERRAFORM"));
        variable.insert("value".to_string(), Value::from("/stage/terraform"));
        let mut env = HashMap::new();
        env.insert("environment_id".to_string(), Value::from("env-1"));
        env.insert("variable".to_string(), Value::List(vec![Value::Map(variable)]));

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("group"));
        attrs.insert("environment".to_string(), Value::List(vec![Value::Map(env)]));
        attrs.insert("port".to_string(), Value::Int(5672));
        attrs.insert("ssl_enable".to_string(), Value::Bool(false));
        attrs.insert("pending".to_string(), Value::Unknown);

        State::existing(ResourceId::new("huaweicloud_apig_group", "test"), attrs)
            .with_identifier("grp-1")
            .with_dependencies(vec![ResourceId::new("huaweicloud_apig_environment", "test")])
    }

    #[test]
    fn resource_state_from_state() {
        let stored = ResourceState::from_state(&group_state());
        assert_eq!(stored.address(), "huaweicloud_apig_group.test");
        assert_eq!(stored.identifier, "grp-1");
        assert_eq!(stored.attributes["port"], json!(5672));
        assert_eq!(
            stored.attributes["environment"][0]["variable"][0]["name"],
            json!("TERRAFORM")
        );
        assert!(!stored.attributes.contains_key("pending"));
        assert_eq!(stored.dependencies, vec!["huaweicloud_apig_environment.test"]);

        let restored = stored.to_state().unwrap();
        let mut expected = group_state();
        expected.attributes.remove("pending");
        assert_eq!(restored, expected);
    }

    #[test]
    fn replace_skips_data_sources_and_gone_resources() {
        let mut states = HashMap::new();
        let group = group_state();
        states.insert(group.id.clone(), group);
        let zones = ResourceId::data("huaweicloud_availability_zones", "test");
        states.insert(
            zones.clone(),
            State::existing(zones, HashMap::new()).with_identifier("cn-north-4"),
        );
        let gone = ResourceId::new("huaweicloud_apig_environment", "old");
        states.insert(gone.clone(), State::not_found(gone));

        let mut file = StateFile::new();
        file.replace_states(&states);
        assert_eq!(file.resources.len(), 1);
        assert!(file.find(&ResourceId::new("huaweicloud_apig_group", "test")).is_some());
    }

    #[test]
    fn file_format() {
        let mut file = StateFile::new();
        file.resources.push(ResourceState::from_state(&group_state()));
        file.increment_serial();

        let text = serde_json::to_string_pretty(&file).unwrap();
        let parsed: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["serial"], json!(1));
        assert_eq!(parsed["resources"][0]["mode"], json!("managed"));
        assert_eq!(parsed["resources"][0]["type"], json!("huaweicloud_apig_group"));

        let back: StateFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.lineage, file.lineage);
        assert_eq!(back.to_states().unwrap().len(), 1);
    }

    #[test]
    fn missing_identifier_is_invalid() {
        let stored = ResourceState {
            mode: Mode::Managed,
            resource_type: "huaweicloud_apig_group".to_string(),
            name: "test".to_string(),
            identifier: String::new(),
            attributes: BTreeMap::new(),
            dependencies: Vec::new(),
        };
        assert!(matches!(stored.to_state(), Err(BackendError::InvalidState(_))));
    }
}
