//! Assertions on the states produced by a test step
//!
//! Attribute keys use the flat-map form: `tags.foo`, `availability_zones.#`,
//! `environment.0.variable.0.name`. The key `id` is the resource identifier.

use std::collections::{BTreeMap, HashMap};

use hwcloud_core::flatmap::flatten;
use hwcloud_core::resource::{ResourceId, State};

pub type States = HashMap<ResourceId, State>;

type CheckFn = Box<dyn Fn(&States) -> Result<(), String> + Send + Sync>;

pub struct Check {
    description: String,
    check: CheckFn,
}

impl Check {
    pub fn new(
        description: impl Into<String>,
        check: impl Fn(&States) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            check: Box::new(check),
        }
    }

    pub fn run(&self, states: &States) -> Result<(), String> {
        (self.check)(states).map_err(|e| format!("{}: {}", self.description, e))
    }
}

/// State of the resource at `address`, e.g. `huaweicloud_apig_group.test`
pub fn state_of<'a>(states: &'a States, address: &str) -> Result<&'a State, String> {
    let id = ResourceId::parse_address(address)
        .ok_or_else(|| format!("invalid resource address '{}'", address))?;
    states
        .get(&id)
        .filter(|s| s.exists)
        .ok_or_else(|| format!("Not found: {} in state", address))
}

/// Flat attributes of a state, with `id` set to the identifier
pub fn flat_attributes(state: &State) -> BTreeMap<String, String> {
    let mut flat = flatten(&state.attributes);
    if let Some(identifier) = &state.identifier {
        flat.entry("id".to_string())
            .or_insert_with(|| identifier.clone());
    }
    flat
}

fn attribute(states: &States, address: &str, key: &str) -> Result<Option<String>, String> {
    let state = state_of(states, address)?;
    Ok(flat_attributes(state).get(key).cloned())
}

pub fn resource_exists(address: &str) -> Check {
    let address = address.to_string();
    Check::new(format!("{} exists", address), move |states| {
        let state = state_of(states, &address)?;
        match state.identifier.as_deref() {
            Some(id) if !id.is_empty() => Ok(()),
            _ => Err("no ID is set".to_string()),
        }
    })
}

pub fn resource_attr(address: &str, key: &str, value: &str) -> Check {
    let (address, key, value) = (address.to_string(), key.to_string(), value.to_string());
    Check::new(format!("{}.{}", address, key), move |states| {
        match attribute(states, &address, &key)? {
            Some(actual) if actual == value => Ok(()),
            // An empty collection may be stored as absent
            None if (key.ends_with(".#") || key.ends_with(".%")) && value == "0" => Ok(()),
            Some(actual) => Err(format!("expected {:?}, got {:?}", value, actual)),
            None => Err(format!("expected {:?}, attribute not set", value)),
        }
    })
}

pub fn resource_attr_set(address: &str, key: &str) -> Check {
    let (address, key) = (address.to_string(), key.to_string());
    Check::new(format!("{}.{}", address, key), move |states| {
        match attribute(states, &address, &key)? {
            Some(actual) if !actual.is_empty() => Ok(()),
            _ => Err("expected a value, attribute not set".to_string()),
        }
    })
}

pub fn no_resource_attr(address: &str, key: &str) -> Check {
    let (address, key) = (address.to_string(), key.to_string());
    Check::new(format!("{}.{}", address, key), move |states| {
        match attribute(states, &address, &key)? {
            None => Ok(()),
            Some(actual) if actual.is_empty() => Ok(()),
            Some(actual) => Err(format!("expected no value, got {:?}", actual)),
        }
    })
}

/// The attribute equals an attribute of another resource
pub fn resource_attr_pair(address: &str, key: &str, other: &str, other_key: &str) -> Check {
    let (address, key) = (address.to_string(), key.to_string());
    let (other, other_key) = (other.to_string(), other_key.to_string());
    Check::new(
        format!("{}.{} == {}.{}", address, key, other, other_key),
        move |states| {
            let left = attribute(states, &address, &key)?;
            let right = attribute(states, &other, &other_key)?;
            if left == right {
                Ok(())
            } else {
                Err(format!("{:?} != {:?}", left, right))
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwcloud_core::resource::Value;

    fn states() -> States {
        let id = ResourceId::new("huaweicloud_apig_group", "test");
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("tf_test_group"));
        attrs.insert("description".to_string(), Value::from(""));
        attrs.insert("instance_id".to_string(), Value::from("inst-1"));
        let group = State::existing(id.clone(), attrs).with_identifier("grp-1");

        let env_id = ResourceId::new("huaweicloud_apig_environment", "test");
        let mut env_attrs = HashMap::new();
        env_attrs.insert("instance_id".to_string(), Value::from("inst-1"));
        let env = State::existing(env_id.clone(), env_attrs).with_identifier("env-1");

        let mut states = HashMap::new();
        states.insert(id, group);
        states.insert(env_id, env);
        states
    }

    #[test]
    fn attribute_checks() {
        let states = states();
        assert!(resource_exists("huaweicloud_apig_group.test").run(&states).is_ok());
        assert!(resource_attr("huaweicloud_apig_group.test", "id", "grp-1").run(&states).is_ok());
        assert!(resource_attr("huaweicloud_apig_group.test", "name", "tf_test_group")
            .run(&states)
            .is_ok());
        assert!(resource_attr_set("huaweicloud_apig_group.test", "name").run(&states).is_ok());
        assert!(resource_attr_set("huaweicloud_apig_group.test", "description").run(&states).is_err());
        assert!(no_resource_attr("huaweicloud_apig_group.test", "description").run(&states).is_ok());
        assert!(resource_attr("huaweicloud_apig_group.test", "tags.%", "0").run(&states).is_ok());
        assert!(resource_attr_pair(
            "huaweicloud_apig_group.test",
            "instance_id",
            "huaweicloud_apig_environment.test",
            "instance_id"
        )
        .run(&states)
        .is_ok());
    }

    #[test]
    fn failures_name_the_check() {
        let states = states();
        let err = resource_attr("huaweicloud_apig_group.test", "name", "other")
            .run(&states)
            .unwrap_err();
        assert_eq!(
            err,
            "huaweicloud_apig_group.test.name: expected \"other\", got \"tf_test_group\""
        );

        let err = resource_exists("huaweicloud_apig_group.missing").run(&states).unwrap_err();
        assert!(err.contains("Not found: huaweicloud_apig_group.missing"));
    }
}
