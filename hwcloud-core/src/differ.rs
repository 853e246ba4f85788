//! Differ - Compare desired state with current state
//!
//! Compares the "desired state" declared in configuration with the "current
//! state" read from the Provider, using the resource schema to decide which
//! differences matter.

use std::collections::{BTreeMap, HashMap};

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, TIMEOUTS_BLOCK};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed -> needs delete and create
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = match schema {
        Some(schema) => changed_attributes(schema, &desired.attributes, &current.attributes),
        None => find_changed_attributes(&desired.attributes, &current.attributes),
    };

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let force_new = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.attributes.get(name).is_some_and(|a| a.force_new))
    });

    if force_new {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Plain comparison for resources without a schema
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        .filter(|(key, _)| key.as_str() != TIMEOUTS_BLOCK)
        .filter(|(key, desired_value)| current.get(*key) != Some(*desired_value))
        .map(|(key, _)| key.clone())
        .collect();
    changed.sort();
    changed
}

/// Attributes whose desired value differs from the current one, sorted
pub fn changed_attributes(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = schema
        .attributes
        .values()
        .filter(|attr| attribute_changed(attr, desired.get(&attr.name), current.get(&attr.name)))
        .map(|attr| attr.name.clone())
        .collect();
    changed.sort();
    changed
}

fn attribute_changed(attr: &AttributeSchema, desired: Option<&Value>, current: Option<&Value>) -> bool {
    if attr.is_computed_only() {
        return false;
    }
    let desired = match (desired, &attr.default) {
        (Some(v), _) => v.clone(),
        (None, Some(default)) => default.clone(),
        // Computed attributes left out of configuration keep whatever the cloud reports
        (None, None) if attr.computed => return false,
        (None, None) => zero_value(&attr.attr_type),
    };
    if !desired.is_known() {
        return true;
    }
    let current = current
        .cloned()
        .unwrap_or_else(|| zero_value(&attr.attr_type));
    canonical(&desired, &attr.attr_type) != canonical(&current, &attr.attr_type)
}

/// Zero value of a type, used for attributes absent from one side
pub fn zero_value(attr_type: &AttributeType) -> Value {
    match attr_type {
        AttributeType::String | AttributeType::Enum(_) => Value::String(String::new()),
        AttributeType::Int => Value::Int(0),
        AttributeType::Bool => Value::Bool(false),
        AttributeType::Custom { base, .. } => zero_value(base),
        AttributeType::List(_) | AttributeType::Set(_) | AttributeType::Block(_) => {
            Value::List(Vec::new())
        }
        AttributeType::Map(_) => Value::Map(HashMap::new()),
    }
}

/// Normalized form used for comparison
///
/// Sets are sorted, computed nested fields are dropped and absent nested
/// fields are filled with their default or zero value.
fn canonical(value: &Value, attr_type: &AttributeType) -> Canonical {
    match (attr_type, value) {
        (AttributeType::Custom { base, .. }, v) => canonical(v, base),
        (AttributeType::List(inner), Value::List(items)) => {
            Canonical::List(items.iter().map(|v| canonical(v, inner)).collect())
        }
        (AttributeType::Set(inner), Value::List(items)) => {
            let mut items: Vec<Canonical> = items.iter().map(|v| canonical(v, inner)).collect();
            items.sort();
            items.dedup();
            Canonical::List(items)
        }
        (AttributeType::Map(inner), Value::Map(map)) => Canonical::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical(v, inner)))
                .collect(),
        ),
        (AttributeType::Block(block), Value::List(items)) => {
            let mut items: Vec<Canonical> = items.iter().map(|v| canonical_block(v, block)).collect();
            if block.set {
                items.sort();
            }
            Canonical::List(items)
        }
        (_, v) => Canonical::Scalar(format!("{:?}", v)),
    }
}

fn canonical_block(value: &Value, block: &BlockSchema) -> Canonical {
    let Value::Map(map) = value else {
        return Canonical::Scalar(format!("{:?}", value));
    };
    let fields = block
        .attributes
        .values()
        .filter(|attr| !attr.computed)
        .map(|attr| {
            let v = map
                .get(&attr.name)
                .cloned()
                .or_else(|| attr.default.clone())
                .unwrap_or_else(|| zero_value(&attr.attr_type));
            (attr.name.clone(), canonical(&v, &attr.attr_type))
        })
        .collect();
    Canonical::Map(fields)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Canonical {
    Scalar(String),
    List(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(attrs: Vec<(&str, Value)>) -> State {
        State::existing(
            ResourceId::new("group", "test"),
            attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
        .with_identifier("id-1")
    }

    fn schema() -> ResourceSchema {
        let variable = BlockSchema::new()
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("value", AttributeType::String).required())
            .attribute(AttributeSchema::new("id", AttributeType::String).computed_only())
            .as_set();
        let environment = BlockSchema::new()
            .attribute(AttributeSchema::new("environment_id", AttributeType::String).required())
            .attribute(AttributeSchema::new(
                "variable",
                AttributeType::Block(Box::new(variable)),
            ))
            .as_set();

        ResourceSchema::new("group")
            .attribute(AttributeSchema::new("instance_id", AttributeType::String).required().force_new())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new("region", AttributeType::String).computed())
            .attribute(AttributeSchema::new(
                "zones",
                AttributeType::Set(Box::new(AttributeType::String)),
            ))
            .attribute(AttributeSchema::new(
                "environment",
                AttributeType::Block(Box::new(environment)),
            ))
            .attribute(AttributeSchema::new("status", AttributeType::String).computed_only())
    }

    fn variable(name: &str, value: &str, id: Option<&str>) -> Value {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::from(name));
        map.insert("value".to_string(), Value::from(value));
        if let Some(id) = id {
            map.insert("id".to_string(), Value::from(id));
        }
        Value::Map(map)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("group", "test");
        let current = State::not_found(ResourceId::new("group", "test"));

        let result = diff(&desired, &current, Some(&schema()));
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn computed_and_unset_attributes_do_not_diff() {
        let desired = Resource::new("group", "test")
            .with_attribute("instance_id", "inst-1")
            .with_attribute("name", "group_1");
        let current = state(vec![
            ("instance_id", Value::from("inst-1")),
            ("name", Value::from("group_1")),
            ("description", Value::from("")),
            ("region", Value::from("cn-north-4")),
            ("status", Value::from("RUNNING")),
        ]);

        assert_eq!(diff(&desired, &current, Some(&schema())), Diff::NoChange(desired.id.clone()));
    }

    #[test]
    fn removing_optional_attribute_is_a_change() {
        let desired = Resource::new("group", "test")
            .with_attribute("instance_id", "inst-1")
            .with_attribute("name", "group_1");
        let current = state(vec![
            ("instance_id", Value::from("inst-1")),
            ("name", Value::from("group_1")),
            ("description", Value::from("Created by script")),
        ]);

        match diff(&desired, &current, Some(&schema())) {
            Diff::Update { changed_attributes, .. } => {
                assert_eq!(changed_attributes, vec!["description".to_string()]);
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn sets_compare_without_order() {
        let desired = Resource::new("group", "test")
            .with_attribute("instance_id", "inst-1")
            .with_attribute("name", "group_1")
            .with_attribute("zones", vec!["b".to_string(), "a".to_string()]);
        let current = state(vec![
            ("instance_id", Value::from("inst-1")),
            ("name", Value::from("group_1")),
            ("zones", Value::from(vec!["a".to_string(), "b".to_string()])),
        ]);

        assert!(!diff(&desired, &current, Some(&schema())).is_change());
    }

    #[test]
    fn nested_computed_fields_are_ignored() {
        let mut desired_env = HashMap::new();
        desired_env.insert("environment_id".to_string(), Value::from("env-1"));
        desired_env.insert(
            "variable".to_string(),
            Value::List(vec![variable("b", "2", None), variable("a", "1", None)]),
        );
        let mut current_env = HashMap::new();
        current_env.insert("environment_id".to_string(), Value::from("env-1"));
        current_env.insert(
            "variable".to_string(),
            Value::List(vec![
                variable("a", "1", Some("var-1")),
                variable("b", "2", Some("var-2")),
            ]),
        );

        let desired = Resource::new("group", "test")
            .with_attribute("instance_id", "inst-1")
            .with_attribute("name", "group_1")
            .with_attribute("environment", Value::List(vec![Value::Map(desired_env)]));
        let current = state(vec![
            ("instance_id", Value::from("inst-1")),
            ("name", Value::from("group_1")),
            ("environment", Value::List(vec![Value::Map(current_env)])),
        ]);

        assert!(!diff(&desired, &current, Some(&schema())).is_change());
    }

    #[test]
    fn force_new_change_replaces() {
        let desired = Resource::new("group", "test")
            .with_attribute("instance_id", "inst-2")
            .with_attribute("name", "group_1");
        let current = state(vec![
            ("instance_id", Value::from("inst-1")),
            ("name", Value::from("group_1")),
        ]);

        assert!(matches!(
            diff(&desired, &current, Some(&schema())),
            Diff::Replace { .. }
        ));
    }

    #[test]
    fn unknown_values_always_diff() {
        let desired = Resource::new("group", "test")
            .with_attribute("instance_id", "inst-1")
            .with_attribute("name", Value::Unknown);
        let current = state(vec![
            ("instance_id", Value::from("inst-1")),
            ("name", Value::from("group_1")),
        ]);

        assert!(matches!(
            diff(&desired, &current, Some(&schema())),
            Diff::Update { .. }
        ));
    }

    #[test]
    fn diff_without_schema_compares_set_attributes() {
        let desired = Resource::new("bucket", "test").with_attribute("region", "us-east-1");
        let current = state(vec![("region", Value::from("ap-northeast-1"))]);

        match diff(&desired, &current, None) {
            Diff::Update { changed_attributes, .. } => {
                assert_eq!(changed_attributes, vec!["region".to_string()]);
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }
}
