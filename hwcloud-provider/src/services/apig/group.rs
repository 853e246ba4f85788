//! `huaweicloud_apig_group`
//!
//! Environment variables of a group are declared inline as
//! `environment { environment_id, variable { name, value } }` blocks and
//! managed through the environment variable API.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::resource::Value;
use hwcloud_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::apig::env_variables::{self, Variable};
use hwcloud_sdk::services::apig::groups::{self, GroupOpts};
use log::debug;

use super::{apig_client, instance_id_schema};
use crate::common::{MultiError, check_deleted, parse_composite_id, region_schema};
use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::resources::ResourceHandler;

pub struct ApigGroup;

/// One variable of one environment
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EnvVariable {
    env_id: String,
    name: String,
    value: String,
    /// Empty until the variable exists
    id: String,
}

impl EnvVariable {
    fn same_definition(&self, other: &EnvVariable) -> bool {
        self.env_id == other.env_id && self.name == other.name && self.value == other.value
    }
}

fn field(map: &HashMap<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flatten_environments(environments: &Value) -> Vec<EnvVariable> {
    let mut result = Vec::new();
    for env in environments.as_list().unwrap_or_default() {
        let Some(env) = env.as_map() else { continue };
        let env_id = field(env, "environment_id");
        let variables = env.get("variable").and_then(Value::as_list).unwrap_or_default();
        for variable in variables.iter().filter_map(Value::as_map) {
            result.push(EnvVariable {
                env_id: env_id.clone(),
                name: field(variable, "name"),
                value: field(variable, "value"),
                id: field(variable, "id"),
            });
        }
    }
    result
}

/// Variables to delete and to create to turn `old` into `new`
fn variable_changes(
    old: &[EnvVariable],
    new: &[EnvVariable],
) -> (Vec<EnvVariable>, Vec<EnvVariable>) {
    let removed = old
        .iter()
        .filter(|o| !new.iter().any(|n| n.same_definition(o)))
        .cloned()
        .collect();
    let added = new
        .iter()
        .filter(|n| !old.iter().any(|o| o.same_definition(n)))
        .cloned()
        .collect();
    (removed, added)
}

/// Group variables by environment, in the block layout
fn build_environments(variables: &[Variable]) -> Value {
    let mut by_env: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for v in variables {
        let mut variable = HashMap::new();
        variable.insert("name".to_string(), Value::from(v.variable_name.as_str()));
        variable.insert("value".to_string(), Value::from(v.variable_value.as_str()));
        variable.insert("id".to_string(), Value::from(v.id.as_str()));
        by_env
            .entry(v.env_id.as_str())
            .or_default()
            .push(Value::Map(variable));
    }
    Value::List(
        by_env
            .into_iter()
            .map(|(env_id, variables)| {
                let mut env = HashMap::new();
                env.insert("environment_id".to_string(), Value::from(env_id));
                env.insert("variable".to_string(), Value::List(variables));
                Value::Map(env)
            })
            .collect(),
    )
}

async fn create_variables(
    client: &ServiceClient,
    instance_id: &str,
    group_id: &str,
    variables: &[EnvVariable],
) -> ProviderResult<()> {
    for v in variables {
        let opts = env_variables::CreateOpts {
            group_id: group_id.to_string(),
            env_id: v.env_id.clone(),
            variable_name: v.name.clone(),
            variable_value: v.value.clone(),
        };
        debug!("Create APIG environment variable with options: {:?}", opts);
        env_variables::create(client, instance_id, &opts)
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Error creating variable ({}) for environment ({})",
                    v.name, v.env_id
                ))
                .with_cause(e)
            })?;
    }
    Ok(())
}

async fn delete_variables(
    client: &ServiceClient,
    instance_id: &str,
    variables: &[EnvVariable],
) -> ProviderResult<()> {
    for v in variables {
        if v.id.is_empty() {
            continue;
        }
        match env_variables::delete(client, instance_id, &v.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Error deleting variable ({}) from environment ({})",
                    v.name, v.env_id
                ))
                .with_cause(e));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl ResourceHandler for ApigGroup {
    fn name(&self) -> &'static str {
        "huaweicloud_apig_group"
    }

    fn schema(&self) -> ResourceSchema {
        let variable = BlockSchema::new()
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("value", AttributeType::String).required())
            .attribute(AttributeSchema::new("id", AttributeType::String).computed())
            .as_set();
        let environment = BlockSchema::new()
            .attribute(
                AttributeSchema::new("variable", AttributeType::Block(Box::new(variable))).required(),
            )
            .attribute(AttributeSchema::new("environment_id", AttributeType::String).required())
            .as_set();

        ResourceSchema::new(self.name())
            .with_description("API group of a dedicated APIG instance")
            .attribute(region_schema())
            .attribute(instance_id_schema())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new(
                "environment",
                AttributeType::Block(Box::new(environment)),
            ))
            .attribute(AttributeSchema::new("registration_time", AttributeType::String).computed_only())
            .attribute(AttributeSchema::new("updated_at", AttributeType::String).computed_only())
            .importable()
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d)?;
        let instance_id = d.get_string("instance_id");

        let opts = GroupOpts {
            name: d.get_string("name"),
            remark: d.get_string("description"),
        };
        debug!("Create APIG group with options: {:?}", opts);
        let group = groups::create(&client, &instance_id, &opts)
            .await
            .map_err(|e| ProviderError::new("Error creating HuaweiCloud APIG group").with_cause(e))?;
        d.set_id(group.id.clone());

        let variables = flatten_environments(&d.get("environment"));
        create_variables(&client, &instance_id, &group.id, &variables).await?;

        self.read(cfg, d).await
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = apig_client(cfg, d)?;
        let instance_id = d.get_string("instance_id");
        let id = d.id().to_string();

        let group = match groups::get(&client, &instance_id, &id).await {
            Ok(group) => group,
            Err(e) => return check_deleted(d, e, "Error getting APIG group"),
        };

        let opts = env_variables::ListOpts {
            group_id: id.clone(),
            ..Default::default()
        };
        let variables = env_variables::list(&client, &instance_id, &opts)
            .await
            .map_err(|e| {
                ProviderError::new(format!("Error retrieving variables of APIG group ({})", id))
                    .with_cause(e)
            })?;

        let mut errs = MultiError::new();
        errs.check(d.set("region", region));
        errs.check(d.set("name", group.name));
        errs.check(d.set("description", group.remark));
        errs.check(d.set("registration_time", group.register_time));
        errs.check(d.set("updated_at", group.update_time));
        errs.check(d.set("environment", build_environments(&variables)));
        errs.into_result("Error saving APIG group fields")
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d)?;
        let instance_id = d.get_string("instance_id");
        let id = d.id().to_string();

        if d.has_changes(&["name", "description"]) {
            let opts = GroupOpts {
                name: d.get_string("name"),
                remark: d.get_string("description"),
            };
            debug!("Update APIG group {} with options: {:?}", id, opts);
            groups::update(&client, &instance_id, &id, &opts)
                .await
                .map_err(|e| {
                    ProviderError::new(format!("Error updating APIG group ({})", id)).with_cause(e)
                })?;
        }

        if d.has_change("environment") {
            let (old, new) = d.get_change("environment");
            let (removed, added) =
                variable_changes(&flatten_environments(&old), &flatten_environments(&new));
            delete_variables(&client, &instance_id, &removed).await?;
            create_variables(&client, &instance_id, &id, &added).await?;
        }

        self.read(cfg, d).await
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d)?;
        let instance_id = d.get_string("instance_id");
        let id = d.id().to_string();

        if let Err(e) = groups::delete(&client, &instance_id, &id).await {
            return check_deleted(d, e, "Error deleting HuaweiCloud APIG group");
        }
        d.set_id("");
        Ok(())
    }

    fn import(&self, import_id: &str, d: &mut ResourceData) -> ProviderResult<()> {
        let (instance_id, id) = parse_composite_id(import_id, "instance_id")?;
        d.set("instance_id", instance_id)
            .map_err(|e| ProviderError::new("Error saving instance ID").with_cause(e))?;
        d.set_id(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(env_id: &str, name: &str, value: &str, id: &str) -> EnvVariable {
        EnvVariable {
            env_id: env_id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            id: id.to_string(),
        }
    }

    fn api_var(id: &str, env_id: &str, name: &str, value: &str) -> Variable {
        Variable {
            id: id.to_string(),
            group_id: "grp".to_string(),
            env_id: env_id.to_string(),
            variable_name: name.to_string(),
            variable_value: value.to_string(),
        }
    }

    #[test]
    fn environments_round_trip() {
        let variables = vec![
            api_var("v2", "env-b", "host", "b.example.com"),
            api_var("v1", "env-a", "host", "a.example.com"),
            api_var("v3", "env-a", "port", "8080"),
        ];
        let value = build_environments(&variables);
        let envs = value.as_list().unwrap();
        assert_eq!(envs.len(), 2);
        assert_eq!(
            envs[0].as_map().unwrap()["environment_id"],
            Value::from("env-a")
        );

        let mut flat = flatten_environments(&value);
        flat.sort();
        assert_eq!(
            flat,
            vec![
                var("env-a", "host", "a.example.com", "v1"),
                var("env-a", "port", "8080", "v3"),
                var("env-b", "host", "b.example.com", "v2"),
            ]
        );
    }

    #[test]
    fn changed_value_is_replaced() {
        let old = vec![
            var("env-a", "host", "a.example.com", "v1"),
            var("env-a", "port", "8080", "v3"),
        ];
        let new = vec![
            var("env-a", "host", "a.example.com", ""),
            var("env-a", "port", "9090", ""),
            var("env-b", "host", "b.example.com", ""),
        ];
        let (removed, added) = variable_changes(&old, &new);
        assert_eq!(removed, vec![var("env-a", "port", "8080", "v3")]);
        assert_eq!(
            added,
            vec![
                var("env-a", "port", "9090", ""),
                var("env-b", "host", "b.example.com", ""),
            ]
        );
    }

    #[test]
    fn import_id_sets_instance() {
        let schema = ApigGroup.schema();
        let mut d = ResourceData::from_state(&schema, "", &HashMap::new());
        ApigGroup.import("inst-1/grp-1", &mut d).unwrap();
        assert_eq!(d.id(), "grp-1");
        assert_eq!(d.get_string("instance_id"), "inst-1");

        assert!(ApigGroup.import("grp-1", &mut d).is_err());
    }
}
