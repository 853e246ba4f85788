use std::collections::HashMap;

use async_trait::async_trait;
use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::resource::Value;
use hwcloud_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};
use hwcloud_sdk::services::dds::{self, Instance, ListOpts};
use log::debug;

use crate::common::{MultiError, region_schema};
use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::resources::DataSourceHandler;
use crate::services::client_error;
use crate::utils::{hashcode_strings, tags_to_map};

/// `huaweicloud_dds_instances`
pub struct DdsInstances;

fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

fn flatten_instance(v: &Instance) -> Value {
    let mut datastore = HashMap::new();
    datastore.insert("type".to_string(), Value::from(v.datastore.datastore_type.as_str()));
    datastore.insert("version".to_string(), Value::from(v.datastore.version.as_str()));
    datastore.insert(
        "storage_engine".to_string(),
        Value::from(v.datastore.storage_engine.as_str()),
    );

    let mut m = HashMap::new();
    m.insert("id".to_string(), Value::from(v.id.as_str()));
    m.insert("name".to_string(), Value::from(v.name.as_str()));
    m.insert("mode".to_string(), Value::from(v.mode.as_str()));
    m.insert("port".to_string(), Value::from(v.port.as_str()));
    m.insert("ssl".to_string(), Value::Bool(v.ssl == 1));
    m.insert("status".to_string(), Value::from(v.status.as_str()));
    m.insert("vpc_id".to_string(), Value::from(v.vpc_id.as_str()));
    m.insert("subnet_id".to_string(), Value::from(v.subnet_id.as_str()));
    m.insert(
        "security_group_id".to_string(),
        Value::from(v.security_group_id.as_str()),
    );
    m.insert(
        "enterprise_project_id".to_string(),
        Value::from(v.enterprise_project_id.as_str()),
    );
    m.insert("db_username".to_string(), Value::from(v.db_user_name.as_str()));
    m.insert(
        "datastore".to_string(),
        Value::List(vec![Value::Map(datastore)]),
    );
    m.insert("tags".to_string(), Value::from(tags_to_map(&v.tags)));
    Value::Map(m)
}

#[async_trait]
impl DataSourceHandler for DdsInstances {
    fn name(&self) -> &'static str {
        "huaweicloud_dds_instances"
    }

    fn schema(&self) -> ResourceSchema {
        let datastore = BlockSchema::new()
            .attribute(string("type"))
            .attribute(string("version"))
            .attribute(string("storage_engine"));
        let instance = BlockSchema::new()
            .attribute(string("id"))
            .attribute(string("name"))
            .attribute(string("mode"))
            .attribute(string("port"))
            .attribute(AttributeSchema::new("ssl", AttributeType::Bool))
            .attribute(string("status"))
            .attribute(string("vpc_id"))
            .attribute(string("subnet_id"))
            .attribute(string("security_group_id"))
            .attribute(string("enterprise_project_id"))
            .attribute(string("db_username"))
            .attribute(AttributeSchema::new(
                "datastore",
                AttributeType::Block(Box::new(datastore)),
            ))
            .attribute(AttributeSchema::new(
                "tags",
                AttributeType::Map(Box::new(AttributeType::String)),
            ));

        ResourceSchema::data_source(self.name())
            .with_description("DDS instances matching the given filters")
            .attribute(region_schema())
            .attribute(string("name"))
            .attribute(
                AttributeSchema::new(
                    "mode",
                    AttributeType::Enum(vec![
                        "Sharding".to_string(),
                        "ReplicaSet".to_string(),
                        "Single".to_string(),
                    ]),
                ),
            )
            .attribute(string("vpc_id"))
            .attribute(string("subnet_id"))
            .attribute(
                AttributeSchema::new("instances", AttributeType::Block(Box::new(instance)))
                    .computed_only(),
            )
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg
            .dds_v3_client(&region)
            .map_err(client_error("DDS v3"))?;

        let opts = ListOpts {
            name: d.get_string("name"),
            mode: d.get_string("mode"),
            vpc_id: d.get_string("vpc_id"),
            subnet_id: d.get_string("subnet_id"),
            ..Default::default()
        };
        debug!("List DDS instances with options: {:?}", opts);
        let all = dds::list(&client, &opts)
            .await
            .map_err(|e| ProviderError::new("Unable to retrieve DDS instances").with_cause(e))?;

        let ids: Vec<String> = all.iter().map(|v| v.id.clone()).collect();
        let instances: Vec<Value> = all.iter().map(flatten_instance).collect();
        debug!("Found {} DDS instances", instances.len());

        d.set_id(hashcode_strings(&ids));
        let mut errs = MultiError::new();
        errs.check(d.set("region", region));
        errs.check(d.set("instances", Value::List(instances)));
        errs.into_result("Error saving DDS instances")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwcloud_sdk::services::dds::Datastore;
    use hwcloud_sdk::services::tags::ResourceTag;

    #[test]
    fn flattened_instance_matches_schema() {
        let v = Instance {
            id: "dds-1".to_string(),
            name: "mongo".to_string(),
            port: "8635".to_string(),
            mode: "Sharding".to_string(),
            ssl: 1,
            db_user_name: "rwuser".to_string(),
            datastore: Datastore {
                datastore_type: "DDS-Community".to_string(),
                version: "4.0".to_string(),
                storage_engine: "wiredTiger".to_string(),
            },
            tags: vec![ResourceTag::new("foo", "bar")],
            ..Default::default()
        };
        let flat = flatten_instance(&v);
        let map = flat.as_map().unwrap();
        assert_eq!(map["ssl"], Value::Bool(true));
        assert_eq!(map["db_username"], Value::from("rwuser"));
        assert_eq!(map["port"], Value::from("8635"));

        let schema = DdsInstances.schema();
        let mut d = ResourceData::from_config(&schema, &HashMap::new());
        d.set("instances", Value::List(vec![flat])).unwrap();
    }
}
