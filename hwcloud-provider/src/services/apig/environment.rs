use async_trait::async_trait;
use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use hwcloud_sdk::services::apig::environments::{self, EnvironmentOpts, ListOpts};
use log::{debug, warn};

use super::{apig_client, instance_id_schema};
use crate::common::{MultiError, check_deleted, parse_composite_id, region_schema};
use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::resources::ResourceHandler;

/// `huaweicloud_apig_environment`
///
/// The service has no single-environment GET; reads list the instance's
/// environments and pick the one with the stored ID.
pub struct ApigEnvironment;

fn opts(d: &ResourceData) -> EnvironmentOpts {
    EnvironmentOpts {
        name: d.get_string("name"),
        remark: d.get_string("description"),
    }
}

#[async_trait]
impl ResourceHandler for ApigEnvironment {
    fn name(&self) -> &'static str {
        "huaweicloud_apig_environment"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .with_description("Environment of a dedicated APIG instance")
            .attribute(region_schema())
            .attribute(instance_id_schema())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed_only())
            .importable()
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d)?;
        let opts = opts(d);
        debug!("Create APIG environment with options: {:?}", opts);
        let env = environments::create(&client, &d.get_string("instance_id"), &opts)
            .await
            .map_err(|e| {
                ProviderError::new("Error creating HuaweiCloud APIG environment").with_cause(e)
            })?;
        d.set_id(env.id);
        self.read(cfg, d).await
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = apig_client(cfg, d)?;
        let instance_id = d.get_string("instance_id");

        let all = match environments::list(&client, &instance_id, &ListOpts::default()).await {
            Ok(all) => all,
            Err(e) => return check_deleted(d, e, "Error querying APIG environments"),
        };
        let Some(env) = all.into_iter().find(|e| e.id == d.id()) else {
            warn!(
                "APIG environment {} not found in instance {}, removing from state",
                d.id(),
                instance_id
            );
            d.set_id("");
            return Ok(());
        };

        let mut errs = MultiError::new();
        errs.check(d.set("region", region));
        errs.check(d.set("name", env.name));
        errs.check(d.set("description", env.remark));
        errs.check(d.set("created_at", env.create_time));
        errs.into_result("Error saving APIG environment fields")
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d)?;
        let id = d.id().to_string();
        if d.has_changes(&["name", "description"]) {
            let opts = opts(d);
            debug!("Update APIG environment {} with options: {:?}", id, opts);
            environments::update(&client, &d.get_string("instance_id"), &id, &opts)
                .await
                .map_err(|e| {
                    ProviderError::new(format!("Error updating APIG environment ({})", id))
                        .with_cause(e)
                })?;
        }
        self.read(cfg, d).await
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = apig_client(cfg, d)?;
        let id = d.id().to_string();
        if let Err(e) = environments::delete(&client, &d.get_string("instance_id"), &id).await {
            return check_deleted(d, e, "Error deleting HuaweiCloud APIG environment");
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
