use async_trait::async_trait;
use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use hwcloud_sdk::services::ecs::{self, AvailabilityZone};

use crate::common::{MultiError, region_schema};
use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::resources::DataSourceHandler;
use crate::services::client_error;

/// `huaweicloud_availability_zones`
pub struct AvailabilityZones;

/// Sorted names of the zones in `state`
fn zone_names(zones: &[AvailabilityZone], state: &str) -> Vec<String> {
    let want_available = state == "available";
    let mut names: Vec<String> = zones
        .iter()
        .filter(|z| z.zone_state.available == want_available)
        .map(|z| z.zone_name.clone())
        .collect();
    names.sort();
    names
}

#[async_trait]
impl DataSourceHandler for AvailabilityZones {
    fn name(&self) -> &'static str {
        "huaweicloud_availability_zones"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::data_source(self.name())
            .attribute(region_schema())
            .attribute(
                AttributeSchema::new(
                    "state",
                    AttributeType::Enum(vec!["available".to_string(), "unavailable".to_string()]),
                )
                .with_default("available"),
            )
            .attribute(
                AttributeSchema::new("names", AttributeType::List(Box::new(AttributeType::String)))
                    .computed_only(),
            )
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg.ecs_client(&region).map_err(client_error("ECS"))?;

        let zones = ecs::list(&client)
            .await
            .map_err(|e| ProviderError::new("Error retrieving availability zones").with_cause(e))?;
        let names = zone_names(&zones, &d.get_string("state"));

        d.set_id(region.clone());
        let mut errs = MultiError::new();
        errs.check(d.set("region", region));
        errs.check(d.set("names", names));
        errs.into_result("Error saving availability zones")
    }
}
