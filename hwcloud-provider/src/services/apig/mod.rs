//! API Gateway (dedicated instances)

mod environment;
mod group;

pub use environment::ApigEnvironment;
pub use group::ApigGroup;

use hwcloud_core::provider::ProviderResult;
use hwcloud_core::schema::{AttributeSchema, AttributeType};
use hwcloud_sdk::ServiceClient;

use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::services::client_error;

fn apig_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    cfg.apig_v2_client(&cfg.get_region(d))
        .map_err(client_error("APIG v2"))
}

fn instance_id_schema() -> AttributeSchema {
    AttributeSchema::new("instance_id", AttributeType::String)
        .required()
        .force_new()
        .with_description("ID of the dedicated APIG instance")
}
