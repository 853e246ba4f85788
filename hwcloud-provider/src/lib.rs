//! Huawei Cloud provider for hwcloud
//!
//! ## Module Structure
//!
//! - `provider` - HuaweiCloudProvider, routing engine calls to handlers
//! - `resources` - Handler traits and the registry of supported types
//! - `services` - One handler per resource type or data source
//! - `config` - Provider block and environment settings, service clients
//! - `resource_data` - Typed attribute access for handlers
//! - `wait` - State-change poller for long-running operations
//! - `acceptance` - Harness driving configurations through the engine

pub mod acceptance;
pub mod common;
pub mod config;
pub mod mutexkv;
pub mod provider;
pub mod resource_data;
pub mod resources;
pub mod services;
pub mod utils;
pub mod wait;

pub use config::{Config, ConfigError};
pub use provider::HuaweiCloudProvider;
pub use resource_data::ResourceData;

use hwcloud_core::provider::{BoxFuture, Provider, ProviderResult};
use hwcloud_core::resource::{Resource, ResourceId, State};

impl Provider for HuaweiCloudProvider {
    fn name(&self) -> &'static str {
        "huaweicloud"
    }

    fn resource_types(&self) -> Vec<Box<dyn hwcloud_core::provider::ResourceType>> {
        resources::resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: &str,
        prior: &State,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let prior = prior.clone();
        Box::pin(async move { self.read_resource(&id, &identifier, &prior).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        Box::pin(async move { self.delete_resource(&id, &identifier, &from).await })
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let result = self.import_resource(id, import_id);
        Box::pin(async move { result })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.lookup_data_source(&resource).await })
    }
}
