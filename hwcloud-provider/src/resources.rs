//! Resource and data source handlers
//!
//! A handler owns one type name: its schema and the API calls behind each
//! lifecycle operation. Handlers work on a [`ResourceData`] and never see
//! engine states directly; the provider converts in both directions.

use async_trait::async_trait;
use hwcloud_core::provider::{ProviderResult, ResourceType};
use hwcloud_core::schema::ResourceSchema;

use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::services::apig::{ApigEnvironment, ApigGroup};
use crate::services::dds::DdsInstances;
use crate::services::dms::RabbitmqInstance;
use crate::services::ecs::AvailabilityZones;
use crate::services::ims::ImagesImage;

/// CRUD for one managed resource type
///
/// `create` must set the ID before returning. `read` clears the ID when the
/// object is gone. `delete` treats a missing object as success.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;

    /// Decode an import ID into the ID plus any attributes it encodes
    fn import(&self, import_id: &str, d: &mut ResourceData) -> ProviderResult<()> {
        d.set_id(import_id);
        Ok(())
    }
}

/// Read-only lookup; `read` sets the ID of the result
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()>;
}

/// Every managed resource type
pub fn resource_handlers() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Box::new(RabbitmqInstance),
        Box::new(ApigGroup),
        Box::new(ApigEnvironment),
    ]
}

/// Every data source type
pub fn data_source_handlers() -> Vec<Box<dyn DataSourceHandler>> {
    vec![
        Box::new(AvailabilityZones),
        Box::new(DdsInstances),
        Box::new(ImagesImage),
    ]
}

struct HandlerType {
    name: &'static str,
    schema: ResourceSchema,
}

impl ResourceType for HandlerType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn schema(&self) -> ResourceSchema {
        self.schema.clone()
    }
}

/// Type names and schemas of all handlers, for the engine
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    let resources = resource_handlers().into_iter().map(|h| HandlerType {
        name: h.name(),
        schema: h.schema(),
    });
    let data_sources = data_source_handlers().into_iter().map(|h| HandlerType {
        name: h.name(),
        schema: h.schema(),
    });
    resources
        .chain(data_sources)
        .map(|t| Box::new(t) as Box<dyn ResourceType>)
        .collect()
}
