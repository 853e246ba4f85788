//! Huawei Cloud provider
//!
//! Routes each engine operation to the handler registered for the resource
//! type and converts between engine states and [`ResourceData`].

use std::collections::HashMap;

use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::resource::{Resource, ResourceId, State, Value};
use hwcloud_core::schema::ResourceSchema;
use log::{debug, info};

use crate::config::{Config, ConfigError};
use crate::resource_data::ResourceData;
use crate::resources::{
    DataSourceHandler, ResourceHandler, data_source_handlers, resource_handlers,
};

pub struct HuaweiCloudProvider {
    config: Config,
    resources: HashMap<&'static str, (Box<dyn ResourceHandler>, ResourceSchema)>,
    data_sources: HashMap<&'static str, (Box<dyn DataSourceHandler>, ResourceSchema)>,
}

impl HuaweiCloudProvider {
    pub fn new(config: Config) -> Self {
        let resources = resource_handlers()
            .into_iter()
            .map(|h| {
                let schema = h.schema();
                (h.name(), (h, schema))
            })
            .collect();
        let data_sources = data_source_handlers()
            .into_iter()
            .map(|h| {
                let schema = h.schema();
                (h.name(), (h, schema))
            })
            .collect();
        Self {
            config,
            resources,
            data_sources,
        }
    }

    /// Build from the attributes of a `provider "huaweicloud"` block
    pub fn from_provider_block(block: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        Ok(Self::new(Config::load(block)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn resource(&self, id: &ResourceId) -> ProviderResult<(&dyn ResourceHandler, &ResourceSchema)> {
        self.resources
            .get(id.resource_type.as_str())
            .map(|(h, s)| (h.as_ref(), s))
            .ok_or_else(|| {
                ProviderError::new(format!("Unsupported resource type: {}", id.resource_type))
            })
    }

    fn data_source(
        &self,
        id: &ResourceId,
    ) -> ProviderResult<(&dyn DataSourceHandler, &ResourceSchema)> {
        self.data_sources
            .get(id.resource_type.as_str())
            .map(|(h, s)| (h.as_ref(), s))
            .ok_or_else(|| {
                ProviderError::new(format!("Unsupported data source: {}", id.resource_type))
            })
    }

    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        prior: &State,
    ) -> ProviderResult<State> {
        let (handler, schema) = self.resource(id)?;
        let mut d = ResourceData::from_state(schema, identifier, &prior.attributes);
        handler.read(&self.config, &mut d).await?;
        Ok(into_state(id, d))
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let (handler, schema) = self.resource(&resource.id)?;
        let mut d = ResourceData::from_config(schema, &resource.attributes);
        info!("{}: creating", resource.id);
        handler.create(&self.config, &mut d).await?;
        if d.id().is_empty() {
            return Err(ProviderError::new(
                "Resource was not found right after it was created",
            ));
        }
        Ok(into_state(&resource.id, d))
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (handler, schema) = self.resource(id)?;
        let mut d = ResourceData::for_update(schema, identifier, &from.attributes, &to.attributes);
        info!("{}: modifying [id={}]", id, identifier);
        handler.update(&self.config, &mut d).await?;
        if d.id().is_empty() {
            return Err(ProviderError::new(format!(
                "Resource {} disappeared while it was being updated",
                identifier
            )));
        }
        Ok(into_state(id, d))
    }

    pub async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> ProviderResult<()> {
        let (handler, schema) = self.resource(id)?;
        let mut d = ResourceData::from_state(schema, identifier, &from.attributes);
        info!("{}: destroying [id={}]", id, identifier);
        handler.delete(&self.config, &mut d).await
    }

    pub fn import_resource(&self, id: &ResourceId, import_id: &str) -> ProviderResult<State> {
        let (handler, schema) = self.resource(id)?;
        let mut d = ResourceData::from_state(schema, "", &HashMap::new());
        handler.import(import_id, &mut d)?;
        debug!("{}: import ID '{}' decoded to '{}'", id, import_id, d.id());
        Ok(into_state(id, d))
    }

    pub async fn lookup_data_source(&self, resource: &Resource) -> ProviderResult<State> {
        let (handler, schema) = self.data_source(&resource.id)?;
        let mut d = ResourceData::from_config(schema, &resource.attributes);
        debug!("{}: reading", resource.id);
        handler.read(&self.config, &mut d).await?;
        let identifier = d.id().to_string();
        Ok(State::existing(resource.id.clone(), d.into_attributes()).with_identifier(identifier))
    }
}

/// An empty ID means the object is gone
fn into_state(id: &ResourceId, d: ResourceData) -> State {
    if d.id().is_empty() {
        return State::not_found(id.clone());
    }
    let identifier = d.id().to_string();
    State::existing(id.clone(), d.into_attributes()).with_identifier(identifier)
}
