//! Provider configuration
//!
//! Settings come from the `provider "huaweicloud"` block first and fall back
//! to `HW_*` environment variables.

use std::collections::HashMap;
use std::time::Duration;

use hwcloud_core::resource::Value;
use hwcloud_sdk::{Credentials, ProviderClient, SdkError, ServiceClient};
use thiserror::Error;

use crate::mutexkv::MutexKv;
use crate::resource_data::ResourceData;

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("region is required: set it in the provider block or HW_REGION_NAME")]
    MissingRegion,

    #[error(
        "credentials are required: set access_key and secret_key (HW_ACCESS_KEY, HW_SECRET_KEY) or auth_token (HW_AUTH_TOKEN)"
    )]
    MissingCredentials,

    #[error("project_id is required to build the {service} client (HW_PROJECT_ID)")]
    MissingProjectId { service: String },

    #[error("invalid provider attribute '{name}': {message}")]
    InvalidAttribute { name: String, message: String },

    #[error("failed to build {service} client: {source}")]
    Client {
        service: String,
        #[source]
        source: SdkError,
    },
}

/// Resolved provider configuration shared by every resource handler
#[derive(Debug)]
pub struct Config {
    pub region: String,
    pub project_id: String,
    pub cloud: String,
    pub enterprise_project_id: String,
    pub max_retries: u32,
    pub insecure: bool,
    /// Service name to endpoint URL overrides, e.g. `dms = "http://..."`
    pub endpoints: HashMap<String, String>,
    /// Replaces every poller delay and interval; meant for tests
    pub poll_interval_override: Option<Duration>,
    /// Serializes mutations of resources sharing a backing pool
    pub mutex_kv: MutexKv,
    client: ProviderClient,
}

impl Config {
    /// Build from a provider block, using the process environment for
    /// anything the block leaves out
    pub fn load(block: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        Self::load_with_env(block, |key| std::env::var(key).ok())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&HashMap::new())
    }

    pub fn load_with_env(
        block: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let setting = |name: &str, var: &str| -> Option<String> {
            block
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| env(var))
                .filter(|s| !s.is_empty())
        };

        let region = setting("region", "HW_REGION_NAME").ok_or(ConfigError::MissingRegion)?;

        let credentials = match (
            setting("access_key", "HW_ACCESS_KEY"),
            setting("secret_key", "HW_SECRET_KEY"),
        ) {
            (Some(access_key), Some(secret_key)) => Credentials::AkSk {
                access_key,
                secret_key,
                security_token: setting("security_token", "HW_SECURITY_TOKEN"),
            },
            _ => match setting("auth_token", "HW_AUTH_TOKEN") {
                Some(token) => Credentials::Token(token),
                None => return Err(ConfigError::MissingCredentials),
            },
        };

        let max_retries = match block.get("max_retries") {
            Some(v) => {
                let n = v.as_int().ok_or_else(|| ConfigError::InvalidAttribute {
                    name: "max_retries".to_string(),
                    message: "expected a number".to_string(),
                })?;
                u32::try_from(n).map_err(|_| ConfigError::InvalidAttribute {
                    name: "max_retries".to_string(),
                    message: format!("{} is out of range", n),
                })?
            }
            None => DEFAULT_MAX_RETRIES,
        };

        let insecure = block
            .get("insecure")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let endpoints = match block.get("endpoints") {
            Some(Value::Map(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            Some(_) => {
                return Err(ConfigError::InvalidAttribute {
                    name: "endpoints".to_string(),
                    message: "expected a map of service names to URLs".to_string(),
                });
            }
            None => HashMap::new(),
        };

        let client = ProviderClient::new(credentials, max_retries, insecure).map_err(|source| {
            ConfigError::Client {
                service: "http".to_string(),
                source,
            }
        })?;

        Ok(Self {
            region,
            project_id: setting("project_id", "HW_PROJECT_ID").unwrap_or_default(),
            cloud: setting("cloud", "HW_CLOUD").unwrap_or_else(|| DEFAULT_CLOUD.to_string()),
            enterprise_project_id: setting("enterprise_project_id", "HW_ENTERPRISE_PROJECT_ID")
                .unwrap_or_default(),
            max_retries,
            insecure,
            endpoints,
            poll_interval_override: None,
            mutex_kv: MutexKv::new(),
            client,
        })
    }

    pub fn with_poll_interval_override(mut self, interval: Duration) -> Self {
        self.poll_interval_override = Some(interval);
        self
    }

    /// Region of a resource: its own `region` attribute, else the provider's
    pub fn region_or<'a>(&'a self, region: &'a str) -> &'a str {
        if region.is_empty() {
            &self.region
        } else {
            region
        }
    }

    /// Region of a resource as an owned string, from its `region` attribute
    pub fn get_region(&self, d: &ResourceData) -> String {
        self.region_or(&d.get_string("region")).to_string()
    }

    /// `enterprise_project_id` of a resource, else the provider's
    pub fn get_enterprise_project_id(&self, d: &ResourceData) -> String {
        let eps = d.get_string("enterprise_project_id");
        if eps.is_empty() {
            self.enterprise_project_id.clone()
        } else {
            eps
        }
    }

    /// Endpoint for a service: an override from `endpoints`, else
    /// `https://{service}.{region}.{cloud}/`
    pub fn endpoint(&self, service: &str, region: &str) -> String {
        match self.endpoints.get(service) {
            Some(url) => url.clone(),
            None => format!("https://{}.{}.{}/", service, region, self.cloud),
        }
    }

    pub fn dms_v2_client(&self, region: &str) -> Result<ServiceClient, ConfigError> {
        self.project_client("dms", region, "v2")
    }

    pub fn apig_v2_client(&self, region: &str) -> Result<ServiceClient, ConfigError> {
        let project = self.require_project("apig")?;
        self.service_client("apig", region, &format!("v2/{}/apigw", project))
    }

    pub fn dds_v3_client(&self, region: &str) -> Result<ServiceClient, ConfigError> {
        self.project_client("dds", region, "v3")
    }

    pub fn ecs_client(&self, region: &str) -> Result<ServiceClient, ConfigError> {
        self.project_client("ecs", region, "v2.1")
    }

    /// Image service; not project scoped
    pub fn ims_v2_client(&self, region: &str) -> Result<ServiceClient, ConfigError> {
        self.service_client("ims", region, "v2")
    }

    fn project_client(
        &self,
        service: &str,
        region: &str,
        version: &str,
    ) -> Result<ServiceClient, ConfigError> {
        let project = self.require_project(service)?;
        self.service_client(service, region, &format!("{}/{}", version, project))
    }

    fn require_project(&self, service: &str) -> Result<&str, ConfigError> {
        if self.project_id.is_empty() {
            Err(ConfigError::MissingProjectId {
                service: service.to_string(),
            })
        } else {
            Ok(&self.project_id)
        }
    }

    fn service_client(
        &self,
        service: &str,
        region: &str,
        resource_base: &str,
    ) -> Result<ServiceClient, ConfigError> {
        let endpoint = self.endpoint(service, self.region_or(region));
        ServiceClient::new(
            self.client.clone(),
            &endpoint,
            resource_base,
            &self.project_id,
        )
        .map_err(|source| ConfigError::Client {
            service: service.to_string(),
            source,
        })
    }
}
