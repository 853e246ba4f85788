pub mod apig;
pub mod dds;
pub mod dms;
pub mod ecs;
pub mod ims;

use hwcloud_core::provider::ProviderError;

use crate::config::ConfigError;

/// Error for a service client that could not be built
pub(crate) fn client_error(service: &str) -> impl FnOnce(ConfigError) -> ProviderError + '_ {
    move |e| ProviderError::new(format!("Error creating HuaweiCloud {} client", service)).with_cause(e)
}
