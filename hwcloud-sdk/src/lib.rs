//! Vendored Huawei Cloud SDK
//!
//! Service clients with AK/SK signing, URL builders and the request and
//! response types of the services the provider uses.

pub mod client;
pub mod error;
pub mod pagination;
pub mod services;
pub mod signer;

pub use client::{ProviderClient, ServiceClient, normalize_url};
pub use error::{SdkError, SdkResult};
pub use signer::Credentials;
