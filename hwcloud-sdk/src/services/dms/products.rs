//! DMS product catalog

use serde::Deserialize;

use crate::client::{ServiceClient, with_query};
use crate::error::SdkResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(rename = "Hourly", default)]
    pub hourly: Vec<Parameter>,
    #[serde(rename = "Monthly", default)]
    pub monthly: Vec<Parameter>,
}

/// Products of one engine version
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    pub version: String,
    pub values: Vec<ProductValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductValue {
    /// Instance type: `single` or `cluster`
    pub name: String,
    #[serde(rename = "detail")]
    pub details: Vec<Detail>,
}

/// For single-node instances the detail itself is the product; cluster
/// products are listed in `product_info`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Detail {
    pub storage: String,
    pub product_id: String,
    pub spec_code: String,
    pub available_zones: Vec<String>,
    pub unavailable_zones: Vec<String>,
    pub product_info: Vec<ProductInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProductInfo {
    pub storage: String,
    pub product_id: String,
    pub spec_code: String,
    pub available_zones: Vec<String>,
    pub unavailable_zones: Vec<String>,
}

impl From<&Detail> for ProductInfo {
    fn from(d: &Detail) -> Self {
        Self {
            storage: d.storage.clone(),
            product_id: d.product_id.clone(),
            spec_code: d.spec_code.clone(),
            available_zones: d.available_zones.clone(),
            unavailable_zones: d.unavailable_zones.clone(),
        }
    }
}

pub fn list_url(c: &ServiceClient, engine: &str) -> SdkResult<String> {
    with_query(&c.endpoint_url(&["v2", "products"]), &[("engine", engine.to_string())])
}

pub async fn list(c: &ServiceClient, engine: &str) -> SdkResult<ListResponse> {
    c.get(&list_url(c, engine)?, &[200]).await
}
