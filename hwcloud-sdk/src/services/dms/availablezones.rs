use serde::Deserialize;

use crate::client::ServiceClient;
use crate::error::SdkResult;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AvailableZone {
    pub id: String,
    pub code: String,
    pub name: String,
    pub port: String,
    pub resource_availability: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListResponse {
    pub region_id: String,
    pub available_zones: Vec<AvailableZone>,
}

pub fn list_url(c: &ServiceClient) -> String {
    c.endpoint_url(&["v2", "available-zones"])
}

pub async fn list(c: &ServiceClient) -> SdkResult<Vec<AvailableZone>> {
    let resp: ListResponse = c.get(&list_url(c), &[200]).await?;
    Ok(resp.available_zones)
}
