//! Elastic Cloud Server availability zones

use serde::Deserialize;

use crate::client::ServiceClient;
use crate::error::SdkResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneState {
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityZone {
    #[serde(rename = "zoneName")]
    pub zone_name: String,
    #[serde(rename = "zoneState", default)]
    pub zone_state: ZoneState,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(rename = "availabilityZoneInfo", default)]
    zones: Vec<AvailabilityZone>,
}

pub fn list_url(c: &ServiceClient) -> String {
    c.service_url(&["os-availability-zone"])
}

pub async fn list(c: &ServiceClient) -> SdkResult<Vec<AvailabilityZone>> {
    let resp: ListResponse = c.get(&list_url(c), &[200]).await?;
    Ok(resp.zones)
}
