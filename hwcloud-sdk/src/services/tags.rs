//! Common resource tags API
//!
//! Tags live under `{resource_type}/{resource_id}/tags` of the owning
//! service, e.g. `v2/{project}/rabbitmq/{id}/tags` for DMS.

use serde::{Deserialize, Serialize};

use crate::client::ServiceClient;
use crate::error::SdkResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Vec<ResourceTag>,
}

#[derive(Debug, Serialize)]
struct ActionRequest<'a> {
    action: &'a str,
    tags: &'a [ResourceTag],
}

pub fn get_url(c: &ServiceClient, resource_type: &str, id: &str) -> String {
    c.service_url(&[resource_type, id, "tags"])
}

pub fn action_url(c: &ServiceClient, resource_type: &str, id: &str) -> String {
    c.service_url(&[resource_type, id, "tags", "action"])
}

pub async fn get(c: &ServiceClient, resource_type: &str, id: &str) -> SdkResult<Vec<ResourceTag>> {
    let resp: TagsResponse = c.get(&get_url(c, resource_type, id), &[200]).await?;
    Ok(resp.tags)
}

pub async fn create(
    c: &ServiceClient,
    resource_type: &str,
    id: &str,
    tags: &[ResourceTag],
) -> SdkResult<()> {
    let body = ActionRequest {
        action: "create",
        tags,
    };
    c.post_no_content(&action_url(c, resource_type, id), &body, &[204])
        .await
}

pub async fn delete(
    c: &ServiceClient,
    resource_type: &str,
    id: &str,
    tags: &[ResourceTag],
) -> SdkResult<()> {
    let body = ActionRequest {
        action: "delete",
        tags,
    };
    c.post_no_content(&action_url(c, resource_type, id), &body, &[204])
        .await
}
