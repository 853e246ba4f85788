use serde::{Deserialize, Serialize};

use crate::client::ServiceClient;
use crate::error::SdkResult;

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupOpts {
    pub name: String,
    /// Description; sent even when empty so updates can clear it
    pub remark: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub remark: String,
    pub status: i64,
    pub register_time: String,
    pub update_time: String,
}

pub fn root_url(c: &ServiceClient, instance_id: &str) -> String {
    c.service_url(&["instances", instance_id, "api-groups"])
}

pub fn resource_url(c: &ServiceClient, instance_id: &str, id: &str) -> String {
    c.service_url(&["instances", instance_id, "api-groups", id])
}

pub async fn create(c: &ServiceClient, instance_id: &str, opts: &GroupOpts) -> SdkResult<Group> {
    c.post(&root_url(c, instance_id), opts, &[201]).await
}

pub async fn get(c: &ServiceClient, instance_id: &str, id: &str) -> SdkResult<Group> {
    c.get(&resource_url(c, instance_id, id), &[200]).await
}

pub async fn update(
    c: &ServiceClient,
    instance_id: &str,
    id: &str,
    opts: &GroupOpts,
) -> SdkResult<Group> {
    c.put(&resource_url(c, instance_id, id), opts, &[200]).await
}

pub async fn delete(c: &ServiceClient, instance_id: &str, id: &str) -> SdkResult<()> {
    c.delete(&resource_url(c, instance_id, id), &[204]).await
}
