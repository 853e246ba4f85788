//! Document Database Service v3

use serde::Deserialize;

use crate::client::{ServiceClient, with_query};
use crate::error::SdkResult;
use crate::services::tags::ResourceTag;

const PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub id: String,
    pub name: String,
    pub mode: String,
    pub vpc_id: String,
    pub subnet_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Datastore {
    #[serde(rename = "type")]
    pub datastore_type: String,
    pub version: String,
    pub storage_engine: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: String,
    /// Returned as a string by the API
    pub port: String,
    pub mode: String,
    pub region: String,
    pub datastore: Datastore,
    pub enterprise_project_id: String,
    pub db_user_name: String,
    /// 1 when SSL is enabled
    pub ssl: i64,
    pub vpc_id: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub tags: Vec<ResourceTag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListPage {
    instances: Vec<Instance>,
    total_count: usize,
}

pub fn list_url(c: &ServiceClient) -> String {
    c.service_url(&["instances"])
}

/// All instances matching `opts`
pub async fn list(c: &ServiceClient, opts: &ListOpts) -> SdkResult<Vec<Instance>> {
    let mut all = Vec::new();
    loop {
        let url = with_query(
            &list_url(c),
            &[
                ("id", opts.id.clone()),
                ("name", opts.name.clone()),
                ("mode", opts.mode.clone()),
                ("vpc_id", opts.vpc_id.clone()),
                ("subnet_id", opts.subnet_id.clone()),
                ("offset", all.len().to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ],
        )?;
        let page: ListPage = c.get(&url, &[200]).await?;
        let received = page.instances.len();
        all.extend(page.instances);
        if received == 0 || all.len() >= page.total_count {
            return Ok(all);
        }
    }
}
