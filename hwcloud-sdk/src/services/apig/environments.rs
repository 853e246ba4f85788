use serde::{Deserialize, Serialize};

use super::PAGE_LIMIT;
use crate::client::{ServiceClient, with_query};
use crate::error::SdkResult;

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentOpts {
    pub name: String,
    pub remark: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub remark: String,
    pub create_time: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    /// Exact name filter
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListPage {
    total: usize,
    envs: Vec<Environment>,
}

pub fn root_url(c: &ServiceClient, instance_id: &str) -> String {
    c.service_url(&["instances", instance_id, "envs"])
}

pub fn resource_url(c: &ServiceClient, instance_id: &str, id: &str) -> String {
    c.service_url(&["instances", instance_id, "envs", id])
}

pub async fn create(
    c: &ServiceClient,
    instance_id: &str,
    opts: &EnvironmentOpts,
) -> SdkResult<Environment> {
    c.post(&root_url(c, instance_id), opts, &[201]).await
}

/// All environments matching `opts`, following offset pages
pub async fn list(
    c: &ServiceClient,
    instance_id: &str,
    opts: &ListOpts,
) -> SdkResult<Vec<Environment>> {
    let mut all = Vec::new();
    loop {
        let url = with_query(
            &root_url(c, instance_id),
            &[
                ("name", opts.name.clone()),
                ("offset", all.len().to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ],
        )?;
        let page: ListPage = c.get(&url, &[200]).await?;
        let received = page.envs.len();
        all.extend(page.envs);
        if received == 0 || all.len() >= page.total {
            return Ok(all);
        }
    }
}

pub async fn update(
    c: &ServiceClient,
    instance_id: &str,
    id: &str,
    opts: &EnvironmentOpts,
) -> SdkResult<Environment> {
    c.put(&resource_url(c, instance_id, id), opts, &[200]).await
}

pub async fn delete(c: &ServiceClient, instance_id: &str, id: &str) -> SdkResult<()> {
    c.delete(&resource_url(c, instance_id, id), &[204]).await
}
