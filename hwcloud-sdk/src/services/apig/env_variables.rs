//! Environment variables of an API group

use serde::{Deserialize, Serialize};

use super::PAGE_LIMIT;
use crate::client::{ServiceClient, with_query};
use crate::error::SdkResult;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateOpts {
    pub group_id: String,
    pub env_id: String,
    pub variable_name: String,
    pub variable_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Variable {
    pub id: String,
    pub group_id: String,
    pub env_id: String,
    pub variable_name: String,
    pub variable_value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub group_id: String,
    pub env_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListPage {
    total: usize,
    variables: Vec<Variable>,
}

pub fn root_url(c: &ServiceClient, instance_id: &str) -> String {
    c.service_url(&["instances", instance_id, "env-variables"])
}

pub fn resource_url(c: &ServiceClient, instance_id: &str, id: &str) -> String {
    c.service_url(&["instances", instance_id, "env-variables", id])
}

pub async fn create(c: &ServiceClient, instance_id: &str, opts: &CreateOpts) -> SdkResult<Variable> {
    c.post(&root_url(c, instance_id), opts, &[201]).await
}

pub async fn list(
    c: &ServiceClient,
    instance_id: &str,
    opts: &ListOpts,
) -> SdkResult<Vec<Variable>> {
    let mut all = Vec::new();
    loop {
        let url = with_query(
            &root_url(c, instance_id),
            &[
                ("group_id", opts.group_id.clone()),
                ("env_id", opts.env_id.clone()),
                ("offset", all.len().to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ],
        )?;
        let page: ListPage = c.get(&url, &[200]).await?;
        let received = page.variables.len();
        all.extend(page.variables);
        if received == 0 || all.len() >= page.total {
            return Ok(all);
        }
    }
}

pub async fn delete(c: &ServiceClient, instance_id: &str, id: &str) -> SdkResult<()> {
    c.delete(&resource_url(c, instance_id, id), &[204]).await
}
