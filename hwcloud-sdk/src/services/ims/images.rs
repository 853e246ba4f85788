//! Images
//!
//! Listing follows the `next` link returned with each page until the
//! service stops returning one.

use log::debug;
use serde::{Deserialize, Serialize};

use super::urls;
use crate::client::{ServiceClient, with_query};
use crate::error::SdkResult;

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/openstack-images-v2.1-json-patch";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub status: String,
    pub visibility: String,
    pub owner: String,
    pub size: i64,
    pub container_format: String,
    pub disk_format: String,
    pub min_disk: i64,
    pub min_ram: i64,
    pub checksum: String,
    pub protected: bool,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListOpts {
    pub name: String,
    pub visibility: String,
    pub owner: String,
    pub status: String,
    /// Page size; the service default applies when zero
    pub limit: usize,
    pub sort_key: String,
    pub sort_dir: String,
}

impl ListOpts {
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("visibility", self.visibility.clone()),
            ("owner", self.owner.clone()),
            ("status", self.status.clone()),
            (
                "limit",
                if self.limit == 0 {
                    String::new()
                } else {
                    self.limit.to_string()
                },
            ),
            ("sort_key", self.sort_key.clone()),
            ("sort_dir", self.sort_dir.clone()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListPage {
    images: Vec<Image>,
    next: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateOpts {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub container_format: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub disk_format: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub visibility: String,
    pub min_disk: i64,
    pub min_ram: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// One JSON patch operation on an image property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOp {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl UpdateOp {
    pub fn replace(property: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: format!("/{}", property),
            value: Some(value.into()),
        }
    }

    pub fn remove(property: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: format!("/{}", property),
            value: None,
        }
    }
}

pub async fn list(c: &ServiceClient, opts: &ListOpts) -> SdkResult<Vec<Image>> {
    let first = urls::list_url(c);
    let mut url = with_query(&first, &opts.query())?;
    let mut all = Vec::new();
    loop {
        let page: ListPage = c.get(&url, &[200]).await?;
        all.extend(page.images);
        match page.next.filter(|n| !n.is_empty()) {
            Some(next) => {
                url = urls::next_page_url(&first, &next)?;
                debug!("following image list page {}", url);
            }
            None => return Ok(all),
        }
    }
}

pub async fn get(c: &ServiceClient, id: &str) -> SdkResult<Image> {
    c.get(&urls::get_url(c, id), &[200]).await
}

pub async fn create(c: &ServiceClient, opts: &CreateOpts) -> SdkResult<Image> {
    c.post(&urls::create_url(c), opts, &[201]).await
}

pub async fn update(c: &ServiceClient, id: &str, ops: &[UpdateOp]) -> SdkResult<Image> {
    c.patch(&urls::update_url(c, id), JSON_PATCH_CONTENT_TYPE, ops, &[200])
        .await
}

pub async fn delete(c: &ServiceClient, id: &str) -> SdkResult<()> {
    c.delete(&urls::delete_url(c, id), &[204]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_ops_serialize() {
        let ops = vec![UpdateOp::replace("name", "new"), UpdateOp::remove("tags")];
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            serde_json::json!([
                {"op": "replace", "path": "/name", "value": "new"},
                {"op": "remove", "path": "/tags"}
            ])
        );
    }

    #[test]
    fn list_opts_query_skips_zero_limit() {
        let opts = ListOpts {
            name: "ubuntu".to_string(),
            ..Default::default()
        };
        let query = opts.query();
        assert!(query.contains(&("limit", String::new())));
        assert!(query.contains(&("name", "ubuntu".to_string())));
    }
}
