//! RabbitMQ instances

use serde::{Deserialize, Serialize};

use crate::client::ServiceClient;
use crate::error::SdkResult;
use crate::services::tags::ResourceTag;

#[derive(Clone, Default, Serialize)]
pub struct CreateOpts {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub engine: String,
    pub engine_version: String,
    pub storage_space: i64,
    pub access_user: String,
    pub password: String,
    pub vpc_id: String,
    pub security_group_id: String,
    pub subnet_id: String,
    pub available_zones: Vec<String>,
    pub product_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintain_begin: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintain_end: String,
    pub ssl_enable: bool,
    #[serde(rename = "enable_publicip", skip_serializing_if = "std::ops::Not::not")]
    pub enable_public_ip: bool,
    #[serde(rename = "publicip_id", skip_serializing_if = "String::is_empty")]
    pub public_ip_id: String,
    pub storage_spec_code: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub enterprise_project_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ResourceTag>,
}

impl std::fmt::Debug for CreateOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateOpts")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("engine", &self.engine)
            .field("engine_version", &self.engine_version)
            .field("storage_space", &self.storage_space)
            .field("access_user", &self.access_user)
            .field("password", &"<redacted>")
            .field("vpc_id", &self.vpc_id)
            .field("security_group_id", &self.security_group_id)
            .field("subnet_id", &self.subnet_id)
            .field("available_zones", &self.available_zones)
            .field("product_id", &self.product_id)
            .field("maintain_begin", &self.maintain_begin)
            .field("maintain_end", &self.maintain_end)
            .field("ssl_enable", &self.ssl_enable)
            .field("enable_public_ip", &self.enable_public_ip)
            .field("public_ip_id", &self.public_ip_id)
            .field("storage_spec_code", &self.storage_spec_code)
            .field("enterprise_project_id", &self.enterprise_project_id)
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    pub instance_id: String,
}

/// Fields left empty are not sent. `description` is always sent so it can
/// be cleared.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateOpts {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintain_begin: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintain_end: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub security_group_id: String,
    #[serde(rename = "enable_publicip", skip_serializing_if = "Option::is_none")]
    pub enable_public_ip: Option<bool>,
    #[serde(rename = "publicip_id", skip_serializing_if = "String::is_empty")]
    pub public_ip_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub enterprise_project_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResizeOpts {
    pub new_spec_code: String,
    pub new_storage_space: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResizeResponse {
    #[serde(default)]
    pub job_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub instance_id: String,
    pub name: String,
    pub description: String,
    pub engine: String,
    pub engine_version: String,
    pub specification: String,
    pub storage_space: i64,
    pub total_storage_space: i64,
    pub used_storage_space: i64,
    pub connect_address: String,
    pub management_connect_address: String,
    pub port: i64,
    pub status: String,
    pub resource_spec_code: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub vpc_id: String,
    pub security_group_id: String,
    pub subnet_id: String,
    pub user_id: String,
    pub user_name: String,
    pub access_user: String,
    pub maintain_begin: String,
    pub maintain_end: String,
    #[serde(rename = "enable_publicip")]
    pub enable_public_ip: bool,
    #[serde(rename = "publicip_id")]
    pub public_ip_id: String,
    pub ssl_enable: bool,
    pub enterprise_project_id: String,
    pub storage_spec_code: String,
    pub available_zones: Vec<String>,
    pub product_id: String,
}

pub fn create_url(c: &ServiceClient) -> String {
    c.service_url(&["instances"])
}

pub fn resource_url(c: &ServiceClient, id: &str) -> String {
    c.service_url(&["instances", id])
}

pub fn extend_url(c: &ServiceClient, id: &str) -> String {
    c.service_url(&["instances", id, "extend"])
}

pub async fn create(c: &ServiceClient, opts: &CreateOpts) -> SdkResult<CreateResponse> {
    c.post(&create_url(c), opts, &[200]).await
}

pub async fn get(c: &ServiceClient, id: &str) -> SdkResult<Instance> {
    c.get(&resource_url(c, id), &[200]).await
}

pub async fn update(c: &ServiceClient, id: &str, opts: &UpdateOpts) -> SdkResult<()> {
    c.put_no_content(&resource_url(c, id), opts, &[204]).await
}

pub async fn delete(c: &ServiceClient, id: &str) -> SdkResult<()> {
    c.delete(&resource_url(c, id), &[204]).await
}

pub async fn resize(c: &ServiceClient, id: &str, opts: &ResizeOpts) -> SdkResult<ResizeResponse> {
    c.post(&extend_url(c, id), opts, &[200]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_opts_debug_hides_password() {
        let opts = CreateOpts {
            name: "mq".to_string(),
            password: "Secret@123".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", opts);
        assert!(printed.contains("\"mq\""));
        assert!(!printed.contains("Secret@123"));
    }

    #[test]
    fn create_opts_skip_empty_fields() {
        let opts = CreateOpts {
            name: "mq".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("enable_publicip").is_none());
        assert!(json.get("publicip_id").is_none());
        assert!(json.get("tags").is_none());
        assert_eq!(json["ssl_enable"], false);
    }

    #[test]
    fn update_opts_sends_empty_description() {
        let opts = UpdateOpts {
            description: Some(String::new()),
            enable_public_ip: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json, serde_json::json!({"description": "", "enable_publicip": false}));
    }

    #[test]
    fn instance_tolerates_missing_fields() {
        let inst: Instance = serde_json::from_str(
            r#"{"instance_id":"i-1","status":"RUNNING","type":"single","enable_publicip":true}"#,
        )
        .unwrap();
        assert_eq!(inst.instance_id, "i-1");
        assert_eq!(inst.instance_type, "single");
        assert!(inst.enable_public_ip);
        assert!(inst.available_zones.is_empty());
    }
}
