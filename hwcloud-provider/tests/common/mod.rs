//! In-memory Huawei Cloud behind a mock HTTP server
//!
//! Every service endpoint of the provider points at one [`MockServer`]; a
//! single responder routes requests by method and path and keeps the
//! objects it created. Long-running DMS operations move one status per
//! read: `CREATING`, `EXTENDING` and `DELETING` last for exactly one GET.
//! After a resize the instance reports `RUNNING` with its old product for
//! [`STALE_RESIZE_READS`] GETs before the new product shows up.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hwcloud_core::resource::Value;
use hwcloud_provider::{Config, HuaweiCloudProvider};
use serde_json::{Value as Json, json};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PROJECT: &str = "proj";
pub const REGION: &str = "cn-north-4";
pub const APIG_INSTANCE: &str = "apig-inst-1";

pub const PRODUCT_SMALL: &str = "00300-30308-0--0";
pub const SPEC_SMALL: &str = "dms.instance.rabbitmq.single.c3.2u4g";
pub const PRODUCT_LARGE: &str = "00300-30308-0--2";
pub const SPEC_LARGE: &str = "dms.instance.rabbitmq.single.c3.4u8g";

/// GETs that still show the old product once a resized instance is running
pub const STALE_RESIZE_READS: u32 = 2;

#[derive(Default)]
pub struct CloudState {
    pub rabbitmq: BTreeMap<String, Json>,
    pub tags: HashMap<String, Vec<Json>>,
    pub groups: BTreeMap<String, Json>,
    pub envs: BTreeMap<String, Json>,
    pub variables: BTreeMap<String, Json>,
    /// Stale reads left and product fields of a resize in progress
    resizes: HashMap<String, (u32, Json)>,
    /// `METHOD /path` of every request, in order
    pub requests: Vec<String>,
    seq: u64,
}

impl CloudState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.seq += 1;
        format!("{}-{:04}", prefix, self.seq)
    }

    pub fn count(&self, request: &str) -> usize {
        self.requests.iter().filter(|r| r.as_str() == request).count()
    }
}

#[derive(Clone)]
pub struct FakeCloud {
    pub server: Arc<MockServer>,
    pub state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(CloudState::default()));
        Mock::given(any())
            .respond_with(Router {
                state: state.clone(),
            })
            .mount(&server)
            .await;
        Self {
            server: Arc::new(server),
            state,
        }
    }

    pub fn config(&self) -> Config {
        self.config_with(&[])
    }

    /// Provider config with extra provider block attributes
    pub fn config_with(&self, extra: &[(&str, Value)]) -> Config {
        let uri = self.server.uri();
        let endpoints: HashMap<String, Value> = ["dms", "apig", "dds", "ecs", "ims"]
            .iter()
            .map(|s| (s.to_string(), Value::from(uri.as_str())))
            .collect();
        let mut block = HashMap::new();
        block.insert("region".to_string(), Value::from(REGION));
        block.insert("access_key".to_string(), Value::from("AKFAKE"));
        block.insert("secret_key".to_string(), Value::from("SKFAKE"));
        block.insert("project_id".to_string(), Value::from(PROJECT));
        block.insert("max_retries".to_string(), Value::Int(0));
        block.insert("endpoints".to_string(), Value::Map(endpoints));
        for (key, value) in extra {
            block.insert(key.to_string(), value.clone());
        }
        Config::load_with_env(&block, |_| None)
            .unwrap()
            .with_poll_interval_override(Duration::from_millis(5))
    }

    pub fn provider(&self) -> HuaweiCloudProvider {
        HuaweiCloudProvider::new(self.config())
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, CloudState> {
        self.state.lock().unwrap()
    }
}

struct Router {
    state: Arc<Mutex<CloudState>>,
}

fn json_response(status: u16, body: Json) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

fn not_found() -> ResponseTemplate {
    json_response(404, json!({"error_code": "DMS.404", "error_msg": "not found"}))
}

fn str_field(body: &Json, key: &str) -> String {
    body.get(key)
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string()
}

impl Respond for Router {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut s = self.state.lock().unwrap();
        let method = request.method.to_string();
        let path = request.url.path().to_string();
        s.requests.push(format!("{} {}", method, path));

        let body: Json = serde_json::from_slice(&request.body).unwrap_or(Json::Null);
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["v2", "products"]) => json_response(200, products()),
            ("GET", ["v2", "available-zones"]) => json_response(
                200,
                json!({
                    "region_id": REGION,
                    "available_zones": [
                        {"id": "az-id-a", "code": "cn-north-4a", "name": "AZ1"},
                        {"id": "az-id-b", "code": "cn-north-4b", "name": "AZ2"},
                        {"id": "az-id-c", "code": "cn-north-4c", "name": "AZ3"}
                    ]
                }),
            ),

            ("POST", ["v2", PROJECT, "instances"]) => s.create_rabbitmq(body),
            ("GET", ["v2", PROJECT, "instances", id]) => s.get_rabbitmq(id),
            ("PUT", ["v2", PROJECT, "instances", id]) => s.update_rabbitmq(id, &body),
            ("DELETE", ["v2", PROJECT, "instances", id]) => match s.rabbitmq.get_mut(*id) {
                Some(v) => {
                    v["status"] = json!("DELETING");
                    ResponseTemplate::new(204)
                }
                None => not_found(),
            },
            ("POST", ["v2", PROJECT, "instances", id, "extend"]) => s.resize_rabbitmq(id, &body),
            ("GET", ["v2", PROJECT, "rabbitmq", id, "tags"]) => {
                let tags = s.tags.get(*id).cloned().unwrap_or_default();
                json_response(200, json!({ "tags": tags }))
            }
            ("POST", ["v2", PROJECT, "rabbitmq", id, "tags", "action"]) => {
                let tags = s.tags.entry(id.to_string()).or_default();
                let batch = body["tags"].as_array().cloned().unwrap_or_default();
                match body["action"].as_str() {
                    Some("create") => {
                        for t in batch {
                            tags.retain(|old| old["key"] != t["key"]);
                            tags.push(t);
                        }
                    }
                    Some("delete") => tags.retain(|old| !batch.iter().any(|t| t["key"] == old["key"])),
                    _ => return ResponseTemplate::new(400),
                }
                ResponseTemplate::new(204)
            }

            ("POST", ["v2", PROJECT, "apigw", "instances", _, "api-groups"]) => {
                let id = s.next_id("grp");
                let group = json!({
                    "id": id,
                    "name": str_field(&body, "name"),
                    "remark": str_field(&body, "remark"),
                    "status": 1,
                    "register_time": "2024-05-01T08:00:00Z",
                    "update_time": "2024-05-01T08:00:00Z"
                });
                s.groups.insert(id, group.clone());
                json_response(201, group)
            }
            ("GET", ["v2", PROJECT, "apigw", "instances", _, "api-groups", id]) => {
                match s.groups.get(*id) {
                    Some(g) => json_response(200, g.clone()),
                    None => not_found(),
                }
            }
            ("PUT", ["v2", PROJECT, "apigw", "instances", _, "api-groups", id]) => {
                match s.groups.get_mut(*id) {
                    Some(g) => {
                        g["name"] = json!(str_field(&body, "name"));
                        g["remark"] = json!(str_field(&body, "remark"));
                        g["update_time"] = json!("2024-05-02T08:00:00Z");
                        json_response(200, g.clone())
                    }
                    None => not_found(),
                }
            }
            ("DELETE", ["v2", PROJECT, "apigw", "instances", _, "api-groups", id]) => {
                match s.groups.remove(*id) {
                    Some(_) => {
                        let gid = id.to_string();
                        s.variables.retain(|_, v| v["group_id"] != json!(gid));
                        ResponseTemplate::new(204)
                    }
                    None => not_found(),
                }
            }

            ("POST", ["v2", PROJECT, "apigw", "instances", _, "envs"]) => {
                let id = s.next_id("env");
                let env = json!({
                    "id": id,
                    "name": str_field(&body, "name"),
                    "remark": str_field(&body, "remark"),
                    "create_time": "2024-05-01T08:00:00Z"
                });
                s.envs.insert(id, env.clone());
                json_response(201, env)
            }
            ("GET", ["v2", PROJECT, "apigw", "instances", _, "envs"]) => {
                let name = query.get("name").cloned().unwrap_or_default();
                let matching: Vec<Json> = s
                    .envs
                    .values()
                    .filter(|e| name.is_empty() || e["name"] == json!(name))
                    .cloned()
                    .collect();
                page(&query, "envs", matching)
            }
            ("PUT", ["v2", PROJECT, "apigw", "instances", _, "envs", id]) => {
                match s.envs.get_mut(*id) {
                    Some(e) => {
                        e["name"] = json!(str_field(&body, "name"));
                        e["remark"] = json!(str_field(&body, "remark"));
                        json_response(200, e.clone())
                    }
                    None => not_found(),
                }
            }
            ("DELETE", ["v2", PROJECT, "apigw", "instances", _, "envs", id]) => {
                match s.envs.remove(*id) {
                    Some(_) => ResponseTemplate::new(204),
                    None => not_found(),
                }
            }

            ("POST", ["v2", PROJECT, "apigw", "instances", _, "env-variables"]) => {
                let id = s.next_id("var");
                let variable = json!({
                    "id": id,
                    "group_id": str_field(&body, "group_id"),
                    "env_id": str_field(&body, "env_id"),
                    "variable_name": str_field(&body, "variable_name"),
                    "variable_value": str_field(&body, "variable_value")
                });
                s.variables.insert(id, variable.clone());
                json_response(201, variable)
            }
            ("GET", ["v2", PROJECT, "apigw", "instances", _, "env-variables"]) => {
                let group_id = query.get("group_id").cloned().unwrap_or_default();
                let matching: Vec<Json> = s
                    .variables
                    .values()
                    .filter(|v| group_id.is_empty() || v["group_id"] == json!(group_id))
                    .cloned()
                    .collect();
                page(&query, "variables", matching)
            }
            ("DELETE", ["v2", PROJECT, "apigw", "instances", _, "env-variables", id]) => {
                match s.variables.remove(*id) {
                    Some(_) => ResponseTemplate::new(204),
                    None => not_found(),
                }
            }

            ("GET", ["v2.1", PROJECT, "os-availability-zone"]) => json_response(
                200,
                json!({
                    "availabilityZoneInfo": [
                        {"zoneName": "cn-north-4c", "zoneState": {"available": true}},
                        {"zoneName": "cn-north-4a", "zoneState": {"available": true}},
                        {"zoneName": "cn-north-4x", "zoneState": {"available": false}}
                    ]
                }),
            ),
            ("GET", ["v3", PROJECT, "instances"]) => {
                let name = query.get("name").cloned().unwrap_or_default();
                let instances: Vec<Json> = dds_instances()
                    .into_iter()
                    .filter(|i| name.is_empty() || i["name"] == json!(name))
                    .collect();
                let total = instances.len();
                json_response(200, json!({"instances": instances, "total_count": total}))
            }
            ("GET", ["v2", "images"]) => {
                let name = query.get("name").cloned().unwrap_or_default();
                let images: Vec<Json> = images()
                    .into_iter()
                    .filter(|i| name.is_empty() || i["name"] == json!(name))
                    .collect();
                json_response(200, json!({"images": images}))
            }

            _ => not_found(),
        }
    }
}

/// Offset/limit page of `items` under `key`, with the total count
fn page(query: &HashMap<String, String>, key: &str, items: Vec<Json>) -> ResponseTemplate {
    let offset: usize = query.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
    let total = items.len();
    let items: Vec<Json> = items.into_iter().skip(offset).take(limit).collect();
    let mut body = json!({ "total": total });
    body[key] = Json::Array(items);
    json_response(200, body)
}

impl CloudState {
    fn create_rabbitmq(&mut self, body: Json) -> ResponseTemplate {
        if str_field(&body, "password").is_empty() {
            return json_response(400, json!({"error_msg": "password is required"}));
        }
        let id = self.next_id("rabbitmq");
        let storage = body["storage_space"].as_i64().unwrap_or(0);
        let spec = if str_field(&body, "product_id") == PRODUCT_LARGE {
            SPEC_LARGE
        } else {
            SPEC_SMALL
        };
        let or = |key: &str, default: &str| {
            let v = str_field(&body, key);
            if v.is_empty() { default.to_string() } else { v }
        };
        let instance = json!({
            "instance_id": id,
            "name": str_field(&body, "name"),
            "description": str_field(&body, "description"),
            "engine": "rabbitmq",
            "engine_version": str_field(&body, "engine_version"),
            "specification": "2vCPUs 4GB",
            "storage_space": storage,
            "total_storage_space": storage,
            "used_storage_space": 0,
            "connect_address": "192.168.0.100",
            "management_connect_address": "http://192.168.0.100:15672",
            "port": 5672,
            "status": "CREATING",
            "resource_spec_code": spec,
            "type": "single",
            "vpc_id": str_field(&body, "vpc_id"),
            "security_group_id": str_field(&body, "security_group_id"),
            "subnet_id": str_field(&body, "subnet_id"),
            "user_id": "user-1",
            "user_name": "tester",
            "access_user": str_field(&body, "access_user"),
            "maintain_begin": or("maintain_begin", "02:00:00"),
            "maintain_end": or("maintain_end", "06:00:00"),
            "enable_publicip": body["enable_publicip"].as_bool().unwrap_or(false),
            "publicip_id": str_field(&body, "publicip_id"),
            "ssl_enable": body["ssl_enable"].as_bool().unwrap_or(false),
            "enterprise_project_id": or("enterprise_project_id", "0"),
            "storage_spec_code": str_field(&body, "storage_spec_code"),
            "available_zones": body["available_zones"].clone(),
            "product_id": str_field(&body, "product_id")
        });
        let tags = body["tags"].as_array().cloned().unwrap_or_default();
        self.tags.insert(id.clone(), tags);
        self.rabbitmq.insert(id.clone(), instance);
        json_response(200, json!({ "instance_id": id }))
    }

    fn get_rabbitmq(&mut self, id: &str) -> ResponseTemplate {
        let Some(instance) = self.rabbitmq.get_mut(id) else {
            return not_found();
        };
        if instance["status"] == json!("RUNNING") {
            let done = self.resizes.get_mut(id).map(|(stale, _)| {
                let done = *stale == 0;
                *stale = stale.saturating_sub(1);
                done
            });
            if done == Some(true) {
                if let Some((_, Json::Object(resized))) = self.resizes.remove(id) {
                    for (key, value) in resized {
                        instance[key.as_str()] = value;
                    }
                }
            }
        }
        let current = instance.clone();
        match current["status"].as_str() {
            Some("CREATING") | Some("EXTENDING") => instance["status"] = json!("RUNNING"),
            Some("DELETING") => {
                self.rabbitmq.remove(id);
                self.tags.remove(id);
            }
            _ => {}
        }
        json_response(200, current)
    }

    fn update_rabbitmq(&mut self, id: &str, body: &Json) -> ResponseTemplate {
        let Some(instance) = self.rabbitmq.get_mut(id) else {
            return not_found();
        };
        for key in [
            "name",
            "maintain_begin",
            "maintain_end",
            "security_group_id",
            "enterprise_project_id",
        ] {
            let v = str_field(body, key);
            if !v.is_empty() {
                instance[key] = json!(v);
            }
        }
        if let Some(description) = body.get("description") {
            instance["description"] = description.clone();
        }
        if let Some(enable) = body["enable_publicip"].as_bool() {
            instance["enable_publicip"] = json!(enable);
            instance["publicip_id"] = json!(if enable {
                str_field(body, "publicip_id")
            } else {
                String::new()
            });
        }
        ResponseTemplate::new(204)
    }

    fn resize_rabbitmq(&mut self, id: &str, body: &Json) -> ResponseTemplate {
        let Some(instance) = self.rabbitmq.get_mut(id) else {
            return not_found();
        };
        let spec = str_field(body, "new_spec_code");
        let product = if spec == SPEC_LARGE { PRODUCT_LARGE } else { PRODUCT_SMALL };
        instance["status"] = json!("EXTENDING");
        self.resizes.insert(
            id.to_string(),
            (
                STALE_RESIZE_READS,
                json!({
                    "product_id": product,
                    "resource_spec_code": spec,
                    "total_storage_space": body["new_storage_space"].clone(),
                }),
            ),
        );
        json_response(200, json!({"job_id": "job-1"}))
    }
}

fn products() -> Json {
    json!({
        "Hourly": [{
            "name": "rabbitmq",
            "version": "3.7.17",
            "values": [{
                "name": "single",
                "detail": [
                    {"storage": "100", "product_id": PRODUCT_SMALL, "spec_code": SPEC_SMALL},
                    {"storage": "200", "product_id": PRODUCT_LARGE, "spec_code": SPEC_LARGE}
                ]
            }]
        }]
    })
}

fn dds_instances() -> Vec<Json> {
    vec![
        json!({
            "id": "dds-0001",
            "name": "mongo-prod",
            "status": "normal",
            "port": "8635",
            "mode": "ReplicaSet",
            "region": REGION,
            "datastore": {"type": "DDS-Community", "version": "4.0", "storage_engine": "wiredTiger"},
            "enterprise_project_id": "0",
            "db_user_name": "rwuser",
            "ssl": 1,
            "vpc_id": "vpc-1",
            "subnet_id": "subnet-1",
            "security_group_id": "sg-1",
            "tags": [{"key": "env", "value": "prod"}]
        }),
        json!({
            "id": "dds-0002",
            "name": "mongo-dev",
            "status": "normal",
            "port": "8635",
            "mode": "Single",
            "region": REGION,
            "datastore": {"type": "DDS-Community", "version": "3.4", "storage_engine": "wiredTiger"},
            "db_user_name": "rwuser",
            "ssl": 0,
            "vpc_id": "vpc-1",
            "subnet_id": "subnet-1",
            "security_group_id": "sg-1"
        }),
    ]
}

fn images() -> Vec<Json> {
    let image = |id: &str, name: &str, created_at: &str| {
        json!({
            "id": id,
            "name": name,
            "status": "active",
            "visibility": "public",
            "owner": "owner-1",
            "size": 2147483648i64,
            "container_format": "bare",
            "disk_format": "zvhd2",
            "min_disk": 40,
            "min_ram": 1024,
            "checksum": "d41d8cd98f00b204e9800998ecf8427e",
            "created_at": created_at,
            "updated_at": created_at
        })
    };
    vec![
        image("img-old", "Ubuntu 22.04 server 64bit", "2024-01-10T00:00:00Z"),
        image("img-new", "Ubuntu 22.04 server 64bit", "2024-04-10T00:00:00Z"),
        image("img-centos", "CentOS 7.9 64bit", "2024-02-01T00:00:00Z"),
    ]
}
