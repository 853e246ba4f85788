use std::time::Duration;

use async_trait::async_trait;
use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, TimeoutKind, Timeouts};
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::dms::instances::{self, CreateOpts, Instance, ResizeOpts, UpdateOpts};
use hwcloud_sdk::services::tags;
use log::{debug, info, warn};

use super::{DMS_LOCK, get_product_detail};
use crate::common::{MultiError, check_deleted, region_schema, tags_schema};
use crate::config::Config;
use crate::resource_data::{ResourceData, string_list};
use crate::resources::ResourceHandler;
use crate::services::client_error;
use crate::utils::{
    expand_resource_tags, get_available_zone_codes_by_id, get_available_zone_ids_by_code,
    tags_to_map, update_resource_tags,
};
use crate::wait::{RefreshError, RefreshFuture, StateChangeConf};

const ENGINE: &str = "rabbitmq";
const SERVICE: &str = "DMS";

/// `huaweicloud_dms_rabbitmq_instance`
pub struct RabbitmqInstance;

fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

fn dms_client(cfg: &Config, d: &ResourceData) -> ProviderResult<ServiceClient> {
    cfg.dms_v2_client(&cfg.get_region(d))
        .map_err(client_error(SERVICE))
}

fn instance_state_refresh<'a>(
    client: &'a ServiceClient,
    id: &'a str,
) -> impl Fn() -> RefreshFuture<'a, Instance> + Send + Sync + 'a {
    move || -> RefreshFuture<'a, Instance> {
        Box::pin(async move {
            let v = instances::get(client, id).await?;
            let status = v.status.clone();
            Ok((Some(v), status))
        })
    }
}

/// Reports `PENDING` until the instance runs with the new product
fn resize_state_refresh<'a>(
    client: &'a ServiceClient,
    id: &'a str,
    product_id: &'a str,
) -> impl Fn() -> RefreshFuture<'a, Instance> + Send + Sync + 'a {
    move || -> RefreshFuture<'a, Instance> {
        Box::pin(async move {
            let v = match instances::get(client, id).await {
                Ok(v) => v,
                Err(e) if e.is_not_found() => {
                    return Err(RefreshError::Other(format!(
                        "unable to resize RabbitMQ instance which has been deleted: {}",
                        id
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            let status = if v.status == "RUNNING" && v.product_id != product_id {
                "PENDING".to_string()
            } else {
                v.status.clone()
            };
            Ok((Some(v), status))
        })
    }
}

impl RabbitmqInstance {
    async fn resize(
        &self,
        cfg: &Config,
        d: &ResourceData,
        client: &ServiceClient,
    ) -> ProviderResult<()> {
        let product_id = d.get_string("product_id");
        let product = get_product_detail(
            client,
            ENGINE,
            &d.get_string("engine_version"),
            &product_id,
        )
        .await?;
        let storage = parse_storage(&product.storage)?;

        let opts = ResizeOpts {
            new_spec_code: product.spec_code,
            new_storage_space: storage,
        };
        debug!("Resize DMS RabbitMQ instance {} with options: {:?}", d.id(), opts);
        instances::resize(client, d.id(), &opts)
            .await
            .map_err(|e| ProviderError::new("resize RabbitMQ instance failed").with_cause(e))?;

        StateChangeConf::new(
            &["EXTENDING", "PENDING"],
            &["RUNNING"],
            resize_state_refresh(client, d.id(), &product_id),
        )
        .timeout(d.timeout(TimeoutKind::Update))
        .delay(Duration::from_secs(180))
        .poll_interval(Duration::from_secs(15))
        .poll_override(cfg.poll_interval_override)
        .wait_for_state()
        .await
        .map_err(|e| {
            ProviderError::new(format!(
                "Error waiting for RabbitMQ instance ({}) to resize",
                d.id()
            ))
            .with_cause(e)
        })?;
        Ok(())
    }
}

fn parse_storage(storage: &str) -> ProviderResult<i64> {
    storage.parse().map_err(|_| {
        ProviderError::new(format!("Invalid storage size in product detail: '{}'", storage))
    })
}

#[async_trait]
impl ResourceHandler for RabbitmqInstance {
    fn name(&self) -> &'static str {
        "huaweicloud_dms_rabbitmq_instance"
    }

    fn schema(&self) -> ResourceSchema {
        let computed = |name: &str| string(name).computed_only();
        ResourceSchema::new(self.name())
            .with_description("DMS RabbitMQ instance")
            .attribute(region_schema())
            .attribute(string("name").required())
            .attribute(string("description"))
            .attribute(
                string("engine_version")
                    .with_default("3.7.17")
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("storage_space", AttributeType::Int)
                    .computed()
                    .force_new(),
            )
            .attribute(string("storage_spec_code").required().force_new())
            .attribute(string("access_user").required().force_new())
            .attribute(string("password").required().sensitive().force_new())
            .attribute(string("vpc_id").required().force_new())
            .attribute(string("network_id").required().force_new())
            .attribute(string("security_group_id").required())
            .attribute(
                AttributeSchema::new(
                    "availability_zones",
                    AttributeType::Set(Box::new(AttributeType::String)),
                )
                .computed()
                .force_new()
                .conflicts_with(&["available_zones"]),
            )
            .attribute(
                AttributeSchema::new(
                    "available_zones",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .computed()
                .force_new()
                .at_least_one_of(&["available_zones", "availability_zones"])
                .deprecated("available_zones has deprecated, please use \"availability_zones\" instead."),
            )
            .attribute(string("product_id").required())
            .attribute(string("maintain_begin").computed())
            .attribute(string("maintain_end").computed())
            .attribute(
                AttributeSchema::new("ssl_enable", AttributeType::Bool).force_new(),
            )
            .attribute(string("public_ip_id"))
            .attribute(string("enterprise_project_id").computed())
            .attribute(tags_schema())
            .attribute(computed("engine"))
            .attribute(computed("specification"))
            .attribute(AttributeSchema::new("enable_public_ip", AttributeType::Bool).computed_only())
            .attribute(AttributeSchema::new("used_storage_space", AttributeType::Int).computed_only())
            .attribute(AttributeSchema::new("port", AttributeType::Int).computed_only())
            .attribute(computed("status"))
            .attribute(computed("resource_spec_code"))
            .attribute(computed("user_id"))
            .attribute(computed("user_name"))
            .attribute(computed("connect_address"))
            .attribute(computed("management_connect_address"))
            .attribute(computed("type"))
            .attribute(
                computed("manegement_connect_address").deprecated(
                    "typo in manegement_connect_address, please use \"management_connect_address\" instead.",
                ),
            )
            .with_timeouts(Timeouts {
                create: Some(Duration::from_secs(50 * 60)),
                update: Some(Duration::from_secs(50 * 60)),
                delete: Some(Duration::from_secs(15 * 60)),
                ..Default::default()
            })
            .importable()
    }

    async fn create(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let _lock = cfg.mutex_kv.lock(DMS_LOCK).await;
        let client = dms_client(cfg, d)?;

        let available_zones = match d.get_ok("available_zones") {
            Some(zones) => string_list(&zones),
            None => get_available_zone_ids_by_code(&client, &d.get_string_list("availability_zones"))
                .await
                .map_err(|e| {
                    ProviderError::new("Error getting IDs of the availability zones").with_cause(e)
                })?,
        };

        let mut storage_space = d.get_int("storage_space");
        if storage_space == 0 {
            let product = get_product_detail(
                &client,
                ENGINE,
                &d.get_string("engine_version"),
                &d.get_string("product_id"),
            )
            .await?;
            storage_space = parse_storage(&product.storage)?;
        }

        let public_ip_id = d.get_string("public_ip_id");
        let mut opts = CreateOpts {
            name: d.get_string("name"),
            description: d.get_string("description"),
            engine: ENGINE.to_string(),
            engine_version: d.get_string("engine_version"),
            storage_space,
            access_user: d.get_string("access_user"),
            vpc_id: d.get_string("vpc_id"),
            security_group_id: d.get_string("security_group_id"),
            subnet_id: d.get_string("network_id"),
            available_zones,
            product_id: d.get_string("product_id"),
            maintain_begin: d.get_string("maintain_begin"),
            maintain_end: d.get_string("maintain_end"),
            ssl_enable: d.get_bool("ssl_enable"),
            enable_public_ip: !public_ip_id.is_empty(),
            public_ip_id,
            storage_spec_code: d.get_string("storage_spec_code"),
            enterprise_project_id: cfg.get_enterprise_project_id(d),
            tags: expand_resource_tags(&d.get_string_map("tags")),
            ..Default::default()
        };
        debug!("Create DMS RabbitMQ instance Options: {:?}", opts);
        opts.password = d.get_string("password");

        let v = instances::create(&client, &opts)
            .await
            .map_err(|e| ProviderError::new("Error creating DMS RabbitMQ instance").with_cause(e))?;
        info!("Creating RabbitMQ instance, ID: {}", v.instance_id);

        StateChangeConf::new(
            &["CREATING"],
            &["RUNNING"],
            instance_state_refresh(&client, &v.instance_id),
        )
        .timeout(d.timeout(TimeoutKind::Create))
        .delay(Duration::from_secs(300))
        .min_timeout(Duration::from_secs(10))
        .poll_interval(Duration::from_secs(15))
        .poll_override(cfg.poll_interval_override)
        .wait_for_state()
        .await
        .map_err(|e| {
            ProviderError::new(format!(
                "Error waiting for RabbitMQ instance ({}) to be ready",
                v.instance_id
            ))
            .with_cause(e)
        })?;

        d.set_id(v.instance_id);
        self.read(cfg, d).await
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = dms_client(cfg, d)?;

        let v = match instances::get(&client, d.id()).await {
            Ok(v) => v,
            Err(e) => return check_deleted(d, e, "Error retrieving DMS RabbitMQ instance"),
        };
        debug!("DMS RabbitMQ instance {}: {:?}", d.id(), v);

        let mut errs = MultiError::new();
        let zone_codes = match get_available_zone_codes_by_id(&client, &v.available_zones).await {
            Ok(codes) => codes,
            Err(e) => {
                errs.push(format!("error converting availability zone IDs: {}", e));
                Vec::new()
            }
        };

        errs.check(d.set("region", region));
        errs.check(d.set("name", v.name.clone()));
        errs.check(d.set("description", v.description.clone()));
        errs.check(d.set("engine", v.engine.clone()));
        errs.check(d.set("engine_version", v.engine_version.clone()));
        errs.check(d.set("specification", v.specification.clone()));
        // storage_space holds the total capacity
        errs.check(d.set("storage_space", v.total_storage_space));
        errs.check(d.set("used_storage_space", v.used_storage_space));
        errs.check(d.set("vpc_id", v.vpc_id.clone()));
        errs.check(d.set("security_group_id", v.security_group_id.clone()));
        errs.check(d.set("network_id", v.subnet_id.clone()));
        errs.check(d.set("availability_zones", zone_codes));
        errs.check(d.set("available_zones", v.available_zones.clone()));
        errs.check(d.set("product_id", v.product_id.clone()));
        errs.check(d.set("maintain_begin", v.maintain_begin.clone()));
        errs.check(d.set("maintain_end", v.maintain_end.clone()));
        errs.check(d.set("enable_public_ip", v.enable_public_ip));
        errs.check(d.set("public_ip_id", v.public_ip_id.clone()));
        errs.check(d.set("ssl_enable", v.ssl_enable));
        errs.check(d.set("storage_spec_code", v.storage_spec_code.clone()));
        errs.check(d.set("enterprise_project_id", v.enterprise_project_id.clone()));
        errs.check(d.set("connect_address", v.connect_address.clone()));
        errs.check(d.set("management_connect_address", v.management_connect_address.clone()));
        errs.check(d.set("manegement_connect_address", v.management_connect_address.clone()));
        errs.check(d.set("port", v.port));
        errs.check(d.set("status", v.status.clone()));
        errs.check(d.set("resource_spec_code", v.resource_spec_code.clone()));
        errs.check(d.set("user_id", v.user_id.clone()));
        errs.check(d.set("user_name", v.user_name.clone()));
        errs.check(d.set("type", v.instance_type.clone()));
        errs.check(d.set("access_user", v.access_user.clone()));

        let id = d.id().to_string();
        match tags::get(&client, ENGINE, &id).await {
            Ok(tags) => {
                if let Err(e) = d.set("tags", tags_to_map(&tags)) {
                    errs.push(format!(
                        "error saving tags to state for DMS RabbitMQ instance ({}): {}",
                        id, e
                    ));
                }
            }
            Err(e) => {
                warn!("error fetching tags of DMS RabbitMQ instance ({}): {}", id, e);
                errs.push(format!("error fetching tags of DMS RabbitMQ instance ({}): {}", id, e));
            }
        }

        errs.into_result("failed to set attributes for DMS RabbitMQ instance")
    }

    async fn update(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let _lock = cfg.mutex_kv.lock(DMS_LOCK).await;
        let client = dms_client(cfg, d)?;
        let id = d.id().to_string();

        let mut errs = MultiError::new();
        if d.has_changes(&[
            "name",
            "description",
            "maintain_begin",
            "maintain_end",
            "security_group_id",
            "public_ip_id",
            "enterprise_project_id",
        ]) {
            let mut opts = UpdateOpts {
                description: Some(d.get_string("description")),
                maintain_begin: d.get_string("maintain_begin"),
                maintain_end: d.get_string("maintain_end"),
                security_group_id: d.get_string("security_group_id"),
                enterprise_project_id: d.get_string("enterprise_project_id"),
                ..Default::default()
            };
            if d.has_change("name") {
                opts.name = d.get_string("name");
            }
            if d.has_change("public_ip_id") {
                match d.get_ok("public_ip_id").and_then(|v| v.as_str().map(str::to_string)) {
                    Some(public_ip_id) => {
                        opts.enable_public_ip = Some(true);
                        opts.public_ip_id = public_ip_id;
                    }
                    None => opts.enable_public_ip = Some(false),
                }
            }
            debug!("Update DMS RabbitMQ instance {} with options: {:?}", id, opts);
            if let Err(e) = instances::update(&client, &id, &opts).await {
                errs.push(format!("error updating DMS RabbitMQ Instance: {}", e));
            }
        }

        if d.has_change("tags") {
            if let Err(e) = update_resource_tags(&client, d, ENGINE, &id).await {
                errs.push(format!(
                    "error updating tags of DMS RabbitMQ instance: {}, err: {}",
                    id, e
                ));
            }
        }

        if d.has_change("product_id") {
            if let Err(e) = self.resize(cfg, d, &client).await {
                errs.push(e.detailed());
            }
        }

        errs.into_result("error while updating DMS RabbitMQ instances")?;
        self.read(cfg, d).await
    }

    async fn delete(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let client = dms_client(cfg, d)?;
        let id = d.id().to_string();

        if let Err(e) = instances::delete(&client, &id).await {
            return check_deleted(d, e, "failed to delete DMS RabbitMQ instance");
        }

        debug!("Waiting for DMS RabbitMQ instance ({}) to be deleted", id);
        StateChangeConf::new(
            &["DELETING", "RUNNING", "ERROR"],
            &["DELETED"],
            instance_state_refresh(&client, &id),
        )
        .timeout(d.timeout(TimeoutKind::Delete))
        .delay(Duration::from_secs(90))
        .min_timeout(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(15))
        .poll_override(cfg.poll_interval_override)
        .wait_for_state()
        .await
        .map_err(|e| {
            ProviderError::new(format!(
                "failed to wait for DMS RabbitMQ instance ({}) to be deleted",
                id
            ))
            .with_cause(e)
        })?;

        info!("DMS RabbitMQ instance {} has been deleted", id);
        d.set_id("");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwcloud_core::resource::Value;
    use std::collections::HashMap;

    #[test]
    fn zone_attributes_are_exclusive() {
        let schema = RabbitmqInstance.schema();
        let mut attrs: HashMap<String, Value> = HashMap::new();
        for name in [
            "name",
            "storage_spec_code",
            "access_user",
            "password",
            "vpc_id",
            "network_id",
            "security_group_id",
            "product_id",
        ] {
            attrs.insert(name.to_string(), Value::from("x"));
        }

        assert!(schema.validate(&attrs).is_err());

        attrs.insert(
            "availability_zones".to_string(),
            Value::from(vec!["cn-north-4a".to_string()]),
        );
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("available_zones".to_string(), Value::from(vec!["id-a".to_string()]));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn deprecated_attributes_warn() {
        let schema = RabbitmqInstance.schema();
        let mut attrs: HashMap<String, Value> = HashMap::new();
        attrs.insert("available_zones".to_string(), Value::from(vec!["id-a".to_string()]));
        let warnings = schema.deprecation_warnings(&attrs);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("please use \"availability_zones\" instead"));
    }

    #[test]
    fn storage_from_product() {
        assert_eq!(parse_storage("300").unwrap(), 300);
        assert!(parse_storage("large").is_err());
    }

    #[test]
    fn ssl_enable_has_no_default() {
        let schema = RabbitmqInstance.schema();
        let ssl = schema.attributes.get("ssl_enable").unwrap();
        assert!(ssl.default.is_none());
        assert!(ssl.force_new);
    }

    mod resize_refresh {
        use super::*;
        use hwcloud_sdk::{Credentials, ProviderClient};
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const OLD_PRODUCT: &str = "00300-30308-0--0";
        const NEW_PRODUCT: &str = "00300-30308-0--2";

        async fn instance_server() -> (MockServer, ServiceClient) {
            let server = MockServer::start().await;
            for (id, status, product) in [
                ("mq-old", "RUNNING", OLD_PRODUCT),
                ("mq-new", "RUNNING", NEW_PRODUCT),
                ("mq-extending", "EXTENDING", OLD_PRODUCT),
            ] {
                Mock::given(method("GET"))
                    .and(path(format!("/v2/proj/instances/{}", id)))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                        "instance_id": id,
                        "status": status,
                        "product_id": product,
                    })))
                    .mount(&server)
                    .await;
            }
            Mock::given(method("GET"))
                .and(path("/v2/proj/instances/mq-gone"))
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                    "error_code": "DMS.00404022",
                    "error_msg": "instance not found",
                })))
                .mount(&server)
                .await;

            let provider =
                ProviderClient::new(Credentials::Token("tok".to_string()), 0, false).unwrap();
            let client = ServiceClient::new(provider, &server.uri(), "v2/proj", "proj").unwrap();
            (server, client)
        }

        async fn status_of(client: &ServiceClient, id: &str) -> Result<String, RefreshError> {
            let refresh = resize_state_refresh(client, id, NEW_PRODUCT);
            refresh().await.map(|(_, status)| status)
        }

        #[tokio::test]
        async fn running_with_old_product_is_pending() {
            let (_server, client) = instance_server().await;
            assert_eq!(status_of(&client, "mq-old").await.unwrap(), "PENDING");
        }

        #[tokio::test]
        async fn running_with_new_product_is_running() {
            let (_server, client) = instance_server().await;
            assert_eq!(status_of(&client, "mq-new").await.unwrap(), "RUNNING");
            assert_eq!(status_of(&client, "mq-extending").await.unwrap(), "EXTENDING");
        }

        #[tokio::test]
        async fn deleted_instance_fails_the_resize() {
            let (_server, client) = instance_server().await;
            match status_of(&client, "mq-gone").await {
                Err(RefreshError::Other(message)) => assert!(message.contains("mq-gone")),
                Err(e) => panic!("unexpected error: {e}"),
                Ok(status) => panic!("unexpected status: {status}"),
            }
        }

        #[tokio::test]
        async fn wait_continues_past_running_with_old_product() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v2/proj/instances/mq-1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "instance_id": "mq-1",
                    "status": "RUNNING",
                    "product_id": OLD_PRODUCT,
                })))
                .up_to_n_times(2)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/v2/proj/instances/mq-1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "instance_id": "mq-1",
                    "status": "RUNNING",
                    "product_id": NEW_PRODUCT,
                })))
                .mount(&server)
                .await;
            let provider =
                ProviderClient::new(Credentials::Token("tok".to_string()), 0, false).unwrap();
            let client = ServiceClient::new(provider, &server.uri(), "v2/proj", "proj").unwrap();

            let instance = StateChangeConf::new(
                &["EXTENDING", "PENDING"],
                &["RUNNING"],
                resize_state_refresh(&client, "mq-1", NEW_PRODUCT),
            )
            .timeout(Duration::from_secs(10))
            .poll_interval(Duration::from_millis(5))
            .wait_for_state()
            .await
            .unwrap()
            .unwrap();

            assert_eq!(instance.product_id, NEW_PRODUCT);
            assert_eq!(server.received_requests().await.unwrap().len(), 3);
        }
    }
}
