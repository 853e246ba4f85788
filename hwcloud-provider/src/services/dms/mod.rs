//! Distributed Message Service

mod rabbitmq_instance;

pub use rabbitmq_instance::RabbitmqInstance;

use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::dms::products::{self, ListResponse, ProductInfo};

/// Key of the lock serializing DMS instance mutations
pub(crate) const DMS_LOCK: &str = "DMS";

/// Find a product of an engine version among the pay-per-use products
///
/// Single-node products are the details themselves; cluster products are
/// nested under each detail.
pub(crate) fn find_product(
    catalog: &ListResponse,
    engine_version: &str,
    product_id: &str,
) -> Option<ProductInfo> {
    for param in catalog.hourly.iter().filter(|p| p.version == engine_version) {
        for value in &param.values {
            for detail in &value.details {
                if value.name == "single" {
                    if detail.product_id == product_id {
                        return Some(ProductInfo::from(detail));
                    }
                } else if let Some(info) =
                    detail.product_info.iter().find(|i| i.product_id == product_id)
                {
                    return Some(info.clone());
                }
            }
        }
    }
    None
}

pub(crate) async fn get_product_detail(
    client: &ServiceClient,
    engine: &str,
    engine_version: &str,
    product_id: &str,
) -> ProviderResult<ProductInfo> {
    let catalog = products::list(client, engine)
        .await
        .map_err(|e| ProviderError::new("Error querying product detail").with_cause(e))?;
    find_product(&catalog, engine_version, product_id).ok_or_else(|| {
        ProviderError::new(format!(
            "can not found product detail base on product_id: {}",
            product_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ListResponse {
        serde_json::from_value(serde_json::json!({
            "Hourly": [
                {
                    "name": "rabbitmq",
                    "version": "3.7.17",
                    "values": [
                        {
                            "name": "single",
                            "detail": [
                                {"storage": "100", "product_id": "00300-30308-0--0", "spec_code": "dms.instance.rabbitmq.single.c3.2u4g"}
                            ]
                        },
                        {
                            "name": "cluster",
                            "detail": [
                                {
                                    "storage": "300",
                                    "product_info": [
                                        {"storage": "300", "product_id": "00300-30109-0--0", "spec_code": "dms.instance.rabbitmq.cluster.c3.4u8g.3"}
                                    ]
                                }
                            ]
                        }
                    ]
                },
                {
                    "name": "rabbitmq",
                    "version": "3.8.35",
                    "values": [
                        {"name": "single", "detail": [{"storage": "200", "product_id": "other-version"}]}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn single_product_is_the_detail() {
        let p = find_product(&catalog(), "3.7.17", "00300-30308-0--0").unwrap();
        assert_eq!(p.storage, "100");
        assert_eq!(p.spec_code, "dms.instance.rabbitmq.single.c3.2u4g");
    }

    #[test]
    fn cluster_product_is_nested() {
        let p = find_product(&catalog(), "3.7.17", "00300-30109-0--0").unwrap();
        assert_eq!(p.storage, "300");
        assert_eq!(p.spec_code, "dms.instance.rabbitmq.cluster.c3.4u8g.3");
    }

    #[test]
    fn other_versions_are_ignored() {
        assert!(find_product(&catalog(), "3.7.17", "other-version").is_none());
        assert!(find_product(&catalog(), "3.8.35", "other-version").is_some());
    }
}
