//! Tag and availability zone conversions
//!
//! Tags are a key/value map in configuration and a list of pairs on the
//! wire. Zones are human-facing codes (`cn-north-4a`) in configuration and
//! internal IDs in the DMS API. Both conversions ignore ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use hwcloud_core::resource::Value;
use hwcloud_sdk::ServiceClient;
use hwcloud_sdk::services::dms::availablezones::{self, AvailableZone};
use hwcloud_sdk::services::tags::{self, ResourceTag};
use log::debug;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::resource_data::ResourceData;

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("availability zone code '{0}' is not available in this region")]
    UnknownCode(String),

    #[error("availability zone ID '{0}' is not available in this region")]
    UnknownId(String),

    #[error("failed to query availability zones: {0}")]
    Query(#[from] hwcloud_sdk::SdkError),
}

/// Tag map to the wire format, ordered by key
pub fn expand_resource_tags(tags: &HashMap<String, String>) -> Vec<ResourceTag> {
    let sorted: BTreeMap<&String, &String> = tags.iter().collect();
    sorted
        .into_iter()
        .map(|(k, v)| ResourceTag::new(k.clone(), v.clone()))
        .collect()
}

pub fn tags_to_map(tags: &[ResourceTag]) -> HashMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Batches turning `old` into `new`: tags to delete, then tags to create
///
/// A tag whose value changed is deleted and created again.
pub fn tag_changes(
    old: &HashMap<String, String>,
    new: &HashMap<String, String>,
) -> (Vec<ResourceTag>, Vec<ResourceTag>) {
    let removed: HashMap<String, String> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let added: HashMap<String, String> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (expand_resource_tags(&removed), expand_resource_tags(&added))
}

/// Apply the change of the `tags` attribute through the tag API
pub async fn update_resource_tags(
    client: &ServiceClient,
    d: &ResourceData,
    resource_type: &str,
    id: &str,
) -> Result<(), hwcloud_sdk::SdkError> {
    let (old, new) = d.get_change("tags");
    let (to_delete, to_create) = tag_changes(&string_map(&old), &string_map(&new));

    if !to_delete.is_empty() {
        debug!("Deleting tags of {} {}: {:?}", resource_type, id, to_delete);
        tags::delete(client, resource_type, id, &to_delete).await?;
    }
    if !to_create.is_empty() {
        debug!("Creating tags of {} {}: {:?}", resource_type, id, to_create);
        tags::create(client, resource_type, id, &to_create).await?;
    }
    Ok(())
}

fn string_map(value: &Value) -> HashMap<String, String> {
    crate::resource_data::string_map(value)
}

/// Zone codes to zone IDs, sorted
pub fn zone_ids_by_code(
    zones: &[AvailableZone],
    codes: &[String],
) -> Result<Vec<String>, ZoneError> {
    let ids: BTreeSet<String> = codes
        .iter()
        .map(|code| {
            zones
                .iter()
                .find(|z| &z.code == code)
                .map(|z| z.id.clone())
                .ok_or_else(|| ZoneError::UnknownCode(code.clone()))
        })
        .collect::<Result<_, _>>()?;
    Ok(ids.into_iter().collect())
}

/// Zone IDs to zone codes, sorted
pub fn zone_codes_by_id(zones: &[AvailableZone], ids: &[String]) -> Result<Vec<String>, ZoneError> {
    let codes: BTreeSet<String> = ids
        .iter()
        .map(|id| {
            zones
                .iter()
                .find(|z| &z.id == id)
                .map(|z| z.code.clone())
                .ok_or_else(|| ZoneError::UnknownId(id.clone()))
        })
        .collect::<Result<_, _>>()?;
    Ok(codes.into_iter().collect())
}

/// Look up zone IDs for codes through the DMS availability zone API
pub async fn get_available_zone_ids_by_code(
    client: &ServiceClient,
    codes: &[String],
) -> Result<Vec<String>, ZoneError> {
    let zones = availablezones::list(client).await?;
    let ids = zone_ids_by_code(&zones, codes)?;
    debug!("DMS converted availability zone codes {:?} into IDs {:?}", codes, ids);
    Ok(ids)
}

pub async fn get_available_zone_codes_by_id(
    client: &ServiceClient,
    ids: &[String],
) -> Result<Vec<String>, ZoneError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let zones = availablezones::list(client).await?;
    zone_codes_by_id(&zones, ids)
}

/// Stable ID for a data source result derived from its members
pub fn hashcode_strings(items: &[String]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.as_bytes());
        hasher.update(b"-");
    }
    hex::encode(&hasher.finalize()[..8])
}
