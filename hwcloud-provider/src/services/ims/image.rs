use async_trait::async_trait;
use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use hwcloud_sdk::services::ims::images::{self, Image, ListOpts};
use log::debug;

use crate::common::{MultiError, region_schema};
use crate::config::Config;
use crate::resource_data::ResourceData;
use crate::resources::DataSourceHandler;
use crate::services::client_error;

/// `huaweicloud_images_image`
pub struct ImagesImage;

fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

/// The only match, or the newest one when `most_recent` is set
fn select_image(mut found: Vec<Image>, most_recent: bool) -> ProviderResult<Image> {
    if found.len() > 1 && !most_recent {
        return Err(ProviderError::new(
            "Your query returned more than one result. Please try a more specific search criteria, or set `most_recent` attribute to true.",
        ));
    }
    // RFC 3339 timestamps in one zone order lexically
    found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    found.pop().ok_or_else(|| {
        ProviderError::new(
            "Your query returned no results. Please change your search criteria and try again.",
        )
    })
}

#[async_trait]
impl DataSourceHandler for ImagesImage {
    fn name(&self) -> &'static str {
        "huaweicloud_images_image"
    }

    fn schema(&self) -> ResourceSchema {
        let int = |name: &str| AttributeSchema::new(name, AttributeType::Int).computed_only();
        ResourceSchema::data_source(self.name())
            .attribute(region_schema())
            .attribute(string("name"))
            .attribute(string("visibility"))
            .attribute(string("owner"))
            .attribute(AttributeSchema::new("most_recent", AttributeType::Bool).with_default(false))
            .attribute(string("status").computed_only())
            .attribute(int("size"))
            .attribute(string("container_format").computed_only())
            .attribute(string("disk_format").computed_only())
            .attribute(int("min_disk_gb"))
            .attribute(int("min_ram_mb"))
            .attribute(string("checksum").computed_only())
            .attribute(string("created_at").computed_only())
            .attribute(string("updated_at").computed_only())
    }

    async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
        let region = cfg.get_region(d);
        let client = cfg.ims_v2_client(&region).map_err(client_error("IMS v2"))?;

        let opts = ListOpts {
            name: d.get_string("name"),
            visibility: d.get_string("visibility"),
            owner: d.get_string("owner"),
            ..Default::default()
        };
        debug!("List images with options: {:?}", opts);
        let found = images::list(&client, &opts)
            .await
            .map_err(|e| ProviderError::new("Error querying images").with_cause(e))?;
        let image = select_image(found, d.get_bool("most_recent"))?;
        debug!("Selected image {}: {:?}", image.id, image);

        d.set_id(image.id.clone());
        let mut errs = MultiError::new();
        errs.check(d.set("region", region));
        errs.check(d.set("name", image.name));
        errs.check(d.set("visibility", image.visibility));
        errs.check(d.set("owner", image.owner));
        errs.check(d.set("status", image.status));
        errs.check(d.set("size", image.size));
        errs.check(d.set("container_format", image.container_format));
        errs.check(d.set("disk_format", image.disk_format));
        errs.check(d.set("min_disk_gb", image.min_disk));
        errs.check(d.set("min_ram_mb", image.min_ram));
        errs.check(d.set("checksum", image.checksum));
        errs.check(d.set("created_at", image.created_at));
        errs.check(d.set("updated_at", image.updated_at));
        errs.into_result("Error saving image fields")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, created_at: &str) -> Image {
        Image {
            id: id.to_string(),
            created_at: created_at.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn single_match() {
        let found = vec![image("a", "2024-01-01T00:00:00Z")];
        assert_eq!(select_image(found, false).unwrap().id, "a");
    }

    #[test]
    fn ambiguous_without_most_recent() {
        let found = vec![
            image("a", "2024-01-01T00:00:00Z"),
            image("b", "2024-03-01T00:00:00Z"),
        ];
        let err = select_image(found.clone(), false).unwrap_err();
        assert!(err.message.contains("more than one result"));
        assert_eq!(select_image(found, true).unwrap().id, "b");
    }

    #[test]
    fn no_match() {
        let err = select_image(Vec::new(), true).unwrap_err();
        assert!(err.message.contains("no results"));
    }
}
