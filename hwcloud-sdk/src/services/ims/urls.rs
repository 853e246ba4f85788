use crate::client::ServiceClient;
use crate::error::SdkResult;
use crate::pagination;

pub fn list_url(c: &ServiceClient) -> String {
    c.service_url(&["images"])
}

pub fn create_url(c: &ServiceClient) -> String {
    c.service_url(&["images"])
}

fn image_url(c: &ServiceClient, image_id: &str) -> String {
    c.service_url(&["images", image_id])
}

pub fn get_url(c: &ServiceClient, image_id: &str) -> String {
    image_url(c, image_id)
}

pub fn update_url(c: &ServiceClient, image_id: &str) -> String {
    image_url(c, image_id)
}

pub fn delete_url(c: &ServiceClient, image_id: &str) -> String {
    image_url(c, image_id)
}

/// Absolute URL for the `next` link of a list response
pub fn next_page_url(service_url: &str, requested_next: &str) -> SdkResult<String> {
    pagination::next_page_url(service_url, requested_next)
}
