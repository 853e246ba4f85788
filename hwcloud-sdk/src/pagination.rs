//! Link-based pagination helpers
//!
//! Some services return a `next` link that is relative to the service root
//! rather than to the versioned resource base. These helpers rebuild an
//! absolute URL for it.

use regex::Regex;
use reqwest::Url;

use crate::client::normalize_url;
use crate::error::{SdkError, SdkResult};

/// Service root of `url`: query and fragment dropped, path cut before the
/// first version segment (`v2`, `v2.1`, ...)
pub fn base_endpoint(url: &str) -> SdkResult<String> {
    let mut parsed = Url::parse(url).map_err(|e| SdkError::InvalidEndpoint {
        endpoint: url.to_string(),
        message: e.to_string(),
    })?;
    parsed.set_query(None);
    parsed.set_fragment(None);

    let version = version_pattern()?;
    let path = parsed.path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(pos) = segments.iter().position(|s| version.is_match(s)) {
        let prefix: String = segments[..pos].iter().map(|s| format!("{}/", s)).collect();
        parsed.set_path(&format!("/{}", prefix));
    }

    Ok(parsed.to_string())
}

/// Absolute URL of the page named by `next`
///
/// `next` may be absolute or relative; only its path and query are used.
pub fn next_page_url(service_url: &str, next: &str) -> SdkResult<String> {
    let base = normalize_url(&base_endpoint(service_url)?);
    let next_url = Url::parse(&base)
        .and_then(|b| b.join(next))
        .map_err(|e| SdkError::InvalidEndpoint {
            endpoint: next.to_string(),
            message: e.to_string(),
        })?;

    let mut url = format!("{}{}", base, next_url.path().trim_start_matches('/'));
    if let Some(query) = next_url.query() {
        url.push('?');
        url.push_str(query);
    }
    Ok(url)
}

fn version_pattern() -> SdkResult<Regex> {
    Regex::new(r"^v[0-9.]+$").map_err(|e| SdkError::InvalidEndpoint {
        endpoint: String::new(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_endpoint_cuts_at_version() {
        assert_eq!(
            base_endpoint("https://ims.cn-north-4.myhuaweicloud.com/v2/images?limit=10").unwrap(),
            "https://ims.cn-north-4.myhuaweicloud.com/"
        );
        assert_eq!(
            base_endpoint("https://ecs.example.com/v2.1/proj/servers#frag").unwrap(),
            "https://ecs.example.com/"
        );
    }

    #[test]
    fn base_endpoint_keeps_prefix_before_version() {
        assert_eq!(
            base_endpoint("http://127.0.0.1:9000/ims/v2/images").unwrap(),
            "http://127.0.0.1:9000/ims/"
        );
    }

    #[test]
    fn base_endpoint_without_version() {
        assert_eq!(
            base_endpoint("https://ims.example.com/images").unwrap(),
            "https://ims.example.com/images"
        );
    }

    #[test]
    fn next_page_relative_link() {
        let url = next_page_url(
            "https://ims.example.com/v2/images",
            "/v2/images?marker=abc&limit=2",
        )
        .unwrap();
        assert_eq!(url, "https://ims.example.com/v2/images?marker=abc&limit=2");
    }

    #[test]
    fn next_page_absolute_link_uses_service_host() {
        let url = next_page_url(
            "http://127.0.0.1:9000/ims/v2/images",
            "https://internal.example.com/v2/images?marker=m",
        )
        .unwrap();
        assert_eq!(url, "http://127.0.0.1:9000/ims/v2/images?marker=m");
    }

    #[test]
    fn invalid_url_is_error() {
        assert!(base_endpoint("::not a url").is_err());
    }
}
