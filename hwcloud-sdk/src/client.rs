//! HTTP clients
//!
//! [`ProviderClient`] holds credentials and the shared connection pool.
//! [`ServiceClient`] binds it to one service endpoint and resource base.

use std::time::Duration;

use log::{debug, warn};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{SdkError, SdkResult};
use crate::signer::{self, Credentials};

/// Statuses that are retried with backoff
const RETRY_STATUSES: &[u16] = &[429, 502, 503, 504];

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    credentials: Credentials,
    max_retries: u32,
    retry_delay: Duration,
}

impl ProviderClient {
    pub fn new(credentials: Credentials, max_retries: u32, insecure: bool) -> SdkResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .user_agent(concat!("hwcloud/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            credentials,
            max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Base delay between retries; doubled on every attempt
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    provider: ProviderClient,
    /// Service root, always ending in `/`
    pub endpoint: String,
    /// Endpoint plus the versioned, project-scoped prefix
    pub resource_base: String,
    pub project_id: String,
}

impl ServiceClient {
    pub fn new(
        provider: ProviderClient,
        endpoint: &str,
        resource_base: &str,
        project_id: &str,
    ) -> SdkResult<Self> {
        let endpoint = normalize_url(endpoint);
        Url::parse(&endpoint).map_err(|e| SdkError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;
        let resource_base = normalize_url(&format!("{}{}", endpoint, resource_base));
        Ok(Self {
            provider,
            endpoint,
            resource_base,
            project_id: project_id.to_string(),
        })
    }

    /// `resource_base` joined with `parts`
    pub fn service_url(&self, parts: &[&str]) -> String {
        format!("{}{}", self.resource_base, parts.join("/"))
    }

    /// `endpoint` joined with `parts`, bypassing the resource base
    pub fn endpoint_url(&self, parts: &[&str]) -> String {
        format!("{}{}", self.endpoint, parts.join("/"))
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, ok: &[u16]) -> SdkResult<T> {
        let body = self.request(Method::GET, url, None, ok).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post<B, T>(&self, url: &str, body: &B, ok: &[u16]) -> SdkResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let body = self
            .request(Method::POST, url, Some((JSON_CONTENT_TYPE, payload)), ok)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// POST whose response body is ignored
    pub async fn post_no_content<B>(&self, url: &str, body: &B, ok: &[u16]) -> SdkResult<()>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        self.request(Method::POST, url, Some((JSON_CONTENT_TYPE, payload)), ok)
            .await?;
        Ok(())
    }

    pub async fn put<B, T>(&self, url: &str, body: &B, ok: &[u16]) -> SdkResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let body = self
            .request(Method::PUT, url, Some((JSON_CONTENT_TYPE, payload)), ok)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn put_no_content<B>(&self, url: &str, body: &B, ok: &[u16]) -> SdkResult<()>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        self.request(Method::PUT, url, Some((JSON_CONTENT_TYPE, payload)), ok)
            .await?;
        Ok(())
    }

    /// PATCH with a caller-chosen content type
    pub async fn patch<B, T>(
        &self,
        url: &str,
        content_type: &str,
        body: &B,
        ok: &[u16],
    ) -> SdkResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let body = self
            .request(Method::PATCH, url, Some((content_type, payload)), ok)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn delete(&self, url: &str, ok: &[u16]) -> SdkResult<()> {
        self.request(Method::DELETE, url, None, ok).await?;
        Ok(())
    }

    /// Send a request, retrying throttling and gateway errors.
    ///
    /// Returns the raw body when the status is one of `ok`.
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<(&str, Vec<u8>)>,
        ok: &[u16],
    ) -> SdkResult<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| SdkError::InvalidEndpoint {
            endpoint: url.to_string(),
            message: e.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            let request = self.build_request(&method, &parsed, body.as_ref())?;
            debug!("{} {}", method, url);
            let response = self.provider.http.execute(request).await?;
            let status = response.status().as_u16();

            if RETRY_STATUSES.contains(&status) && attempt < self.provider.max_retries {
                attempt += 1;
                let delay = self.retry_delay(attempt);
                warn!(
                    "{} {} returned {}, retrying in {:?} ({}/{})",
                    method, url, status, delay, attempt, self.provider.max_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let bytes = response.bytes().await?;
            if ok.contains(&status) {
                return Ok(bytes.to_vec());
            }
            if status == 404 {
                return Err(SdkError::NotFound {
                    method: method.to_string(),
                    url: url.to_string(),
                });
            }
            return Err(SdkError::Unexpected {
                status,
                method: method.to_string(),
                url: url.to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
        self.provider
            .retry_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }

    fn build_request(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&(&str, Vec<u8>)>,
    ) -> SdkResult<reqwest::Request> {
        let content_type = body.map(|(ct, _)| *ct).unwrap_or(JSON_CONTENT_TYPE);
        let payload: &[u8] = body.map(|(_, b)| b.as_slice()).unwrap_or(&[]);

        let mut headers: Vec<(String, String)> =
            vec![("Content-Type".to_string(), content_type.to_string())];
        if !self.project_id.is_empty() {
            headers.push(("X-Project-Id".to_string(), self.project_id.clone()));
        }

        match &self.provider.credentials {
            Credentials::AkSk {
                access_key,
                secret_key,
                security_token,
            } => {
                headers.push((
                    signer::HEADER_SDK_DATE.to_string(),
                    signer::sdk_date(chrono::Utc::now()),
                ));
                if let Some(token) = security_token {
                    headers.push((signer::HEADER_SECURITY_TOKEN.to_string(), token.clone()));
                }
                let mut signed = headers.clone();
                signed.push(("Host".to_string(), host_header(url)));
                let authorization = signer::authorization(
                    access_key,
                    secret_key,
                    method.as_str(),
                    url,
                    &signed,
                    payload,
                )?;
                headers.push(("Authorization".to_string(), authorization));
            }
            Credentials::Token(token) => {
                headers.push((signer::HEADER_AUTH_TOKEN.to_string(), token.clone()));
            }
        }

        let mut builder = self.provider.http.request(method.clone(), url.clone());
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if body.is_some() {
            builder = builder.body(payload.to_vec());
        }
        Ok(builder.build()?)
    }
}

/// `host[:port]` as sent in the Host header
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Ensure a URL ends in `/`
pub fn normalize_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Append query parameters to `url`, skipping empty values
pub fn with_query(url: &str, params: &[(&str, String)]) -> SdkResult<String> {
    let mut parsed = Url::parse(url).map_err(|e| SdkError::InvalidEndpoint {
        endpoint: url.to_string(),
        message: e.to_string(),
    })?;
    let present: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    if !present.is_empty() {
        let mut pairs = parsed.query_pairs_mut();
        for (k, v) in present {
            pairs.append_pair(k, v);
        }
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str, base: &str) -> ServiceClient {
        let provider = ProviderClient::new(Credentials::Token("t".to_string()), 0, false).unwrap();
        ServiceClient::new(provider, endpoint, base, "proj").unwrap()
    }

    #[test]
    fn service_and_endpoint_urls() {
        let c = client("https://dms.cn-north-4.myhuaweicloud.com", "v2/proj");
        assert_eq!(c.endpoint, "https://dms.cn-north-4.myhuaweicloud.com/");
        assert_eq!(
            c.resource_base,
            "https://dms.cn-north-4.myhuaweicloud.com/v2/proj/"
        );
        assert_eq!(
            c.service_url(&["instances", "abc"]),
            "https://dms.cn-north-4.myhuaweicloud.com/v2/proj/instances/abc"
        );
        assert_eq!(
            c.endpoint_url(&["v2", "products"]),
            "https://dms.cn-north-4.myhuaweicloud.com/v2/products"
        );
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let provider = ProviderClient::new(Credentials::Token("t".to_string()), 0, false).unwrap();
        let err = ServiceClient::new(provider, "not a url", "v2", "p").unwrap_err();
        assert!(matches!(err, SdkError::InvalidEndpoint { .. }));
    }

    #[test]
    fn query_skips_empty_values() {
        let url = with_query(
            "https://dds.example.com/v3/p/instances",
            &[("name", "db 1".to_string()), ("mode", String::new())],
        )
        .unwrap();
        assert_eq!(url, "https://dds.example.com/v3/p/instances?name=db+1");

        let untouched = with_query("https://dds.example.com/v3/p/instances", &[]).unwrap();
        assert_eq!(untouched, "https://dds.example.com/v3/p/instances");
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let provider = ProviderClient::new(Credentials::Token("t".to_string()), 5, false)
            .unwrap()
            .with_retry_delay(Duration::from_secs(10));
        let c = ServiceClient::new(provider, "https://x.example.com", "v2", "p").unwrap();
        assert_eq!(c.retry_delay(1), Duration::from_secs(10));
        assert_eq!(c.retry_delay(2), Duration::from_secs(20));
        assert_eq!(c.retry_delay(3), MAX_RETRY_DELAY);
    }

    #[test]
    fn host_header_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/v2").unwrap();
        assert_eq!(host_header(&url), "127.0.0.1:8080");
        let url = Url::parse("https://ecs.example.com/v2").unwrap();
        assert_eq!(host_header(&url), "ecs.example.com");
    }
}
