//! Request signing
//!
//! - AK/SK: `SDK-HMAC-SHA256` over a canonical request, dated with `X-Sdk-Date`
//! - Token: a pre-issued `X-Auth-Token`

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::{SdkError, SdkResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGN_ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const HEADER_SDK_DATE: &str = "X-Sdk-Date";
pub const HEADER_SECURITY_TOKEN: &str = "X-Security-Token";
pub const HEADER_AUTH_TOKEN: &str = "X-Auth-Token";

/// Format of `X-Sdk-Date`, always UTC
const SDK_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Clone)]
pub enum Credentials {
    AkSk {
        access_key: String,
        secret_key: String,
        security_token: Option<String>,
    },
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AkSk {
                access_key,
                security_token,
                ..
            } => f
                .debug_struct("AkSk")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .field(
                    "security_token",
                    &security_token.as_ref().map(|_| "<redacted>"),
                )
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

pub fn sdk_date(now: DateTime<Utc>) -> String {
    now.format(SDK_DATE_FORMAT).to_string()
}

/// `Authorization` header value for a request
///
/// `headers` must contain every header that is signed, including `host`
/// and `x-sdk-date`.
pub fn authorization(
    access_key: &str,
    secret_key: &str,
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    body: &[u8],
) -> SdkResult<String> {
    let date = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(HEADER_SDK_DATE))
        .map(|(_, v)| v.clone())
        .ok_or_else(|| SdkError::Credentials(format!("missing {} header", HEADER_SDK_DATE)))?;

    let (canonical, signed_headers) = canonical_request(method, url, headers, body);
    let string_to_sign = format!(
        "{}\n{}\n{}",
        SIGN_ALGORITHM,
        date,
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| SdkError::Credentials(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(format!(
        "{} Access={}, SignedHeaders={}, Signature={}",
        SIGN_ALGORITHM, access_key, signed_headers, signature
    ))
}

/// Canonical request and the `;`-joined list of signed header names
pub fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    body: &[u8],
) -> (String, String) {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    normalized.sort();

    let canonical_headers: String = normalized
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_headers = normalized
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        canonical_uri(url),
        canonical_query(url),
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(body))
    );
    (canonical, signed_headers)
}

/// Path with each segment escaped, always ending in `/`
fn canonical_uri(url: &Url) -> String {
    let mut path = url
        .path()
        .split('/')
        .map(escape)
        .collect::<Vec<_>>()
        .join("/");
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (escape(&k), escape(&v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
