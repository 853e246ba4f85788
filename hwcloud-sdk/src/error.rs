use thiserror::Error;

/// Errors returned by service calls.
///
/// Messages never contain credentials; response bodies are included as
/// returned by the API.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The API answered 404
    #[error("resource not found: {method} {url}")]
    NotFound { method: String, url: String },

    /// The API answered with a status the caller did not expect
    #[error("unexpected status {status} from {method} {url}: {body}")]
    Unexpected {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("invalid credentials: {0}")]
    Credentials(String),
}

impl SdkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::NotFound { .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::NotFound { .. } => Some(404),
            SdkError::Unexpected { status, .. } => Some(*status),
            SdkError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
