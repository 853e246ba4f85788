//! State backend trait and errors

use std::collections::HashMap;

use async_trait::async_trait;
use hwcloud_core::resource::Value;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("state is locked by {who} since {created} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
        created: String,
    },

    #[error("lock not found: {0}")]
    LockNotFound(String),

    #[error("lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("backend configuration error: {0}")]
    Configuration(String),

    #[error("invalid state file: {0}")]
    InvalidState(String),

    /// The stored state belongs to another lineage
    #[error("state lineage mismatch: stored {stored}, writing {writing}")]
    LineageMismatch { stored: String, writing: String },

    /// The stored state is newer than the one being written
    #[error("stale state: stored serial {stored}, writing {writing}")]
    StaleSerial { stored: u64, writing: u64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
            created: lock.created.to_rfc3339(),
        }
    }

    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the state file plus an advisory lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Refuses to overwrite another lineage or a newer serial
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Fails with [`BackendError::Locked`] while an unexpired lock exists
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove the lock with `lock_id` regardless of who holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// `backend "type" { ... }` settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    pub fn local() -> Self {
        Self {
            backend_type: "local".to_string(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_names_holder() {
        let lock = LockInfo::new("apply");
        let message = BackendError::locked(&lock).to_string();
        assert!(message.contains(&lock.who));
        assert!(message.contains(&lock.id));
        assert!(message.contains("operation: apply"));
    }

    #[test]
    fn config_attributes() {
        let config = BackendConfig::local().with_attribute("path", "custom.state.json");
        assert_eq!(config.get_string("path"), Some("custom.state.json"));
        assert_eq!(config.get_string("bucket"), None);
    }
}
