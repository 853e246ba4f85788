//! State in a local JSON file, locked by a sibling `.lock` file

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "hwcloud.state.json";

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    /// `path` attribute, else [`Self::DEFAULT_STATE_FILE`]
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let path = config.get_string("path").unwrap_or(Self::DEFAULT_STATE_FILE);
        if path.is_empty() {
            return Err(BackendError::Configuration("path must not be empty".to_string()));
        }
        Ok(Self::with_path(PathBuf::from(path)))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        match fs::read_to_string(&self.lock_path).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| BackendError::InvalidState(format!("unreadable lock file: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io("failed to read lock file")(e)),
        }
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        fs::remove_file(&self.lock_path)
            .await
            .map_err(BackendError::io("failed to remove lock file"))
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io("failed to read state file")(e)),
        };
        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("{}: {}", self.state_path.display(), e))
        })?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(BackendError::InvalidState(format!(
                "state file version {} is newer than supported version {}",
                state.version,
                StateFile::CURRENT_VERSION
            )));
        }
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(stored) = self.read_state().await? {
            if stored.lineage != state.lineage {
                return Err(BackendError::LineageMismatch {
                    stored: stored.lineage,
                    writing: state.lineage.clone(),
                });
            }
            if stored.serial > state.serial {
                return Err(BackendError::StaleSerial {
                    stored: stored.serial,
                    writing: state.serial,
                });
            }
        }

        let content = serde_json::to_string_pretty(state)?;
        let tmp = self.state_path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(BackendError::io("failed to write state file"))?;
        fs::rename(&tmp, &self.state_path)
            .await
            .map_err(BackendError::io("failed to replace state file"))?;
        debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        if let Some(existing) = self.read_lock().await? {
            if !existing.is_expired() {
                return Err(BackendError::locked(&existing));
            }
            warn!(
                "removing expired state lock {} held by {}",
                existing.id, existing.who
            );
            self.remove_lock().await?;
        }

        let lock = LockInfo::new(operation);
        let content = serde_json::to_string_pretty(&lock)?;
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            // Another process won the race
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return match self.read_lock().await? {
                    Some(holder) => Err(BackendError::locked(&holder)),
                    None => Err(BackendError::io("failed to create lock file")(e)),
                };
            }
            Err(e) => return Err(BackendError::io("failed to create lock file")(e)),
        };
        file.write_all(content.as_bytes())
            .await
            .map_err(BackendError::io("failed to write lock file"))?;
        file.flush()
            .await
            .map_err(BackendError::io("failed to write lock file"))?;
        Ok(lock)
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;
        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        self.remove_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        match self.read_lock().await {
            Ok(Some(existing)) if existing.id != lock_id => Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            }),
            Ok(Some(_)) | Err(BackendError::InvalidState(_)) => self.remove_lock().await,
            Ok(None) => Err(BackendError::LockNotFound(lock_id.to_string())),
            Err(e) => Err(e),
        }
    }
}
