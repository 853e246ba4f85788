//! Keyed mutex
//!
//! Hands out one async lock per key. Locks are created on first use and
//! live as long as the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct MutexKv {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MutexKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on `key`; it is released when the guard drops
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        debug!("Locking {:?}", key);
        let guard = self.get(key).lock_owned().await;
        debug!("Locked {:?}", key);
        guard
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
