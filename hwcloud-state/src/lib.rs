//! hwcloud state persistence
//!
//! The engine works on an in-memory map of resource states; this crate
//! stores that map between runs.
//!
//! - **StateFile**: versioned, serial-numbered snapshot of managed resources
//! - **StateBackend**: storage with locking; `LocalBackend` keeps a JSON file
//!   next to a `.lock` file
//! - **LockInfo**: who holds the lock, for which operation, until when
//!
//! ```ignore
//! use hwcloud_state::{LocalBackend, StateBackend, StateFile};
//!
//! let backend = LocalBackend::with_path("hwcloud.state.json".into());
//! let lock = backend.acquire_lock("apply").await?;
//! let mut file = backend.read_state().await?.unwrap_or_default();
//! let mut states = file.to_states()?;
//! // ... plan and apply ...
//! file.replace_states(&states);
//! backend.write_state(&file).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
