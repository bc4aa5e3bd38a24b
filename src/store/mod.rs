//! Persistence backends for review state.
//!
//! The scheduler only talks to [`StateStore`]; which backend sits behind it is
//! chosen at startup (see `config::StorageBackend`).

pub mod json_file;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::domain::ReviewState;
use crate::error::StoreResult;

/// Durable per-item store of review states.
///
/// Implementations fill in `ReviewState::item_id` from the key on every read.
/// Reads return owned copies, so callers can iterate a snapshot while other
/// threads keep writing.
pub trait StateStore: Send + Sync {
    fn get(&self, item_id: &str) -> StoreResult<Option<ReviewState>>;

    /// Insert or overwrite the state stored under `state.item_id`.
    fn set(&self, state: &ReviewState) -> StoreResult<()>;

    /// Delete one item. Removing an absent item is not an error.
    fn remove(&self, item_id: &str) -> StoreResult<()>;

    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Every stored state, in no particular order.
    fn snapshot(&self) -> StoreResult<Vec<ReviewState>>;

    /// Drop everything and store exactly `states`.
    fn replace_all(&self, states: Vec<ReviewState>) -> StoreResult<()>;

    fn clear(&self) -> StoreResult<()>;

    fn len(&self) -> StoreResult<usize> {
        Ok(self.keys()?.len())
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Build the store selected by `config`.
pub fn open_store(config: &Config) -> StoreResult<Arc<dyn StateStore>> {
    let store: Arc<dyn StateStore> = match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory review state; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Json => Arc::new(JsonFileStore::open(&config.storage_path)?),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.storage_path, config.store_timeout)?),
    };
    Ok(store)
}

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }
}
