//! Test utilities for store setup.
//!
//! Every backend gets its files inside one temporary directory, removed when
//! the environment is dropped.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::{Config, StorageBackend};
use crate::error::StoreResult;
use crate::store::{JsonFileStore, MemoryStore, SqliteStore, StateStore};

pub struct TestEnv {
    /// Temporary directory (kept alive for file persistence)
    pub temp: TempDir,
}

impl TestEnv {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            temp: TempDir::new()?,
        })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Config pointing the given backend at a file inside the temp dir.
    pub fn config(&self, backend: StorageBackend) -> Config {
        let file = match backend {
            StorageBackend::Json => "srs_data.json",
            StorageBackend::Memory | StorageBackend::Sqlite => "srs.db",
        };
        Config {
            backend,
            storage_path: self.path().join(backend.as_str()).join(file),
            store_timeout: Duration::from_secs(2),
            ..Config::default()
        }
    }

    /// One fresh store of each kind, labelled for assertion messages.
    pub fn all_stores(&self) -> Vec<(&'static str, Arc<dyn StateStore>)> {
        vec![
            ("memory", Arc::new(MemoryStore::new()) as Arc<dyn StateStore>),
            ("json", Arc::new(self.json_store().expect("json store"))),
            ("sqlite", Arc::new(self.sqlite_store().expect("sqlite store"))),
        ]
    }

    pub fn json_store(&self) -> StoreResult<JsonFileStore> {
        JsonFileStore::open(self.path().join("all/srs_data.json"))
    }

    pub fn sqlite_store(&self) -> StoreResult<SqliteStore> {
        SqliteStore::open(&self.path().join("all/srs.db"), Duration::from_secs(2))
    }
}
