//! Application configuration.
//!
//! Every setting resolves with the same priority: `config.toml` > environment
//! (a `.env` file is loaded first if present) > built-in default.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::paths;

// ==================== Defaults ====================

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// How long a single storage call may take before the API gives up on it
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Config file looked up in the working directory
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Storage backend ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    Memory,
    Json,
    #[default]
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("unknown storage backend '{}'", s)),
        }
    }
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }

    fn default_path(&self) -> PathBuf {
        match self {
            Self::Json => PathBuf::from(paths::state_json_path()),
            Self::Memory | Self::Sqlite => PathBuf::from(paths::state_db_path()),
        }
    }
}

// ==================== File format ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    storage: Option<StorageSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    backend: Option<String>,
    path: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
    port: Option<u16>,
}

// ==================== Resolved config ====================

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: StorageBackend,
    /// Ignored by the memory backend
    pub storage_path: PathBuf,
    pub store_timeout: Duration,
    pub server_addr: String,
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let backend = StorageBackend::default();
        Self {
            backend,
            storage_path: backend.default_path(),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            server_addr: SERVER_ADDR.to_string(),
            server_port: SERVER_PORT,
        }
    }
}

impl Config {
    /// Load from `config.toml`, `.env` and the process environment.
    pub fn load() -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let file = std::fs::read_to_string(CONFIG_FILE).ok();
        if file.is_some() {
            tracing::info!("Reading configuration from {}", CONFIG_FILE);
        }
        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from raw TOML text and an environment lookup.
    ///
    /// Malformed TOML or values are logged and skipped, never fatal.
    pub fn from_sources(toml_text: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Self {
        let file = match toml_text.map(toml::from_str::<FileConfig>) {
            Some(Ok(file)) => file,
            Some(Err(e)) => {
                tracing::warn!("Ignoring malformed {}: {}", CONFIG_FILE, e);
                FileConfig::default()
            }
            None => FileConfig::default(),
        };
        let storage = file.storage.unwrap_or_default();
        let server = file.server.unwrap_or_default();

        let backend = storage
            .backend
            .or_else(|| env("SRS_STORAGE"))
            .and_then(|raw| match raw.parse::<StorageBackend>() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!("{}, using default", e);
                    None
                }
            })
            .unwrap_or_default();

        let storage_path = storage
            .path
            .or_else(|| env("SRS_STORAGE_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| backend.default_path());

        let timeout_ms = storage
            .timeout_ms
            .or_else(|| env("SRS_STORE_TIMEOUT_MS").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_STORE_TIMEOUT_MS);

        let server_addr = server
            .addr
            .or_else(|| env("SRS_ADDR"))
            .unwrap_or_else(|| SERVER_ADDR.to_string());

        let server_port = server
            .port
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(SERVER_PORT);

        Self {
            backend,
            storage_path,
            store_timeout: Duration::from_millis(timeout_ms),
            server_addr,
            server_port,
        }
    }

    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }
}
