/// Configuration management for the workflow service
///
/// Handles server binding, the durable store location and timeouts, and
/// workflow collection behaviour.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Durable store configuration
    pub storage: StorageConfig,
    /// Workflow collection configuration
    pub workflows: WorkflowConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// SQLite store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the database file (default: "data")
    pub data_dir: String,
    /// Database file name inside `data_dir` (default: "workflows.db")
    pub database_file: String,
    /// How long a write waits on a locked database
    pub busy_timeout_ms: u64,
    /// How long a call waits for a pooled connection
    pub acquire_timeout_ms: u64,
}

/// Workflow collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Store namespace for workflow records
    pub namespace: String,
    /// Queue persistence calls per record id (last issued write wins)
    pub serialize_writes: bool,
}

impl Config {
    /// Full path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join(&self.storage.database_file)
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("STEWARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("STEWARD_PORT", 3005),
            },
            storage: StorageConfig {
                data_dir: std::env::var("STEWARD_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
                database_file: std::env::var("STEWARD_DB_FILE")
                    .unwrap_or_else(|_| "workflows.db".to_string()),
                busy_timeout_ms: env_or("STEWARD_BUSY_TIMEOUT_MS", 5_000),
                acquire_timeout_ms: env_or("STEWARD_ACQUIRE_TIMEOUT_MS", 10_000),
            },
            workflows: WorkflowConfig {
                namespace: std::env::var("STEWARD_NAMESPACE")
                    .unwrap_or_else(|_| "workflows".to_string()),
                serialize_writes: env_or("STEWARD_SERIALIZE_WRITES", true),
            },
        }
    }
}

/// Parse an environment variable, falling back when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
