//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP API listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Create missing tables when the database is opened
    #[serde(default = "default_true")]
    pub bootstrap_schema: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            bootstrap_schema: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Rows returned by GET /api/activity without a `limit`
    #[serde(default = "default_activity_limit")]
    pub default_limit: i64,

    /// Upper bound applied to a caller-supplied `limit`
    #[serde(default = "default_activity_max_limit")]
    pub max_limit: i64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            default_limit: default_activity_limit(),
            max_limit: default_activity_max_limit(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("outreach.sqlite3")
}
fn default_true() -> bool {
    true
}
fn default_activity_limit() -> i64 {
    50
}
fn default_activity_max_limit() -> i64 {
    500
}

impl Config {
    /// Reads `path` when it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
