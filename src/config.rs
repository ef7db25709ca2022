//! Configuration for fiscal-ledger

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fiscal-ledger")
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and this config file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Database file name, relative to `storage_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Use SQLite write-ahead logging
    #[serde(default = "default_true")]
    pub wal: bool,
}

fn default_database_file() -> String {
    "ledger.db".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            database_file: default_database_file(),
            wal: true,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LedgerError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LedgerError::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config rooted at `storage_dir`, all else default
    pub fn with_storage_dir<P: Into<PathBuf>>(storage_dir: P) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    /// Get database path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
