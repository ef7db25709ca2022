//! Error types for fiscal-ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid fiscal period: {0}")]
    InvalidPeriod(String),

    #[error("Malformed record key: {0}")]
    MalformedKey(String),

    #[error("Week {week} does not fit a two-digit record key")]
    KeyOverflow { week: u32 },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreIo(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import rejected: {0}")]
    ImportRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// True for failures of the storage engine itself, as opposed to bad input.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreIo(_) | Self::Database(_) | Self::Io(_))
    }
}
