//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::LedgerError;

/// Schema version this build writes.
///
/// - 0: fresh database, nothing recorded yet
/// - 1: week records keyed by calendar year and plain week number
/// - 2: week records keyed by budget year and budget-year week
pub const SCHEMA_VERSION: i32 = 2;

/// Last schema version that used calendar-week record keys
pub const LEGACY_KEY_VERSION: i32 = 1;

/// Create tables if missing. Never touches the stored version; bumping it
/// is the migration's job.
pub fn init_schema(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(RECORDS_SCHEMA)?;
    debug!("Schema tables ensured");
    Ok(())
}

/// Stored schema version, 0 if none has been written
pub fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// Replace the stored schema version
pub fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    info!(version, "Schema version written");
    Ok(())
}

const RECORDS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- One row per (collection, key); value is the JSON document
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, key)
);
"#;
