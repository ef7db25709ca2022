//! Raw record access on a connection
//!
//! These functions work on any `&Connection`, including the one handed to a
//! [`Store::transaction`](super::Store::transaction) closure, which is how
//! multi-step writes stay all-or-nothing.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::Collection;
use crate::error::LedgerError;

/// Read and decode a record. `Ok(None)` means the key is absent.
pub fn get<T: DeserializeOwned>(
    conn: &Connection,
    collection: Collection,
    key: &str,
) -> Result<Option<T>, LedgerError> {
    match get_text(conn, collection, key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Read a record as an untyped JSON value
pub fn get_value(
    conn: &Connection,
    collection: Collection,
    key: &str,
) -> Result<Option<Value>, LedgerError> {
    get(conn, collection, key)
}

/// Insert or overwrite a record
pub fn put<T: Serialize + ?Sized>(
    conn: &Connection,
    collection: Collection,
    key: &str,
    value: &T,
) -> Result<(), LedgerError> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO records (collection, key, value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(collection, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
        params![collection.name(), key, text],
    )?;
    debug!(collection = collection.name(), key, bytes = text.len(), "Put record");
    Ok(())
}

/// Keys present in a collection, in insertion order
pub fn list_keys(conn: &Connection, collection: Collection) -> Result<Vec<String>, LedgerError> {
    let mut stmt =
        conn.prepare_cached("SELECT key FROM records WHERE collection = ?1 ORDER BY rowid")?;
    let keys = stmt
        .query_map(params![collection.name()], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
}

/// Delete one record. Returns whether it existed.
pub fn delete(conn: &Connection, collection: Collection, key: &str) -> Result<bool, LedgerError> {
    let removed = conn.execute(
        "DELETE FROM records WHERE collection = ?1 AND key = ?2",
        params![collection.name(), key],
    )?;
    Ok(removed > 0)
}

/// Delete every record of a collection. Returns the number removed.
pub fn delete_collection(conn: &Connection, collection: Collection) -> Result<usize, LedgerError> {
    let removed = conn.execute(
        "DELETE FROM records WHERE collection = ?1",
        params![collection.name()],
    )?;
    debug!(collection = collection.name(), removed, "Cleared collection");
    Ok(removed)
}

fn get_text(
    conn: &Connection,
    collection: Collection,
    key: &str,
) -> Result<Option<String>, LedgerError> {
    let mut stmt =
        conn.prepare_cached("SELECT value FROM records WHERE collection = ?1 AND key = ?2")?;
    let text = stmt
        .query_row(params![collection.name(), key], |row| row.get(0))
        .optional()?;
    Ok(text)
}
