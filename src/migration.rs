//! Record key migration
//!
//! Upgrades week-scoped records from calendar-week keys (`2024-07`) to
//! budget-year keys (`2024/2025-07`) when the stored schema version is
//! older than [`SCHEMA_VERSION`].
//!
//! ## Guarantees
//!
//! - The whole pass, version bump included, runs in one store transaction.
//!   A failure leaves the database exactly as it was.
//! - Re-running is a no-op: upgraded keys are no longer legacy keys, and
//!   the version check short-circuits once the bump has committed.
//! - Two legacy keys landing on the same budget-year week, or a legacy key
//!   landing on an existing one, are merged by concatenating line items.
//!   Nothing is overwritten.
//!
//! ```text
//! NotStarted ──run──▶ InProgress ──commit──▶ Completed
//!                          │
//!                          └──error──▶ Failed (terminal)
//! ```

use std::collections::HashMap;

use rusqlite::Connection;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::db::schema::{self, SCHEMA_VERSION};
use crate::db::{records, Collection, Store};
use crate::error::LedgerError;
use crate::key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    NotStarted,
    InProgress,
    Completed,
    /// Terminal. The store was rolled back; the cause needs a human.
    Failed,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i32,
    pub to_version: i32,
    /// Legacy keys rewritten to budget-year keys
    pub rewritten: usize,
    /// Rewrites that landed on a key already holding data
    pub merged: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.from_version == self.to_version && self.rewritten == 0
    }
}

/// New contents for one collection after upgrading its legacy keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionRewrite {
    /// Records to write, in collection order
    pub upserts: Vec<(String, Value)>,
    /// Legacy keys to delete
    pub removed: Vec<String>,
    pub merged: usize,
}

/// Upgrade every legacy key in a collection's contents.
///
/// `entries` is the full collection in its natural order. Pure: the caller
/// applies the result.
pub fn rewrite_collection(entries: Vec<(String, Value)>) -> Result<CollectionRewrite, LedgerError> {
    let mut contents: HashMap<String, Value> = HashMap::new();
    let mut legacy = Vec::new();
    for (record_key, value) in entries {
        if key::is_legacy_format(&record_key) {
            legacy.push((record_key, value));
        } else {
            contents.insert(record_key, value);
        }
    }

    let mut rewrite = CollectionRewrite::default();
    let mut upsert_order: Vec<String> = Vec::new();
    for (legacy_key, value) in legacy {
        let new_key = key::upgrade_legacy_key(&legacy_key)?;
        let merged = match contents.remove(&new_key) {
            Some(existing) => {
                rewrite.merged += 1;
                merge_values(existing, value).map_err(|reason| {
                    LedgerError::MigrationFailed(format!(
                        "cannot merge '{}' into '{}': {}",
                        legacy_key, new_key, reason
                    ))
                })?
            }
            None => value,
        };
        if !upsert_order.contains(&new_key) {
            upsert_order.push(new_key.clone());
        }
        contents.insert(new_key, merged);
        rewrite.removed.push(legacy_key);
    }

    for new_key in upsert_order {
        if let Some(value) = contents.remove(&new_key) {
            rewrite.upserts.push((new_key, value));
        }
    }
    Ok(rewrite)
}

/// Combine two records for the same week: arrays concatenate (existing
/// first), objects take the union with existing entries winning.
fn merge_values(existing: Value, incoming: Value) -> Result<Value, String> {
    match (existing, incoming) {
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (Value::Object(mut a), Value::Object(b)) => {
            for (k, v) in b {
                a.entry(k).or_insert(v);
            }
            Ok(Value::Object(a))
        }
        (Value::Null, other) | (other, Value::Null) => Ok(other),
        (a, b) => Err(format!(
            "incompatible record shapes {} and {}",
            shape(&a),
            shape(&b)
        )),
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Drives the one-shot key upgrade at startup
#[derive(Debug)]
pub struct MigrationEngine {
    state: MigrationState,
    target_version: i32,
}

impl Default for MigrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationEngine {
    pub fn new() -> Self {
        Self {
            state: MigrationState::NotStarted,
            target_version: SCHEMA_VERSION,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Bring the store up to the current schema version.
    ///
    /// Any error is reported as [`LedgerError::MigrationFailed`] and moves
    /// the engine to `Failed`; later calls refuse to run.
    pub fn run(&mut self, store: &Store) -> Result<MigrationReport, LedgerError> {
        if self.state == MigrationState::Failed {
            return Err(LedgerError::MigrationFailed(
                "an earlier attempt failed; refusing to retry".to_string(),
            ));
        }

        self.state = MigrationState::InProgress;
        let target = self.target_version;
        match store.transaction(|conn| migrate(conn, target)) {
            Ok(report) => {
                self.state = MigrationState::Completed;
                if !report.is_noop() {
                    info!(
                        from = report.from_version,
                        to = report.to_version,
                        rewritten = report.rewritten,
                        merged = report.merged,
                        "Migration completed"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                self.state = MigrationState::Failed;
                error!(error = %e, "Migration failed, store rolled back");
                Err(match e {
                    LedgerError::MigrationFailed(_) => e,
                    other => LedgerError::MigrationFailed(other.to_string()),
                })
            }
        }
    }
}

fn migrate(conn: &Connection, target: i32) -> Result<MigrationReport, LedgerError> {
    let from_version = schema::get_schema_version(conn)?;
    if from_version >= target {
        if from_version > target {
            warn!(
                stored = from_version,
                supported = target,
                "Database was written by a newer build; leaving it untouched"
            );
        }
        return Ok(MigrationReport {
            from_version,
            to_version: from_version,
            ..Default::default()
        });
    }

    info!(from = from_version, to = target, "Migrating record keys");
    let mut report = MigrationReport {
        from_version,
        to_version: target,
        ..Default::default()
    };

    for collection in Collection::WEEKLY {
        let mut entries = Vec::new();
        for record_key in records::list_keys(conn, collection)? {
            if let Some(value) = records::get_value(conn, collection, &record_key)? {
                entries.push((record_key, value));
            }
        }

        let rewrite = rewrite_collection(entries)?;
        for legacy_key in &rewrite.removed {
            records::delete(conn, collection, legacy_key)?;
        }
        for (new_key, value) in &rewrite.upserts {
            records::put(conn, collection, new_key, value)?;
        }

        if !rewrite.removed.is_empty() {
            info!(
                collection = %collection,
                rewritten = rewrite.removed.len(),
                merged = rewrite.merged,
                "Upgraded legacy keys"
            );
        }
        report.rewritten += rewrite.removed.len();
        report.merged += rewrite.merged;
    }

    schema::set_schema_version(conn, target)?;
    Ok(report)
}
