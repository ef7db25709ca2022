//! SQLite-backed record store
//!
//! Every entity kind lives in its own logical collection; each record is a
//! JSON document addressed by `(collection, key)`. Week-scoped collections
//! are keyed by budget-year record keys (see [`crate::key`]), the rest by a
//! singleton key or a budget-year key.
//!
//! ## Tables
//!
//! - `records` - `(collection, key) -> value` JSON documents
//! - `schema_version` - single row holding the on-disk schema version
//!
//! Single process, single writer. Reads and writes are synchronous; a
//! write is visible to the next read as soon as the call returns.

pub mod catalog;
pub mod records;
pub mod schema;
pub mod weeks;

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::LedgerError;

/// Logical collections, one per entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    People,
    Services,
    Goals,
    WeekDates,
    AvsAssignments,
    InsuranceAgreements,
    PrecalibratedTvs,
    RepairTickets,
    QualityInspections,
    Settings,
    BudgetYears,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::People,
        Collection::Services,
        Collection::Goals,
        Collection::WeekDates,
        Collection::AvsAssignments,
        Collection::InsuranceAgreements,
        Collection::PrecalibratedTvs,
        Collection::RepairTickets,
        Collection::QualityInspections,
        Collection::Settings,
        Collection::BudgetYears,
    ];

    /// Collections keyed by week record keys
    pub const WEEKLY: [Collection; 6] = [
        Collection::WeekDates,
        Collection::AvsAssignments,
        Collection::InsuranceAgreements,
        Collection::PrecalibratedTvs,
        Collection::RepairTickets,
        Collection::QualityInspections,
    ];

    /// Name stored in the `collection` column
    pub fn name(self) -> &'static str {
        match self {
            Collection::People => "people",
            Collection::Services => "services",
            Collection::Goals => "goals",
            Collection::WeekDates => "weekDates",
            Collection::AvsAssignments => "avsAssignments",
            Collection::InsuranceAgreements => "insuranceAgreements",
            Collection::PrecalibratedTvs => "precalibratedTVs",
            Collection::RepairTickets => "repairTickets",
            Collection::QualityInspections => "qualityInspections",
            Collection::Settings => "settings",
            Collection::BudgetYears => "budgetYears",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to the ledger database
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database file at `db_path`
    pub fn open(db_path: &Path, wal: bool) -> Result<Self, LedgerError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        }

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        debug!("Opening in-memory SQLite database");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, LedgerError> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::StoreIo(format!("Lock poisoned: {}", e)))
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` under the write lock inside one SQLite transaction.
    ///
    /// Commits only if `f` returns `Ok`; any error rolls back every write
    /// `f` made. `f` must go through [`records`] with the connection it is
    /// given rather than calling back into the `Store`. The error from `f`
    /// is what the caller sees, even if the rollback itself fails.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(out) => {
                tx.commit()?;
                Ok(out)
            }
            Err(e) => {
                debug!(error = %e, "Rolling back transaction");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, cause = %e, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, LedgerError> {
        self.with_conn(|conn| records::get(conn, collection, key))
    }

    pub fn put<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        key: &str,
        value: &T,
    ) -> Result<(), LedgerError> {
        self.with_conn(|conn| records::put(conn, collection, key, value))
    }

    pub fn list_keys(&self, collection: Collection) -> Result<Vec<String>, LedgerError> {
        self.with_conn(|conn| records::list_keys(conn, collection))
    }

    pub fn delete(&self, collection: Collection, key: &str) -> Result<bool, LedgerError> {
        self.with_conn(|conn| records::delete(conn, collection, key))
    }

    pub fn delete_collection(&self, collection: Collection) -> Result<usize, LedgerError> {
        self.with_conn(|conn| records::delete_collection(conn, collection))
    }

    /// Stored schema version (0 for a fresh database)
    pub fn schema_version(&self) -> Result<i32, LedgerError> {
        self.with_conn(schema::get_schema_version)
    }

    /// Record counts per collection
    pub fn stats(&self) -> Result<Vec<(Collection, u64)>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT COUNT(*) FROM records WHERE collection = ?1")?;
            let counts = Collection::ALL
                .iter()
                .map(|c| -> Result<(Collection, u64), LedgerError> {
                    let count: i64 = stmt.query_row([c.name()], |row| row.get(0))?;
                    Ok((*c, count as u64))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(counts)
        })
    }
}

// Re-exports
pub use weeks::list_available_weeks;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_is_none() {
        let store = Store::open_in_memory().unwrap();
        let v: Option<serde_json::Value> = store.get(Collection::People, "list").unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_put_overwrites_and_is_visible() {
        let store = Store::open_in_memory().unwrap();
        store.put(Collection::Settings, "current", &json!({"a": 1})).unwrap();
        store.put(Collection::Settings, "current", &json!({"a": 2})).unwrap();
        let v: serde_json::Value = store.get(Collection::Settings, "current").unwrap().unwrap();
        assert_eq!(v["a"], 2);
        assert_eq!(store.list_keys(Collection::Settings).unwrap(), vec!["current"]);
    }

    #[test]
    fn test_collections_are_isolated() {
        let store = Store::open_in_memory().unwrap();
        store.put(Collection::AvsAssignments, "2024/2025-01", &json!([])).unwrap();
        assert!(store.list_keys(Collection::RepairTickets).unwrap().is_empty());
        assert_eq!(store.list_keys(Collection::AvsAssignments).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_and_delete_collection() {
        let store = Store::open_in_memory().unwrap();
        store.put(Collection::Goals, "a", &json!(1)).unwrap();
        store.put(Collection::Goals, "b", &json!(2)).unwrap();
        assert!(store.delete(Collection::Goals, "a").unwrap());
        assert!(!store.delete(Collection::Goals, "a").unwrap());
        assert_eq!(store.delete_collection(Collection::Goals).unwrap(), 1);
        assert!(store.list_keys(Collection::Goals).unwrap().is_empty());
    }

    #[test]
    fn test_failed_transaction_leaves_no_trace() {
        let store = Store::open_in_memory().unwrap();
        store.put(Collection::People, "list", &json!(["before"])).unwrap();

        let result: Result<(), LedgerError> = store.transaction(|conn| {
            records::put(conn, Collection::People, "list", &json!(["during"]))?;
            records::put(conn, Collection::Services, "list", &json!([]))?;
            records::delete(conn, Collection::People, "list")?;
            Err(LedgerError::StoreIo("boom".into()))
        });
        assert!(matches!(result, Err(LedgerError::StoreIo(ref msg)) if msg == "boom"));

        let people: serde_json::Value = store.get(Collection::People, "list").unwrap().unwrap();
        assert_eq!(people, json!(["before"]));
        assert!(store.list_keys(Collection::Services).unwrap().is_empty());
    }

    #[test]
    fn test_committed_transaction_is_visible() {
        let store = Store::open_in_memory().unwrap();
        store
            .transaction(|conn| {
                records::put(conn, Collection::People, "list", &json!([1]))?;
                records::put(conn, Collection::Services, "list", &json!([2]))
            })
            .unwrap();
        assert!(store.get::<serde_json::Value>(Collection::People, "list").unwrap().is_some());
        assert!(store.get::<serde_json::Value>(Collection::Services, "list").unwrap().is_some());
    }

    #[test]
    fn test_stats_counts_per_collection() {
        let store = Store::open_in_memory().unwrap();
        store.put(Collection::AvsAssignments, "2024/2025-01", &json!([])).unwrap();
        store.put(Collection::AvsAssignments, "2024/2025-02", &json!([])).unwrap();
        let stats = store.stats().unwrap();
        let avs = stats.iter().find(|(c, _)| *c == Collection::AvsAssignments).unwrap();
        assert_eq!(avs.1, 2);
    }
}
