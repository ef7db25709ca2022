//! Week-scoped records
//!
//! Line items for one week are stored as a single JSON array per
//! collection, in entry order. That order is what aggregation ties are
//! broken on, so edits replace in place and never re-sort.

use std::collections::BTreeSet;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{records, Collection, Store};
use crate::calendar::{Day, FiscalPeriod};
use crate::error::LedgerError;
use crate::key;
use crate::models::{
    AvsAssignment, InsuranceAgreementSale, PrecalibratedTvCompletion, QualityInspection,
    RepairTicket, WeekDates, WeekRecords,
};

/// A per-day line item stored in a week-scoped collection
pub trait WeeklyItem: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;

    fn day(&self) -> Day;
}

impl WeeklyItem for AvsAssignment {
    const COLLECTION: Collection = Collection::AvsAssignments;
    fn day(&self) -> Day {
        self.day
    }
}

impl WeeklyItem for InsuranceAgreementSale {
    const COLLECTION: Collection = Collection::InsuranceAgreements;
    fn day(&self) -> Day {
        self.day
    }
}

impl WeeklyItem for PrecalibratedTvCompletion {
    const COLLECTION: Collection = Collection::PrecalibratedTvs;
    fn day(&self) -> Day {
        self.day
    }
}

impl WeeklyItem for RepairTicket {
    const COLLECTION: Collection = Collection::RepairTickets;
    fn day(&self) -> Day {
        self.day
    }
}

impl WeeklyItem for QualityInspection {
    const COLLECTION: Collection = Collection::QualityInspections;
    fn day(&self) -> Day {
        self.day
    }
}

/// Writes only accept current-format keys
fn require_current(week_key: &str) -> Result<(), LedgerError> {
    if key::is_legacy_format(week_key) {
        return Err(LedgerError::MalformedKey(format!(
            "'{}' is a legacy key; writes need a budget-year key",
            week_key
        )));
    }
    key::decode(week_key).map(|_| ())
}

fn read_items<T: WeeklyItem>(conn: &Connection, week_key: &str) -> Result<Vec<T>, LedgerError> {
    Ok(records::get(conn, T::COLLECTION, week_key)?.unwrap_or_default())
}

/// Line items of one kind for a week; empty when nothing is stored
pub fn load_items<T: WeeklyItem>(store: &Store, week_key: &str) -> Result<Vec<T>, LedgerError> {
    store.with_conn(|conn| read_items(conn, week_key))
}

/// Append a line item. Returns its index.
pub fn add_item<T: WeeklyItem>(store: &Store, week_key: &str, item: T) -> Result<usize, LedgerError> {
    require_current(week_key)?;
    store.transaction(|conn| {
        let mut items: Vec<T> = read_items(conn, week_key)?;
        items.push(item);
        records::put(conn, T::COLLECTION, week_key, &items)?;
        debug!(collection = %T::COLLECTION, week_key, count = items.len(), "Added line item");
        Ok(items.len() - 1)
    })
}

/// Replace the line item at `index`
pub fn edit_item<T: WeeklyItem>(
    store: &Store,
    week_key: &str,
    index: usize,
    item: T,
) -> Result<(), LedgerError> {
    require_current(week_key)?;
    store.transaction(|conn| {
        let mut items: Vec<T> = read_items(conn, week_key)?;
        let slot = items.get_mut(index).ok_or_else(|| {
            LedgerError::NotFound(format!("{} item {} in {}", T::COLLECTION, index, week_key))
        })?;
        *slot = item;
        records::put(conn, T::COLLECTION, week_key, &items)
    })
}

/// Remove and return the line item at `index`
pub fn remove_item<T: WeeklyItem>(
    store: &Store,
    week_key: &str,
    index: usize,
) -> Result<T, LedgerError> {
    require_current(week_key)?;
    store.transaction(|conn| {
        let mut items: Vec<T> = read_items(conn, week_key)?;
        if index >= items.len() {
            return Err(LedgerError::NotFound(format!(
                "{} item {} in {}",
                T::COLLECTION,
                index,
                week_key
            )));
        }
        let removed = items.remove(index);
        records::put(conn, T::COLLECTION, week_key, &items)?;
        Ok(removed)
    })
}

/// Set the day's inspection count, replacing any earlier entry for that day
pub fn set_quality_inspection(
    store: &Store,
    week_key: &str,
    day: Day,
    count: f64,
) -> Result<(), LedgerError> {
    require_current(week_key)?;
    store.transaction(|conn| {
        let mut items: Vec<QualityInspection> = read_items(conn, week_key)?;
        items.retain(|qi| qi.day != day);
        items.push(QualityInspection { day, count });
        records::put(conn, Collection::QualityInspections, week_key, &items)
    })
}

pub fn set_week_dates(store: &Store, week_key: &str, dates: &WeekDates) -> Result<(), LedgerError> {
    require_current(week_key)?;
    store.put(Collection::WeekDates, week_key, dates)
}

/// Every week-scoped collection for one key, read in one locked pass
pub fn load_week(store: &Store, week_key: &str) -> Result<WeekRecords, LedgerError> {
    store.with_conn(|conn| read_week(conn, week_key))
}

pub(crate) fn read_week(conn: &Connection, week_key: &str) -> Result<WeekRecords, LedgerError> {
    Ok(WeekRecords {
        avs_assignments: read_items(conn, week_key)?,
        insurance_agreements: read_items(conn, week_key)?,
        precalibrated_tvs: read_items(conn, week_key)?,
        repair_tickets: read_items(conn, week_key)?,
        quality_inspections: read_items(conn, week_key)?,
        week_dates: records::get(conn, Collection::WeekDates, week_key)?.unwrap_or_default(),
    })
}

/// Overwrite every week-scoped collection for one key. Empty collections
/// are deleted rather than stored.
pub(crate) fn write_week(
    conn: &Connection,
    week_key: &str,
    week: &WeekRecords,
) -> Result<(), LedgerError> {
    fn write_or_clear<T: Serialize>(
        conn: &Connection,
        collection: Collection,
        week_key: &str,
        items: &[T],
    ) -> Result<(), LedgerError> {
        if items.is_empty() {
            records::delete(conn, collection, week_key)?;
            Ok(())
        } else {
            records::put(conn, collection, week_key, items)
        }
    }

    write_or_clear(conn, Collection::AvsAssignments, week_key, &week.avs_assignments)?;
    write_or_clear(conn, Collection::InsuranceAgreements, week_key, &week.insurance_agreements)?;
    write_or_clear(conn, Collection::PrecalibratedTvs, week_key, &week.precalibrated_tvs)?;
    write_or_clear(conn, Collection::RepairTickets, week_key, &week.repair_tickets)?;
    write_or_clear(conn, Collection::QualityInspections, week_key, &week.quality_inspections)?;
    if week.week_dates.is_empty() {
        records::delete(conn, Collection::WeekDates, week_key)?;
    } else {
        records::put(conn, Collection::WeekDates, week_key, &week.week_dates)?;
    }
    Ok(())
}

fn has_data(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

/// Current-format week keys holding at least one line item, most recent
/// first
pub fn list_available_weeks(store: &Store) -> Result<Vec<String>, LedgerError> {
    store.with_conn(|conn| {
        let mut periods: BTreeSet<FiscalPeriod> = BTreeSet::new();
        for collection in Collection::WEEKLY {
            if collection == Collection::WeekDates {
                continue;
            }
            for week_key in records::list_keys(conn, collection)? {
                if key::is_legacy_format(&week_key) {
                    continue;
                }
                let Ok(period) = key::decode(&week_key) else {
                    continue;
                };
                let value = records::get_value(conn, collection, &week_key)?;
                if value.as_ref().is_some_and(has_data) {
                    periods.insert(period);
                }
            }
        }
        periods.into_iter().rev().map(key::encode).collect()
    })
}

/// Delete every week-scoped record. Configuration and budget years stay.
pub fn reset_user_data(store: &Store) -> Result<usize, LedgerError> {
    let removed = store.transaction(|conn| {
        let mut removed = 0;
        for collection in Collection::WEEKLY {
            removed += records::delete_collection(conn, collection)?;
        }
        Ok(removed)
    })?;
    info!(removed, "Reset user data");
    Ok(removed)
}

/// Delete every record in every collection. The schema version stays.
pub fn reset_all(store: &Store) -> Result<usize, LedgerError> {
    let removed = store.transaction(|conn| {
        let mut removed = 0;
        for collection in Collection::ALL {
            removed += records::delete_collection(conn, collection)?;
        }
        Ok(removed)
    })?;
    info!(removed, "Reset all data");
    Ok(removed)
}
