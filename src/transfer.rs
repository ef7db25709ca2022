//! Import and export files
//!
//! A transfer file is a single JSON object of one of two shapes:
//!
//! - configuration: any of `people`, `services`, `goals`, `settings`
//! - user data: one object per week record key, each holding the six
//!   week-scoped collections (`avsAssignments`, `insuranceAgreements`,
//!   `precalibratedTVs`, `repairTickets`, `qualityInspections`, `weekDates`)
//!
//! Files are parsed completely before anything is written. A file that
//! matches neither shape is rejected as a whole. Calendar-week keys in
//! user data are upgraded on the way in, and an import is applied in one
//! transaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::{catalog, records, weeks, Collection, Store};
use crate::error::LedgerError;
use crate::key;
use crate::models::{GoalDefinition, Person, Service, Settings, WeekRecords};

/// Top-level fields of a configuration file
const CONFIG_FIELDS: [&str; 4] = ["people", "services", "goals", "settings"];

/// Configuration export. Absent fields are left alone on import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<Person>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<Service>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<GoalDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// User data export: week record key -> that week's records
pub type UserData = BTreeMap<String, WeekRecords>;

/// A validated transfer file
#[derive(Debug, Clone, PartialEq)]
pub enum ImportFile {
    Config(ConfigExport),
    /// Keys already upgraded to budget-year keys
    UserData(UserData),
}

/// What an import wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Configuration sections replaced
    pub sections: usize,
    /// Weeks touched
    pub weeks: usize,
    /// Line items written
    pub line_items: usize,
}

impl ImportFile {
    /// Validate a transfer file without touching the store
    pub fn parse(json: &str) -> Result<Self, LedgerError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| LedgerError::ImportRejected(format!("not JSON: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(LedgerError::ImportRejected(
                "top level must be an object".to_string(),
            ));
        };
        if map.is_empty() {
            return Err(LedgerError::ImportRejected("file is empty".to_string()));
        }

        if map.keys().any(|k| CONFIG_FIELDS.contains(&k.as_str())) {
            let config: ConfigExport = serde_json::from_value(Value::Object(map))
                .map_err(|e| LedgerError::ImportRejected(format!("configuration: {}", e)))?;
            return Ok(ImportFile::Config(config));
        }

        let mut data = UserData::new();
        for (record_key, week_value) in map {
            let week_key = normalize_import_key(&record_key)?;
            let week: WeekRecords = serde_json::from_value(week_value).map_err(|e| {
                LedgerError::ImportRejected(format!("week '{}': {}", record_key, e))
            })?;
            match data.get_mut(&week_key) {
                Some(existing) => append_week(existing, week),
                None => {
                    data.insert(week_key, week);
                }
            }
        }
        Ok(ImportFile::UserData(data))
    }
}

/// Upgrade keys lacking the budget-year separator, then validate
fn normalize_import_key(record_key: &str) -> Result<String, LedgerError> {
    let week_key = if record_key.contains('/') {
        record_key.to_string()
    } else {
        key::upgrade_legacy_key(record_key)
            .map_err(|e| LedgerError::ImportRejected(format!("key '{}': {}", record_key, e)))?
    };
    key::decode(&week_key)
        .map_err(|e| LedgerError::ImportRejected(format!("key '{}': {}", record_key, e)))?;
    Ok(week_key)
}

/// Two file entries for the same week: concatenate line items, keep the
/// first date label per day
fn append_week(into: &mut WeekRecords, from: WeekRecords) {
    into.avs_assignments.extend(from.avs_assignments);
    into.insurance_agreements.extend(from.insurance_agreements);
    into.precalibrated_tvs.extend(from.precalibrated_tvs);
    into.repair_tickets.extend(from.repair_tickets);
    into.quality_inspections.extend(from.quality_inspections);
    for (day, label) in from.week_dates {
        into.week_dates.entry(day).or_insert(label);
    }
}

/// Collections present in the import replace the stored ones for that week;
/// collections absent from it are kept
fn overlay_week(stored: &mut WeekRecords, incoming: WeekRecords) {
    if !incoming.avs_assignments.is_empty() {
        stored.avs_assignments = incoming.avs_assignments;
    }
    if !incoming.insurance_agreements.is_empty() {
        stored.insurance_agreements = incoming.insurance_agreements;
    }
    if !incoming.precalibrated_tvs.is_empty() {
        stored.precalibrated_tvs = incoming.precalibrated_tvs;
    }
    if !incoming.repair_tickets.is_empty() {
        stored.repair_tickets = incoming.repair_tickets;
    }
    if !incoming.quality_inspections.is_empty() {
        stored.quality_inspections = incoming.quality_inspections;
    }
    if !incoming.week_dates.is_empty() {
        stored.week_dates = incoming.week_dates;
    }
}

/// Apply a validated file in one transaction
pub fn import(store: &Store, file: ImportFile) -> Result<ImportSummary, LedgerError> {
    let summary = store.transaction(|conn| {
        let mut summary = ImportSummary::default();
        match file {
            ImportFile::Config(config) => {
                if let Some(people) = &config.people {
                    records::put(conn, Collection::People, catalog::LIST_KEY, people)?;
                    summary.sections += 1;
                }
                if let Some(services) = &config.services {
                    records::put(conn, Collection::Services, catalog::LIST_KEY, services)?;
                    summary.sections += 1;
                }
                if let Some(goals) = &config.goals {
                    records::put(conn, Collection::Goals, catalog::LIST_KEY, goals)?;
                    summary.sections += 1;
                }
                if let Some(settings) = &config.settings {
                    records::put(conn, Collection::Settings, catalog::SETTINGS_KEY, settings)?;
                    summary.sections += 1;
                }
            }
            ImportFile::UserData(data) => {
                for (week_key, incoming) in data {
                    summary.line_items += incoming.line_item_count();
                    let mut stored = weeks::read_week(conn, &week_key)?;
                    overlay_week(&mut stored, incoming);
                    weeks::write_week(conn, &week_key, &stored)?;
                    summary.weeks += 1;
                }
            }
        }
        Ok(summary)
    })?;
    info!(
        sections = summary.sections,
        weeks = summary.weeks,
        line_items = summary.line_items,
        "Import applied"
    );
    Ok(summary)
}

/// Parse and apply a transfer file
pub fn import_json(store: &Store, json: &str) -> Result<ImportSummary, LedgerError> {
    import(store, ImportFile::parse(json)?)
}

pub fn export_config(store: &Store) -> Result<ConfigExport, LedgerError> {
    Ok(ConfigExport {
        people: Some(catalog::get_people(store)?),
        services: Some(catalog::get_services(store)?),
        goals: Some(catalog::get_goals(store)?),
        settings: Some(catalog::get_settings(store)?),
    })
}

/// Every stored week, keyed by record key
pub fn export_user_data(store: &Store) -> Result<UserData, LedgerError> {
    store.with_conn(|conn| {
        let mut data = UserData::new();
        for collection in Collection::WEEKLY {
            for week_key in records::list_keys(conn, collection)? {
                if data.contains_key(&week_key) || key::decode(&week_key).is_err() {
                    continue;
                }
                let week = weeks::read_week(conn, &week_key)?;
                if !week.is_empty() {
                    data.insert(week_key, week);
                }
            }
        }
        Ok(data)
    })
}
