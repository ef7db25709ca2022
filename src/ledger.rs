//! Startup facade
//!
//! [`Ledger::open`] opens the store and blocks on migration before handing
//! anything out, so no read ever sees a half-migrated store.

use tracing::info;

use crate::aggregation::{self, AggregationEngine, WeekComparison};
use crate::calendar::{self, Day, FiscalPeriod};
use crate::config::Config;
use crate::db::{self, catalog, weeks, Store};
use crate::error::LedgerError;
use crate::key;
use crate::migration::{MigrationEngine, MigrationReport};
use crate::models::WeekDates;
use crate::transfer::{self, ConfigExport, ImportSummary, UserData};

pub struct Ledger {
    store: Store,
    migration: MigrationReport,
}

impl Ledger {
    /// Open the configured database and bring it up to date
    pub fn open(config: &Config) -> Result<Self, LedgerError> {
        let store = Store::open(&config.database_path(), config.wal)?;
        Self::from_store(store)
    }

    /// Migrate an already opened store
    pub fn from_store(store: Store) -> Result<Self, LedgerError> {
        let migration = MigrationEngine::new().run(&store)?;
        info!(schema_version = migration.to_version, "Ledger ready");
        Ok(Self { store, migration })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// What the startup migration did
    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }

    /// Week keys with data, most recent first
    pub fn available_weeks(&self) -> Result<Vec<String>, LedgerError> {
        db::list_available_weeks(&self.store)
    }

    /// Aggregation over the week stored under `week_key`
    pub fn week(&self, week_key: &str) -> Result<AggregationEngine, LedgerError> {
        AggregationEngine::load(&self.store, key::decode(week_key)?)
    }

    pub fn compare_with_previous(&self, week_key: &str) -> Result<WeekComparison, LedgerError> {
        aggregation::week_comparison(&self.store, key::decode(week_key)?)
    }

    /// Empty days across every week with data
    pub fn missing_days(&self) -> Result<Vec<(String, Day)>, LedgerError> {
        aggregation::missing_days(&self.store, &self.available_weeks()?)
    }

    /// Store and return the Monday-aligned date labels of a week
    pub fn refresh_week_dates(&self, period: FiscalPeriod) -> Result<WeekDates, LedgerError> {
        let dates: WeekDates = calendar::display_dates(period)?.into_iter().collect();
        weeks::set_week_dates(&self.store, &key::encode(period)?, &dates)?;
        Ok(dates)
    }

    pub fn export_config(&self) -> Result<ConfigExport, LedgerError> {
        transfer::export_config(&self.store)
    }

    pub fn export_user_data(&self) -> Result<UserData, LedgerError> {
        transfer::export_user_data(&self.store)
    }

    pub fn import_json(&self, json: &str) -> Result<ImportSummary, LedgerError> {
        transfer::import_json(&self.store, json)
    }

    /// Drop every week-scoped record
    pub fn reset_user_data(&self) -> Result<usize, LedgerError> {
        weeks::reset_user_data(&self.store)
    }

    /// Drop every record
    pub fn reset_all(&self) -> Result<usize, LedgerError> {
        weeks::reset_all(&self.store)
    }

    /// Saved budget-year keys, oldest first
    pub fn budget_years(&self) -> Result<Vec<String>, LedgerError> {
        Ok(catalog::list_budget_years(&self.store)?
            .into_iter()
            .map(|(year, _)| key::budget_year_key(year))
            .collect())
    }
}
