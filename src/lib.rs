//! Fiscal Ledger - budget-year indexed record store for weekly retail reporting
//!
//! Weekly line items (after-sales services, insurance agreements, TV
//! precalibrations, repair tickets, quality inspections) are bucketed into
//! fiscal weeks of a budget year starting May 1, and aggregated into
//! cumulative day-by-day progress against goals.
//!
//! ## Record keys
//!
//! | Format | Example | Meaning |
//! |--------|---------|---------|
//! | current | `2024/2025-07` | budget year 2024, fiscal week 7 |
//! | legacy | `2024-07` | calendar year 2024, calendar week 7 |
//!
//! Stores written with legacy keys are upgraded in place when opened
//! through [`Ledger::open`].
//!
//! ## Storage Layout
//!
//! ```text
//! <data_local_dir>/fiscal-ledger/
//! ├── ledger.db      # SQLite: records + schema_version
//! └── config.toml    # Configuration
//! ```

pub mod aggregation;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod key;
pub mod ledger;
pub mod migration;
pub mod models;
pub mod transfer;

// Re-exports
pub use aggregation::{AggregationEngine, EntityKind, Metric, Section};
pub use calendar::{Day, FiscalPeriod, WeekRange};
pub use config::Config;
pub use db::{Collection, Store};
pub use error::LedgerError;
pub use ledger::Ledger;
pub use migration::{MigrationEngine, MigrationReport, MigrationState};
pub use transfer::{ConfigExport, ImportFile, ImportSummary, UserData};
