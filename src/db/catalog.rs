//! Configuration records: people, services, goals, settings and budget years

use tracing::info;

use super::{Collection, Store};
use crate::calendar::{budget_year_end, budget_year_start};
use crate::error::LedgerError;
use crate::key;
use crate::models::{BudgetYear, BudgetYearGoals, GoalDefinition, Person, Service, Settings};

/// Key of the single record in the list-style collections
pub const LIST_KEY: &str = "list";

/// Key of the settings record
pub const SETTINGS_KEY: &str = "current";

pub fn get_people(store: &Store) -> Result<Vec<Person>, LedgerError> {
    Ok(store.get(Collection::People, LIST_KEY)?.unwrap_or_default())
}

pub fn set_people(store: &Store, people: &[Person]) -> Result<(), LedgerError> {
    store.put(Collection::People, LIST_KEY, people)
}

pub fn get_services(store: &Store) -> Result<Vec<Service>, LedgerError> {
    Ok(store.get(Collection::Services, LIST_KEY)?.unwrap_or_default())
}

pub fn set_services(store: &Store, services: &[Service]) -> Result<(), LedgerError> {
    store.put(Collection::Services, LIST_KEY, services)
}

pub fn get_goals(store: &Store) -> Result<Vec<GoalDefinition>, LedgerError> {
    Ok(store.get(Collection::Goals, LIST_KEY)?.unwrap_or_default())
}

pub fn set_goals(store: &Store, goals: &[GoalDefinition]) -> Result<(), LedgerError> {
    store.put(Collection::Goals, LIST_KEY, goals)
}

pub fn get_settings(store: &Store) -> Result<Settings, LedgerError> {
    Ok(store.get(Collection::Settings, SETTINGS_KEY)?.unwrap_or_default())
}

pub fn set_settings(store: &Store, settings: &Settings) -> Result<(), LedgerError> {
    store.put(Collection::Settings, SETTINGS_KEY, settings)
}

/// Budget-year definition, if one has been saved
pub fn get_budget_year(store: &Store, fiscal_year: i32) -> Result<Option<BudgetYear>, LedgerError> {
    store.get(Collection::BudgetYears, &key::budget_year_key(fiscal_year))
}

pub fn put_budget_year(
    store: &Store,
    fiscal_year: i32,
    budget_year: &BudgetYear,
) -> Result<(), LedgerError> {
    let year_key = key::budget_year_key(fiscal_year);
    store.put(Collection::BudgetYears, &year_key, budget_year)?;
    info!(budget_year = %year_key, "Saved budget year");
    Ok(())
}

/// Saved budget years, oldest first
pub fn list_budget_years(store: &Store) -> Result<Vec<(i32, BudgetYear)>, LedgerError> {
    let mut years = Vec::new();
    for year_key in store.list_keys(Collection::BudgetYears)? {
        let fiscal_year = key::parse_budget_year_key(&year_key)?;
        if let Some(definition) = store.get(Collection::BudgetYears, &year_key)? {
            years.push((fiscal_year, definition));
        }
    }
    years.sort_by_key(|(year, _)| *year);
    Ok(years)
}

/// A definition spanning May 1 `fiscal_year` to April 30 the year after
pub fn default_budget_year(
    fiscal_year: i32,
    previous_year_baseline: f64,
    goals: BudgetYearGoals,
) -> Result<BudgetYear, LedgerError> {
    Ok(BudgetYear {
        start_date: budget_year_start(fiscal_year)?.to_string(),
        end_date: budget_year_end(fiscal_year)?.to_string(),
        previous_year_baseline,
        goals,
    })
}
