//! Persisted record shapes
//!
//! Field names are camelCase to match the JSON already on disk and in
//! exported files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calendar::Day;

/// A staff member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
}

/// A sellable after-sales service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub cost: f64,
}

/// Explicit cumulative daily targets for one section, Monday..Saturday.
/// Used as stored when all six are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDefinition {
    pub section: String,
    pub goals: Vec<f64>,
}

/// One sold after-sales service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvsAssignment {
    pub day: Day,
    pub person: String,
    pub service_id: String,
    pub sold: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub gm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceAgreementSale {
    pub day: Day,
    pub person: String,
    pub sold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecalibratedTvCompletion {
    pub day: Day,
    pub person: String,
    pub completed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairTicket {
    pub day: Day,
    pub person: String,
    pub completed: f64,
}

/// Store-wide inspection count; one entry per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityInspection {
    pub day: Day,
    pub count: f64,
}

/// Display labels (`dd.MM`) for the days of one week
pub type WeekDates = BTreeMap<Day, String>;

/// Yearly goals per category, as configured for a budget year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetYearGoals {
    #[serde(default)]
    pub avs: f64,
    #[serde(default)]
    pub insurance: f64,
    #[serde(default)]
    pub precalibrated: f64,
    #[serde(default)]
    pub repair: f64,
}

/// A budget-year definition, keyed `"{year}/{year+1}"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetYear {
    pub start_date: String,
    pub end_date: String,
    /// Gross margin of the previous budget year
    #[serde(default)]
    pub previous_year_baseline: f64,
    #[serde(default)]
    pub goals: BudgetYearGoals,
}

/// Application settings blob. Unknown fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub show_all_weeks: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_budget_year: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Every week-scoped collection for one record key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WeekRecords {
    #[serde(default)]
    pub avs_assignments: Vec<AvsAssignment>,
    #[serde(default)]
    pub insurance_agreements: Vec<InsuranceAgreementSale>,
    #[serde(default, rename = "precalibratedTVs")]
    pub precalibrated_tvs: Vec<PrecalibratedTvCompletion>,
    #[serde(default)]
    pub repair_tickets: Vec<RepairTicket>,
    #[serde(default)]
    pub quality_inspections: Vec<QualityInspection>,
    #[serde(default)]
    pub week_dates: WeekDates,
}

impl WeekRecords {
    pub fn is_empty(&self) -> bool {
        self.avs_assignments.is_empty()
            && self.insurance_agreements.is_empty()
            && self.precalibrated_tvs.is_empty()
            && self.repair_tickets.is_empty()
            && self.quality_inspections.is_empty()
            && self.week_dates.is_empty()
    }

    /// Number of line items across every collection (week dates excluded)
    pub fn line_item_count(&self) -> usize {
        self.avs_assignments.len()
            + self.insurance_agreements.len()
            + self.precalibrated_tvs.len()
            + self.repair_tickets.len()
            + self.quality_inspections.len()
    }
}
