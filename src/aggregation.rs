//! Read-only aggregation over one week of records
//!
//! All sums are cumulative across the reporting week, Monday through the
//! requested day. Missing records count as zero; only store I/O errors.
//!
//! ## Goal progress
//!
//! A section's cumulative daily targets come from its stored goal
//! definition. Without one, the budget year's weekly share is ramped
//! linearly into six cumulative daily targets.
//!
//! Each section's ratio is capped at 1.0 for the combined score, unless
//! every section is at or above 1.0, in which case the raw ratios are
//! averaged. One overachieving section cannot lift the combined score
//! while another lags.

use rusqlite::Connection;
use tracing::debug;

use crate::calendar::{previous_period, Day, FiscalPeriod};
use crate::db::{catalog, records, weeks, Collection, Store};
use crate::error::LedgerError;
use crate::key;
use crate::models::{
    AvsAssignment, BudgetYear, BudgetYearGoals, GoalDefinition, InsuranceAgreementSale,
    PrecalibratedTvCompletion, QualityInspection, RepairTicket, Service, WeekRecords,
};

/// Prices include 25% VAT
pub const VAT_DIVISOR: f64 = 1.25;

/// Weeks a yearly goal is spread over
pub const WEEKS_PER_BUDGET_YEAR: f64 = 52.0;

/// Round to two decimals, as amounts are stored and shown
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrossMargin {
    pub gm: f64,
    pub gm_percent: f64,
}

/// Gross margin of selling at `price` (VAT included) something that cost
/// `cost` (VAT excluded)
pub fn gross_margin(cost: f64, price: f64) -> GrossMargin {
    let price_ex_vat = price / VAT_DIVISOR;
    let gm = price_ex_vat - cost;
    let denominator = gm + cost;
    let gm_percent = if denominator != 0.0 { gm / denominator * 100.0 } else { 0.0 };
    GrossMargin {
        gm: round2(gm),
        gm_percent: round2(gm_percent),
    }
}

impl AvsAssignment {
    /// One unit of `service` sold by `person`, at `price` or the list price
    pub fn for_service(day: Day, person: &str, service: &Service, price: Option<f64>) -> Self {
        let price = price.unwrap_or(service.price);
        Self {
            day,
            person: person.to_string(),
            service_id: service.id.clone(),
            sold: 1.0,
            price,
            cost: Some(service.cost),
            gm: gross_margin(service.cost, price).gm,
        }
    }
}

/// Which week-scoped collection to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Avs,
    Insurance,
    PrecalibratedTv,
    RepairTicket,
    QualityInspection,
}

/// Which number of a line item to sum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    GrossMargin,
    Sold,
    Completed,
    Count,
    /// Number of line items
    Entries,
}

/// Uniform view of a line item for aggregation
trait LineItem {
    fn day(&self) -> Day;
    fn person(&self) -> Option<&str>;
    fn metric(&self, metric: Metric) -> f64;
}

impl LineItem for AvsAssignment {
    fn day(&self) -> Day {
        self.day
    }
    fn person(&self) -> Option<&str> {
        Some(&self.person)
    }
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::GrossMargin => self.gm,
            Metric::Sold => self.sold,
            Metric::Entries => 1.0,
            Metric::Completed | Metric::Count => 0.0,
        }
    }
}

impl LineItem for InsuranceAgreementSale {
    fn day(&self) -> Day {
        self.day
    }
    fn person(&self) -> Option<&str> {
        Some(&self.person)
    }
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Sold => self.sold,
            Metric::Entries => 1.0,
            _ => 0.0,
        }
    }
}

impl LineItem for PrecalibratedTvCompletion {
    fn day(&self) -> Day {
        self.day
    }
    fn person(&self) -> Option<&str> {
        Some(&self.person)
    }
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Completed => self.completed,
            Metric::Entries => 1.0,
            _ => 0.0,
        }
    }
}

impl LineItem for RepairTicket {
    fn day(&self) -> Day {
        self.day
    }
    fn person(&self) -> Option<&str> {
        Some(&self.person)
    }
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Completed => self.completed,
            Metric::Entries => 1.0,
            _ => 0.0,
        }
    }
}

impl LineItem for QualityInspection {
    fn day(&self) -> Day {
        self.day
    }
    fn person(&self) -> Option<&str> {
        None
    }
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Count => self.count,
            Metric::Entries => 1.0,
            _ => 0.0,
        }
    }
}

/// Goal-tracked sections of the daily report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Avs,
    InsuranceAgreements,
    PrecalibratedTvs,
    RepairTickets,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Avs,
        Section::InsuranceAgreements,
        Section::PrecalibratedTvs,
        Section::RepairTickets,
    ];

    /// Name used in goal definitions
    pub fn goal_name(self) -> &'static str {
        match self {
            Section::Avs => "AVS",
            Section::InsuranceAgreements => "Insurance Agreements",
            Section::PrecalibratedTvs => "Precalibrated TVs",
            Section::RepairTickets => "RepairTickets",
        }
    }

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Section::Avs => EntityKind::Avs,
            Section::InsuranceAgreements => EntityKind::Insurance,
            Section::PrecalibratedTvs => EntityKind::PrecalibratedTv,
            Section::RepairTickets => EntityKind::RepairTicket,
        }
    }

    /// The number progress is measured in
    pub fn metric(self) -> Metric {
        match self {
            Section::Avs => Metric::GrossMargin,
            Section::InsuranceAgreements => Metric::Sold,
            Section::PrecalibratedTvs | Section::RepairTickets => Metric::Completed,
        }
    }

    fn yearly_goal(self, goals: &BudgetYearGoals) -> f64 {
        match self {
            Section::Avs => goals.avs,
            Section::InsuranceAgreements => goals.insurance,
            Section::PrecalibratedTvs => goals.precalibrated,
            Section::RepairTickets => goals.repair,
        }
    }
}

/// Cumulative daily targets for Monday..Saturday: `round(weekly / 6) * (i + 1)`
pub fn daily_goals(weekly_goal: f64) -> [f64; 6] {
    let step = (weekly_goal / 6.0).round();
    let mut goals = [0.0; 6];
    for (i, goal) in goals.iter_mut().enumerate() {
        *goal = step * (i + 1) as f64;
    }
    goals
}

/// Average of per-section ratios, each capped at 1.0 unless all of them
/// are at or above 1.0
pub fn combined_score(ratios: &[f64]) -> f64 {
    if ratios.is_empty() {
        return 0.0;
    }
    let all_met = ratios.iter().all(|r| *r >= 1.0);
    let sum: f64 = if all_met {
        ratios.iter().sum()
    } else {
        ratios.iter().map(|r| r.min(1.0)).sum()
    };
    sum / ratios.len() as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionProgress {
    pub section: Section,
    /// Cumulative target for the day
    pub goal: f64,
    /// Cumulative actual for the day
    pub actual: f64,
    /// `actual / goal`, uncapped; 0 when there is no goal
    pub ratio: f64,
}

impl SectionProgress {
    pub fn is_met(&self) -> bool {
        self.goal > 0.0 && self.actual >= self.goal
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedProgress {
    pub day: Day,
    pub sections: Vec<SectionProgress>,
    pub all_met: bool,
    /// Combined score, 1.0 = every goal met
    pub score: f64,
}

/// Who has the largest sum of a metric
#[derive(Debug, Clone, PartialEq)]
pub struct Performer {
    pub person: String,
    pub total: f64,
    /// Line items contributing to `total`
    pub entries: usize,
}

/// Aggregates over one loaded week
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    period: FiscalPeriod,
    week: WeekRecords,
    goals: Vec<GoalDefinition>,
    budget_year: Option<BudgetYear>,
}

impl AggregationEngine {
    /// Load the week, goal definitions and budget year in one locked read
    pub fn load(store: &Store, period: FiscalPeriod) -> Result<Self, LedgerError> {
        let week_key = key::encode(period)?;
        store.with_conn(|conn| Self::read(conn, period, &week_key))
    }

    fn read(conn: &Connection, period: FiscalPeriod, week_key: &str) -> Result<Self, LedgerError> {
        let week = weeks::read_week(conn, week_key)?;
        let goals: Vec<GoalDefinition> =
            records::get(conn, Collection::Goals, catalog::LIST_KEY)?.unwrap_or_default();
        let budget_year: Option<BudgetYear> = records::get(
            conn,
            Collection::BudgetYears,
            &key::budget_year_key(period.fiscal_year),
        )?;
        debug!(week_key, items = week.line_item_count(), "Loaded week for aggregation");
        Ok(Self::from_parts(period, week, goals, budget_year))
    }

    pub fn from_parts(
        period: FiscalPeriod,
        week: WeekRecords,
        goals: Vec<GoalDefinition>,
        budget_year: Option<BudgetYear>,
    ) -> Self {
        Self {
            period,
            week,
            goals,
            budget_year,
        }
    }

    pub fn period(&self) -> FiscalPeriod {
        self.period
    }

    pub fn week(&self) -> &WeekRecords {
        &self.week
    }

    fn items(&self, kind: EntityKind) -> Vec<&dyn LineItem> {
        fn erase<T: LineItem>(items: &[T]) -> Vec<&dyn LineItem> {
            items.iter().map(|i| i as &dyn LineItem).collect()
        }
        match kind {
            EntityKind::Avs => erase(&self.week.avs_assignments),
            EntityKind::Insurance => erase(&self.week.insurance_agreements),
            EntityKind::PrecalibratedTv => erase(&self.week.precalibrated_tvs),
            EntityKind::RepairTicket => erase(&self.week.repair_tickets),
            EntityKind::QualityInspection => erase(&self.week.quality_inspections),
        }
    }

    /// Sum of `metric` over line items dated Monday..=`up_to`
    pub fn cumulative_total(&self, kind: EntityKind, up_to: Day, metric: Metric) -> f64 {
        let total: f64 = self
            .items(kind)
            .into_iter()
            .filter(|item| item.day() <= up_to)
            .map(|item| item.metric(metric))
            .sum();
        if metric == Metric::GrossMargin {
            round2(total)
        } else {
            total
        }
    }

    /// Whole-week total
    pub fn week_total(&self, kind: EntityKind, metric: Metric) -> f64 {
        self.cumulative_total(kind, Day::Saturday, metric)
    }

    /// Explicit Monday..Saturday targets for a section, if a complete
    /// definition is stored
    fn defined_goals(&self, section: Section) -> Option<&[f64]> {
        self.goals
            .iter()
            .find(|g| g.section == section.goal_name())
            .map(|g| g.goals.as_slice())
            .filter(|goals| goals.len() == Day::ALL.len())
    }

    /// Weekly goal: the Saturday target of the section's goal definition,
    /// else the budget year's yearly goal spread over 52 weeks, else 0
    pub fn weekly_goal(&self, section: Section) -> f64 {
        if let Some(goals) = self.defined_goals(section) {
            return goals[Day::Saturday.index()];
        }
        self.budget_year_weekly_goal(section)
    }

    fn budget_year_weekly_goal(&self, section: Section) -> f64 {
        self.budget_year
            .as_ref()
            .map(|by| section.yearly_goal(&by.goals) / WEEKS_PER_BUDGET_YEAR)
            .unwrap_or(0.0)
    }

    /// Cumulative target for `day`: the stored target when the section has
    /// a goal definition, else the linear ramp of the budget-year goal
    pub fn daily_goal(&self, section: Section, day: Day) -> f64 {
        match self.defined_goals(section) {
            Some(goals) => goals[day.index()],
            None => daily_goals(self.budget_year_weekly_goal(section))[day.index()],
        }
    }

    pub fn goal_progress(&self, section: Section, day: Day) -> SectionProgress {
        let goal = self.daily_goal(section, day);
        let actual = self.cumulative_total(section.entity_kind(), day, section.metric());
        let ratio = if goal > 0.0 { actual / goal } else { 0.0 };
        SectionProgress {
            section,
            goal,
            actual,
            ratio,
        }
    }

    /// Progress of every section and the combined score for `day`
    pub fn combined_progress(&self, day: Day) -> CombinedProgress {
        let sections: Vec<SectionProgress> = Section::ALL
            .iter()
            .map(|s| self.goal_progress(*s, day))
            .collect();
        let ratios: Vec<f64> = sections.iter().map(|s| s.ratio).collect();
        CombinedProgress {
            day,
            all_met: ratios.iter().all(|r| *r >= 1.0),
            score: combined_score(&ratios),
            sections,
        }
    }

    /// Person with the largest week total of `metric`. Ties go to whoever
    /// appears first in the collection.
    pub fn top_performer(&self, kind: EntityKind, metric: Metric) -> Option<Performer> {
        let mut totals: Vec<Performer> = Vec::new();
        for item in self.items(kind) {
            let Some(person) = item.person() else {
                continue;
            };
            match totals.iter_mut().find(|p| p.person == person) {
                Some(p) => {
                    p.total += item.metric(metric);
                    p.entries += 1;
                }
                None => totals.push(Performer {
                    person: person.to_string(),
                    total: item.metric(metric),
                    entries: 1,
                }),
            }
        }

        let mut best: Option<Performer> = None;
        for candidate in totals {
            if best.as_ref().map_or(true, |b| candidate.total > b.total) {
                best = Some(candidate);
            }
        }
        best.map(|mut p| {
            if metric == Metric::GrossMargin {
                p.total = round2(p.total);
            }
            p
        })
    }

    /// People with any entry Monday..=`up_to`, in order of first appearance
    pub fn active_people(&self, up_to: Day) -> Vec<String> {
        let mut people: Vec<String> = Vec::new();
        for kind in [
            EntityKind::Avs,
            EntityKind::Insurance,
            EntityKind::PrecalibratedTv,
            EntityKind::RepairTicket,
        ] {
            for item in self.items(kind) {
                if item.day() > up_to {
                    continue;
                }
                if let Some(person) = item.person() {
                    if !people.iter().any(|p| p == person) {
                        people.push(person.to_string());
                    }
                }
            }
        }
        people
    }

    /// Days with no AVS, insurance, TV or repair entries at all
    pub fn empty_days(&self) -> Vec<Day> {
        Day::ALL
            .iter()
            .copied()
            .filter(|day| {
                Section::ALL.iter().all(|s| {
                    self.items(s.entity_kind())
                        .into_iter()
                        .all(|item| item.day() != *day)
                })
            })
            .collect()
    }

    /// Whole-week total per section, in [`Section::ALL`] order
    pub fn section_totals(&self) -> Vec<(Section, f64)> {
        Section::ALL
            .iter()
            .map(|s| (*s, self.week_total(s.entity_kind(), s.metric())))
            .collect()
    }
}

/// One section's week total against the previous week
#[derive(Debug, Clone, PartialEq)]
pub struct SectionComparison {
    pub section: Section,
    pub current: f64,
    pub previous: f64,
    /// `(current - previous) / (previous or 1) * 100`, one decimal
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekComparison {
    pub period: FiscalPeriod,
    pub previous_period: FiscalPeriod,
    pub sections: Vec<SectionComparison>,
}

/// Compare a week's section totals with the week before it
pub fn week_comparison(store: &Store, period: FiscalPeriod) -> Result<WeekComparison, LedgerError> {
    let prev = previous_period(period)?;
    let current = AggregationEngine::load(store, period)?;
    let previous = AggregationEngine::load(store, prev)?;

    let sections = current
        .section_totals()
        .into_iter()
        .zip(previous.section_totals())
        .map(|((section, current), (_, previous))| {
            let base = if previous != 0.0 { previous } else { 1.0 };
            SectionComparison {
                section,
                current,
                previous,
                change_percent: ((current - previous) / base * 1000.0).round() / 10.0,
            }
        })
        .collect();

    Ok(WeekComparison {
        period,
        previous_period: prev,
        sections,
    })
}

/// Completely empty days across `week_keys`, most recent week first
pub fn missing_days(store: &Store, week_keys: &[String]) -> Result<Vec<(String, Day)>, LedgerError> {
    let mut periods = week_keys
        .iter()
        .map(|k| key::decode(k))
        .collect::<Result<Vec<_>, _>>()?;
    periods.sort();
    periods.dedup();

    let mut missing = Vec::new();
    for period in periods.into_iter().rev() {
        let engine = AggregationEngine::load(store, period)?;
        let week_key = key::encode(period)?;
        for day in engine.empty_days() {
            missing.push((week_key.clone(), day));
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> FiscalPeriod {
        FiscalPeriod::new(2024, 2).unwrap()
    }

    fn avs(day: Day, person: &str, gm: f64) -> AvsAssignment {
        AvsAssignment {
            day,
            person: person.into(),
            service_id: "svc".into(),
            sold: 1.0,
            price: 0.0,
            cost: None,
            gm,
        }
    }

    fn insurance(day: Day, person: &str, sold: f64) -> InsuranceAgreementSale {
        InsuranceAgreementSale { day, person: person.into(), sold }
    }

    fn goal(section: Section, weekly: f64) -> GoalDefinition {
        GoalDefinition {
            section: section.goal_name().to_string(),
            goals: daily_goals(weekly).to_vec(),
        }
    }

    #[test]
    fn test_gross_margin_example() {
        let gm = gross_margin(549.25, 3196.0);
        assert_eq!(gm.gm, 2007.55);
        assert_eq!(gm.gm_percent, 78.52);
    }

    #[test]
    fn test_daily_goals_ramp() {
        assert_eq!(daily_goals(1200.0), [200.0, 400.0, 600.0, 800.0, 1000.0, 1200.0]);
        // round(1000 / 6) = 167
        assert_eq!(daily_goals(1000.0)[5], 1002.0);
    }

    #[test]
    fn test_combined_score_caps_unless_all_met() {
        let capped = combined_score(&[1.3, 0.5, 0.9, 1.0]);
        assert!((capped - 0.85).abs() < 1e-9);
        let uncapped = combined_score(&[1.3, 1.1, 1.0, 1.2]);
        assert!((uncapped - 1.15).abs() < 1e-9);
        assert_eq!(combined_score(&[]), 0.0);
    }

    #[test]
    fn test_cumulative_total_by_day() {
        let week = WeekRecords {
            avs_assignments: vec![
                avs(Day::Monday, "AA", 100.0),
                avs(Day::Wednesday, "BB", 50.5),
                avs(Day::Saturday, "AA", 10.0),
            ],
            ..Default::default()
        };
        let engine = AggregationEngine::from_parts(period(), week, vec![], None);
        assert_eq!(engine.cumulative_total(EntityKind::Avs, Day::Monday, Metric::GrossMargin), 100.0);
        assert_eq!(engine.cumulative_total(EntityKind::Avs, Day::Friday, Metric::GrossMargin), 150.5);
        assert_eq!(engine.week_total(EntityKind::Avs, Metric::Entries), 3.0);
        assert_eq!(engine.cumulative_total(EntityKind::RepairTicket, Day::Saturday, Metric::Completed), 0.0);
    }

    #[test]
    fn test_goal_progress_against_cumulative_target() {
        let week = WeekRecords {
            insurance_agreements: vec![insurance(Day::Monday, "AA", 1.0), insurance(Day::Tuesday, "BB", 2.0)],
            ..Default::default()
        };
        let engine = AggregationEngine::from_parts(
            period(),
            week,
            vec![goal(Section::InsuranceAgreements, 12.0)],
            None,
        );
        let p = engine.goal_progress(Section::InsuranceAgreements, Day::Tuesday);
        assert_eq!(p.goal, 4.0);
        assert_eq!(p.actual, 3.0);
        assert_eq!(p.ratio, 0.75);
        assert!(!p.is_met());
    }

    #[test]
    fn test_no_goal_means_zero_ratio() {
        let week = WeekRecords {
            repair_tickets: vec![RepairTicket { day: Day::Monday, person: "AA".into(), completed: 3.0 }],
            ..Default::default()
        };
        let engine = AggregationEngine::from_parts(period(), week, vec![], None);
        let p = engine.goal_progress(Section::RepairTickets, Day::Monday);
        assert_eq!(p.goal, 0.0);
        assert_eq!(p.ratio, 0.0);
    }

    #[test]
    fn test_defined_goals_are_used_day_by_day() {
        let goals = vec![GoalDefinition {
            section: Section::RepairTickets.goal_name().to_string(),
            goals: vec![1.0, 5.0, 6.0, 7.0, 8.0, 12.0],
        }];
        let engine = AggregationEngine::from_parts(period(), WeekRecords::default(), goals, None);
        assert_eq!(engine.daily_goal(Section::RepairTickets, Day::Monday), 1.0);
        assert_eq!(engine.daily_goal(Section::RepairTickets, Day::Tuesday), 5.0);
        assert_eq!(engine.daily_goal(Section::RepairTickets, Day::Friday), 8.0);
        assert_eq!(engine.weekly_goal(Section::RepairTickets), 12.0);
    }

    #[test]
    fn test_incomplete_definition_falls_back_to_budget_year() {
        let goals = vec![GoalDefinition {
            section: Section::Avs.goal_name().to_string(),
            goals: vec![100.0, 200.0],
        }];
        let budget_year = BudgetYear {
            start_date: "2024-05-01".into(),
            end_date: "2025-04-30".into(),
            previous_year_baseline: 0.0,
            goals: BudgetYearGoals { avs: 62_400.0, ..Default::default() },
        };
        let engine = AggregationEngine::from_parts(period(), WeekRecords::default(), goals, Some(budget_year));
        assert_eq!(engine.weekly_goal(Section::Avs), 1200.0);
        assert_eq!(engine.daily_goal(Section::Avs, Day::Tuesday), 400.0);
    }

    #[test]
    fn test_weekly_goal_falls_back_to_budget_year() {
        let budget_year = BudgetYear {
            start_date: "2024-05-01".into(),
            end_date: "2025-04-30".into(),
            previous_year_baseline: 0.0,
            goals: BudgetYearGoals { avs: 52_000.0, ..Default::default() },
        };
        let engine = AggregationEngine::from_parts(period(), WeekRecords::default(), vec![], Some(budget_year));
        assert_eq!(engine.weekly_goal(Section::Avs), 1000.0);
        assert_eq!(engine.daily_goal(Section::Avs, Day::Monday), 167.0);
        assert_eq!(engine.weekly_goal(Section::RepairTickets), 0.0);
    }

    #[test]
    fn test_combined_progress() {
        let week = WeekRecords {
            avs_assignments: vec![avs(Day::Monday, "AA", 260.0)],
            insurance_agreements: vec![insurance(Day::Monday, "AA", 1.0)],
            precalibrated_tvs: vec![PrecalibratedTvCompletion { day: Day::Monday, person: "AA".into(), completed: 1.0 }],
            repair_tickets: vec![RepairTicket { day: Day::Monday, person: "AA".into(), completed: 2.0 }],
            ..Default::default()
        };
        let goals = vec![
            goal(Section::Avs, 1200.0),
            goal(Section::InsuranceAgreements, 12.0),
            goal(Section::PrecalibratedTvs, 6.0),
            goal(Section::RepairTickets, 12.0),
        ];
        let engine = AggregationEngine::from_parts(period(), week, goals, None);
        let combined = engine.combined_progress(Day::Monday);
        // ratios 1.3, 0.5, 1.0, 1.0
        assert!(!combined.all_met);
        assert!((combined.score - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_top_performer_ties_go_to_first_seen() {
        let week = WeekRecords {
            insurance_agreements: vec![
                insurance(Day::Monday, "ZZ", 2.0),
                insurance(Day::Monday, "AA", 1.0),
                insurance(Day::Tuesday, "AA", 1.0),
                insurance(Day::Tuesday, "MM", 1.0),
            ],
            ..Default::default()
        };
        let engine = AggregationEngine::from_parts(period(), week, vec![], None);
        let top = engine.top_performer(EntityKind::Insurance, Metric::Sold).unwrap();
        assert_eq!(top.person, "ZZ");
        assert_eq!(top.total, 2.0);
        assert_eq!(top.entries, 1);
        assert!(engine.top_performer(EntityKind::RepairTicket, Metric::Completed).is_none());
    }

    #[test]
    fn test_top_performer_ignores_inspections() {
        let week = WeekRecords {
            quality_inspections: vec![QualityInspection { day: Day::Monday, count: 5.0 }],
            ..Default::default()
        };
        let engine = AggregationEngine::from_parts(period(), week, vec![], None);
        assert!(engine.top_performer(EntityKind::QualityInspection, Metric::Count).is_none());
        assert_eq!(engine.week_total(EntityKind::QualityInspection, Metric::Count), 5.0);
    }

    #[test]
    fn test_active_people_and_empty_days() {
        let week = WeekRecords {
            avs_assignments: vec![avs(Day::Tuesday, "BB", 1.0)],
            insurance_agreements: vec![insurance(Day::Monday, "AA", 1.0), insurance(Day::Friday, "CC", 1.0)],
            quality_inspections: vec![QualityInspection { day: Day::Wednesday, count: 1.0 }],
            ..Default::default()
        };
        let engine = AggregationEngine::from_parts(period(), week, vec![], None);
        assert_eq!(engine.active_people(Day::Wednesday), vec!["BB", "AA"]);
        assert_eq!(engine.empty_days(), vec![Day::Wednesday, Day::Thursday, Day::Saturday]);
    }

    #[test]
    fn test_avs_assignment_for_service() {
        let service = Service { id: "tv-setup".into(), name: "TV setup".into(), price: 3196.0, cost: 549.25 };
        let a = AvsAssignment::for_service(Day::Monday, "AA", &service, None);
        assert_eq!(a.gm, 2007.55);
        assert_eq!(a.sold, 1.0);
        let discounted = AvsAssignment::for_service(Day::Monday, "AA", &service, Some(2500.0));
        assert_eq!(discounted.gm, 1450.75);
    }

    #[test]
    fn test_week_comparison_and_missing_days() {
        let store = Store::open_in_memory().unwrap();
        let this_week = key::encode(period()).unwrap();
        let last_week = key::encode(FiscalPeriod::new(2024, 1).unwrap()).unwrap();
        weeks::add_item(&store, &last_week, insurance(Day::Monday, "AA", 4.0)).unwrap();
        weeks::add_item(&store, &this_week, insurance(Day::Monday, "AA", 5.0)).unwrap();

        let cmp = week_comparison(&store, period()).unwrap();
        assert_eq!(cmp.previous_period, FiscalPeriod::new(2024, 1).unwrap());
        let ins = cmp.sections.iter().find(|s| s.section == Section::InsuranceAgreements).unwrap();
        assert_eq!((ins.current, ins.previous, ins.change_percent), (5.0, 4.0, 25.0));
        let repair = cmp.sections.iter().find(|s| s.section == Section::RepairTickets).unwrap();
        assert_eq!(repair.change_percent, 0.0);

        let missing = missing_days(&store, &[last_week.clone(), this_week.clone()]).unwrap();
        assert_eq!(missing.len(), 10);
        assert_eq!(missing[0], (this_week, Day::Tuesday));
        assert_eq!(missing[5], (last_week, Day::Tuesday));
    }
}
