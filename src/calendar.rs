//! Budget-year calendar
//!
//! Reporting is bucketed by *budget year*, which starts on May 1 and runs to
//! April 30 of the following calendar year. Weeks are 7-day buckets counted
//! from the budget year's first day, so they do not line up with ISO weeks
//! or with Mondays. The last bucket of every budget year is a partial 53rd
//! week of one or two days.
//!
//! ```text
//! May 1 ───── +7 ───── +14 ─── ... ─── +364 ── Apr 30
//! │ week 1 │ week 2 │        ...        │ week 53 │
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Month (1-based) on which every budget year begins
pub const BUDGET_YEAR_START_MONTH: u32 = 5;

/// Day of month on which every budget year begins
pub const BUDGET_YEAR_START_DAY: u32 = 1;

const DAYS_PER_WEEK: u64 = 7;

/// A week bucket inside a budget year.
///
/// Ordering is chronological: by year, then by week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalPeriod {
    pub fiscal_year: i32,
    pub fiscal_week: u32,
}

impl FiscalPeriod {
    /// Build a period, rejecting week numbers below 1 and years whose
    /// start date cannot be represented.
    pub fn new(fiscal_year: i32, fiscal_week: u32) -> Result<Self, LedgerError> {
        date_range_of(fiscal_year, fiscal_week)?;
        Ok(Self { fiscal_year, fiscal_week })
    }

    /// The period containing `date`
    pub fn of(date: NaiveDate) -> Result<Self, LedgerError> {
        Ok(Self {
            fiscal_year: fiscal_year_of(date),
            fiscal_week: fiscal_week_of(date)?,
        })
    }

    /// First and last calendar day of this period
    pub fn date_range(&self) -> Result<WeekRange, LedgerError> {
        date_range_of(self.fiscal_year, self.fiscal_week)
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} week {}", self.fiscal_year, self.fiscal_year + 1, self.fiscal_week)
    }
}

/// Inclusive calendar-day span of one fiscal week
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl WeekRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day && date <= self.last_day
    }
}

/// Reporting day. The store has no Sunday bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    /// Reporting days in week order
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    /// Zero-based position within the reporting week
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    /// This day and every day before it in the reporting week
    pub fn up_to(self) -> &'static [Day] {
        &Self::ALL[..=self.index()]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LedgerError::InvalidPeriod(format!("unknown day '{}'", s)))
    }
}

/// May 1 of `fiscal_year`
pub fn budget_year_start(fiscal_year: i32) -> Result<NaiveDate, LedgerError> {
    NaiveDate::from_ymd_opt(fiscal_year, BUDGET_YEAR_START_MONTH, BUDGET_YEAR_START_DAY)
        .ok_or_else(|| {
            LedgerError::InvalidPeriod(format!("budget year {} is out of range", fiscal_year))
        })
}

/// April 30 of the calendar year after `fiscal_year`
pub fn budget_year_end(fiscal_year: i32) -> Result<NaiveDate, LedgerError> {
    budget_year_start(fiscal_year + 1)?
        .pred_opt()
        .ok_or_else(|| {
            LedgerError::InvalidPeriod(format!("budget year {} is out of range", fiscal_year))
        })
}

/// Budget year a date belongs to: January through April belong to the
/// budget year that started the previous May.
pub fn fiscal_year_of(date: NaiveDate) -> i32 {
    if date.month() < BUDGET_YEAR_START_MONTH {
        date.year() - 1
    } else {
        date.year()
    }
}

/// 1-based week within the date's budget year. Unbounded above so the
/// partial 53rd week is representable.
pub fn fiscal_week_of(date: NaiveDate) -> Result<u32, LedgerError> {
    let start = budget_year_start(fiscal_year_of(date))?;
    let days_since_start = date.signed_duration_since(start).num_days();
    if days_since_start < 0 {
        return Err(LedgerError::InvalidPeriod(format!(
            "{} precedes its budget year start {}",
            date, start
        )));
    }
    Ok((days_since_start as u64 / DAYS_PER_WEEK) as u32 + 1)
}

/// First and last day of `fiscal_week` in `fiscal_year`
pub fn date_range_of(fiscal_year: i32, fiscal_week: u32) -> Result<WeekRange, LedgerError> {
    if fiscal_week < 1 {
        return Err(LedgerError::InvalidPeriod(format!(
            "week {} is below 1",
            fiscal_week
        )));
    }
    let out_of_range = || {
        LedgerError::InvalidPeriod(format!(
            "week {} of budget year {} is out of range",
            fiscal_week, fiscal_year
        ))
    };
    let start = budget_year_start(fiscal_year)?;
    let first_day = start
        .checked_add_days(Days::new(u64::from(fiscal_week - 1) * DAYS_PER_WEEK))
        .ok_or_else(out_of_range)?;
    if fiscal_year_of(first_day) != fiscal_year {
        return Err(out_of_range());
    }
    // the final week stops at April 30
    let last_day = first_day
        .checked_add_days(Days::new(DAYS_PER_WEEK - 1))
        .ok_or_else(out_of_range)?
        .min(budget_year_end(fiscal_year)?);
    Ok(WeekRange { first_day, last_day })
}

/// The week before `period`. Week 1 steps back to the final (partial)
/// week of the previous budget year.
pub fn previous_period(period: FiscalPeriod) -> Result<FiscalPeriod, LedgerError> {
    if period.fiscal_week > 1 {
        return FiscalPeriod::new(period.fiscal_year, period.fiscal_week - 1);
    }
    let last_day_before = budget_year_start(period.fiscal_year)?
        .pred_opt()
        .ok_or_else(|| LedgerError::InvalidPeriod(format!("no period before {}", period)))?;
    FiscalPeriod::of(last_day_before)
}

/// Period containing today's local date
pub fn current_period() -> Result<FiscalPeriod, LedgerError> {
    FiscalPeriod::of(Local::now().date_naive())
}

/// `dd.MM` labels for Monday..Saturday of the calendar week that contains
/// the period's first day. Display only: the labels are Monday-aligned
/// while the period itself is not.
pub fn display_dates(period: FiscalPeriod) -> Result<Vec<(Day, String)>, LedgerError> {
    let first_day = period.date_range()?.first_day;
    let back = u64::from(first_day.weekday().num_days_from_monday());
    let monday = first_day
        .checked_sub_days(Days::new(back))
        .ok_or_else(|| LedgerError::InvalidPeriod(format!("{} is out of range", period)))?;

    Day::ALL
        .iter()
        .map(|day| {
            let date = monday
                .checked_add_days(Days::new(day.index() as u64))
                .ok_or_else(|| LedgerError::InvalidPeriod(format!("{} is out of range", period)))?;
            Ok((*day, date.format("%d.%m").to_string()))
        })
        .collect()
}
