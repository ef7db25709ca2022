//! Record key codec
//!
//! Week-scoped records are addressed by `"{year}/{year+1}-{week:02}"`, e.g.
//! `2024/2025-07`. Databases written before budget years existed used
//! `"{calendarYear}-{week}"` (`2024-7` or `2024-07`); those keys are only
//! ever read, upgraded, and deleted.

use chrono::{Datelike, Days, NaiveDate};

use crate::calendar::FiscalPeriod;
use crate::error::LedgerError;

/// Largest week number a two-digit key can carry
pub const MAX_ENCODABLE_WEEK: u32 = 99;

/// Largest plain calendar week number accepted in a legacy key
const MAX_LEGACY_WEEK: u32 = 53;

/// Encode a period as a current-format key
pub fn encode(period: FiscalPeriod) -> Result<String, LedgerError> {
    if period.fiscal_week > MAX_ENCODABLE_WEEK {
        return Err(LedgerError::KeyOverflow { week: period.fiscal_week });
    }
    Ok(format!(
        "{}-{:02}",
        budget_year_key(period.fiscal_year),
        period.fiscal_week
    ))
}

/// Decode either key format. Legacy keys decode to the period they
/// upgrade to.
pub fn decode(key: &str) -> Result<FiscalPeriod, LedgerError> {
    if let Some(period) = parse_current(key)? {
        return Ok(period);
    }
    if is_legacy_format(key) {
        return decode(&upgrade_legacy_key(key)?);
    }
    Err(malformed(key))
}

/// True iff `key` is `{year}-{week}` with no budget-year separator
pub fn is_legacy_format(key: &str) -> bool {
    parse_legacy(key).is_some()
}

/// Rewrite a legacy key into the current format.
///
/// The legacy year is a calendar year and the week a plain Monday-based
/// week number: week 1 is the week holding January 1. The Monday of that
/// week is re-bucketed into its budget-year week, which is approximate
/// around the May 1 cutover.
pub fn upgrade_legacy_key(key: &str) -> Result<String, LedgerError> {
    let (year, week) = parse_legacy(key).ok_or_else(|| malformed(key))?;
    if week < 1 || week > MAX_LEGACY_WEEK {
        return Err(LedgerError::MalformedKey(format!(
            "legacy key '{}' has week {} outside 1..={}",
            key, week, MAX_LEGACY_WEEK
        )));
    }

    let monday = legacy_week_monday(year, week).ok_or_else(|| malformed(key))?;
    encode(FiscalPeriod::of(monday)?)
}

/// Current-format key for any well-formed key, upgrading legacy ones
pub fn normalize(key: &str) -> Result<String, LedgerError> {
    if is_legacy_format(key) {
        upgrade_legacy_key(key)
    } else {
        encode(decode(key)?)
    }
}

/// `"{year}/{year+1}"`, the key of a budget-year definition and the prefix
/// of every week key in that year
pub fn budget_year_key(fiscal_year: i32) -> String {
    format!("{}/{}", fiscal_year, fiscal_year + 1)
}

/// Parse a `"{year}/{year+1}"` budget-year key
pub fn parse_budget_year_key(key: &str) -> Result<i32, LedgerError> {
    let (first, second) = key.split_once('/').ok_or_else(|| malformed(key))?;
    let first = parse_year(first).ok_or_else(|| malformed(key))?;
    let second = parse_year(second).ok_or_else(|| malformed(key))?;
    if second != first + 1 {
        return Err(LedgerError::MalformedKey(format!(
            "'{}' does not span consecutive years",
            key
        )));
    }
    Ok(first)
}

fn parse_current(key: &str) -> Result<Option<FiscalPeriod>, LedgerError> {
    let Some((year_part, week_part)) = key.rsplit_once('-') else {
        return Ok(None);
    };
    if !year_part.contains('/') {
        return Ok(None);
    }
    let fiscal_year = parse_budget_year_key(year_part)?;
    if week_part.len() != 2 || !week_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(key));
    }
    let fiscal_week: u32 = week_part.parse().map_err(|_| malformed(key))?;
    FiscalPeriod::new(fiscal_year, fiscal_week)
        .map(Some)
        .map_err(|_| malformed(key))
}

fn parse_legacy(key: &str) -> Option<(i32, u32)> {
    let (year_part, week_part) = key.split_once('-')?;
    if year_part.len() != 4 || !(1..=2).contains(&week_part.len()) {
        return None;
    }
    if !week_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((parse_year(year_part)?, week_part.parse().ok()?))
}

fn parse_year(s: &str) -> Option<i32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn legacy_week_monday(year: i32, week: u32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let first_monday =
        jan1.checked_sub_days(Days::new(u64::from(jan1.weekday().num_days_from_monday())))?;
    first_monday.checked_add_days(Days::new(u64::from(week - 1) * 7))
}

fn malformed(key: &str) -> LedgerError {
    LedgerError::MalformedKey(format!("'{}'", key))
}
