//! Calendar math mapping a day onto its offset inside a half-year block.
//!
//! The report lays out each half-year as one run of day columns per month plus
//! one separator column per month, anchored at a cell carrying the half-year
//! label. Every full month therefore spans `days_in_month + 1` columns and the
//! terminal month contributes `day + 1`.

use chrono::{Datelike, NaiveDate};

use clinisync_core::types::PeriodLabel;

use crate::error::SyncError;

/// Number of calendar days in `month` of `year`, or `None` for a bad month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

/// Columns elapsed from the start of half-year `half` up to and including
/// `day` of `month`.
///
/// `day` must stay below the separator-inclusive month length
/// (`days_in_month + 1`); `month` must belong to `half`.
pub fn resolve_day_offset(year: i32, half: u8, month: u32, day: u32) -> Result<u32, SyncError> {
    let invalid = || SyncError::InvalidDate {
        year,
        half,
        month,
        day,
    };

    let start_month = match half {
        1 => 1,
        2 => 7,
        _ => return Err(invalid()),
    };
    if month < start_month || month > start_month + 5 {
        return Err(invalid());
    }

    let mut total = 0;
    for m in start_month..=month {
        let span = days_in_month(year, m).ok_or_else(invalid)? + 1;
        if m == month {
            if day >= span {
                return Err(invalid());
            }
            total += day + 1;
        } else {
            total += span;
        }
    }
    Ok(total)
}

/// `1` for January–June, `2` for July–December.
pub fn half_year_of(date: NaiveDate) -> u8 {
    if date.month() <= 6 {
        1
    } else {
        2
    }
}

/// Render the anchor label for the half-year containing `date`.
pub fn half_year_label(date: NaiveDate, template: &str) -> PeriodLabel {
    PeriodLabel(
        template
            .replace("{half}", &half_year_of(date).to_string())
            .replace("{year}", &date.year().to_string()),
    )
}

/// [`resolve_day_offset`] for a concrete date.
pub fn day_offset_of(date: NaiveDate) -> Result<u32, SyncError> {
    resolve_day_offset(date.year(), half_year_of(date), date.month(), date.day())
}
