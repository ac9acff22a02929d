//! Expiry calculation: completion date plus a course's validity period.
//!
//! This is the only place in the workspace that adds months to a date. The
//! arithmetic is done on plain year/month/day integers so the day-of-month
//! clamps to the end of a shorter target month (31 Jan + 1 month is the last
//! day of February) instead of spilling into the month after.

use chrono::{Datelike, NaiveDate};

use crate::{Error, Result};

/// The date a completion lapses, or `None` for a one-off course.
///
/// Fails with [`Error::InvalidArgument`] when `validity_months` is zero or the
/// result falls outside the representable calendar.
pub fn compute_expiry(
  completion: NaiveDate,
  validity_months: Option<u32>,
) -> Result<Option<NaiveDate>> {
  let Some(months) = validity_months else {
    return Ok(None);
  };
  if months == 0 {
    return Err(Error::invalid("validity months must be positive"));
  }
  add_months(completion.year(), completion.month(), completion.day(), months)
    .map(Some)
}

/// Add `months` calendar months to the date `year-month-day`, clamping the
/// day to the last valid day of the resulting month.
pub fn add_months(year: i32, month: u32, day: u32, months: u32) -> Result<NaiveDate> {
  if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
    return Err(Error::invalid(format!(
      "invalid completion date {year:04}-{month:02}-{day:02}"
    )));
  }

  let index = i64::from(year) * 12 + i64::from(month - 1) + i64::from(months);
  let target_year = i32::try_from(index.div_euclid(12))
    .map_err(|_| Error::invalid("expiry date out of range"))?;
  // rem_euclid(12) is in 0..12, so the cast cannot truncate.
  let target_month = index.rem_euclid(12) as u32 + 1;
  let target_day = day.min(days_in_month(target_year, target_month));

  NaiveDate::from_ymd_opt(target_year, target_month, target_day)
    .ok_or_else(|| Error::invalid("expiry date out of range"))
}

pub fn is_leap_year(year: i32) -> bool {
  (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1–12) of `year`; `0` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
  match month {
    1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
    4 | 6 | 9 | 11 => 30,
    2 if is_leap_year(year) => 29,
    2 => 28,
    _ => 0,
  }
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
    .map_err(|e| Error::invalid(format!("malformed date {s:?}: {e}")))
}
