//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, calendar dates are `YYYY-MM-DD`, UUIDs are
//! hyphenated lowercase strings and enums use their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use lapse_core::{
  course::Course,
  record::{ComplianceRecord, Status},
  scope::RoleTier,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Status / RoleTier ────────────────────────────────────────────────────────

pub fn encode_status(s: Status) -> &'static str { s.into() }

pub fn decode_status(s: &str) -> Result<Status> {
  Status::from_str(s).map_err(|_| Error::Decode(format!("unknown status: {s:?}")))
}

pub fn encode_role(r: RoleTier) -> &'static str { r.into() }

pub fn decode_role(s: &str) -> Result<RoleTier> {
  RoleTier::from_str(s).map_err(|_| Error::Decode(format!("unknown role: {s:?}")))
}

// ─── Validity ─────────────────────────────────────────────────────────────────

pub fn decode_validity(v: Option<i64>) -> Result<Option<u32>> {
  v.map(|months| {
    u32::try_from(months)
      .ok()
      .filter(|m| *m > 0)
      .ok_or_else(|| Error::InvalidCourse(format!("validity months must be positive, got {months}")))
  })
  .transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str = "record_id, staff_id, course_id, location_id, status,
  completion_date, expiry_date, created_at, updated_at";

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:       String,
  pub staff_id:        String,
  pub course_id:       String,
  pub location_id:     String,
  pub status:          String,
  pub completion_date: Option<String>,
  pub expiry_date:     Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:       row.get(0)?,
      staff_id:        row.get(1)?,
      course_id:       row.get(2)?,
      location_id:     row.get(3)?,
      status:          row.get(4)?,
      completion_date: row.get(5)?,
      expiry_date:     row.get(6)?,
      created_at:      row.get(7)?,
      updated_at:      row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<ComplianceRecord> {
    Ok(ComplianceRecord {
      record_id:       decode_uuid(&self.record_id)?,
      staff_id:        decode_uuid(&self.staff_id)?,
      course_id:       decode_uuid(&self.course_id)?,
      location_id:     decode_uuid(&self.location_id)?,
      status:          decode_status(&self.status)?,
      completion_date: self.completion_date.as_deref().map(decode_date).transpose()?,
      expiry_date:     self.expiry_date.as_deref().map(decode_date).transpose()?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `courses` row.
pub struct RawCourse {
  pub course_id:       String,
  pub name:            String,
  pub validity_months: Option<i64>,
}

impl RawCourse {
  pub fn into_course(self) -> Result<Course> {
    Ok(Course {
      course_id:       decode_uuid(&self.course_id)?,
      name:            self.name,
      validity_months: decode_validity(self.validity_months)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_use_iso_format() {
    let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(encode_date(d), "2024-02-29");
    assert_eq!(decode_date("2024-02-29").unwrap(), d);
    assert!(decode_date("29/02/2024").is_err());
  }

  #[test]
  fn enums_round_trip_through_column_text() {
    assert_eq!(encode_status(Status::NotApplicable), "not_applicable");
    assert_eq!(decode_status("awaiting").unwrap(), Status::Awaiting);
    assert!(decode_status("pending").is_err());
    assert_eq!(encode_role(RoleTier::Scheduler), "scheduler");
    assert!(decode_role("owner").is_err());
  }

  #[test]
  fn validity_must_be_positive() {
    assert_eq!(decode_validity(None).unwrap(), None);
    assert_eq!(decode_validity(Some(24)).unwrap(), Some(24));
    assert!(decode_validity(Some(0)).is_err());
    assert!(decode_validity(Some(-3)).is_err());
  }
}
