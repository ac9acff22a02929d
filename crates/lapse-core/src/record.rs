//! Compliance records: one row per (staff, course, location) association.
//!
//! A record is never edited field by field. Its status and both dates change
//! together through [`crate::transition::transition`], and the store only
//! accepts the value that function produces.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Training status of a record. Every status is reachable from every other.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
  Completed,
  Booked,
  Awaiting,
  #[default]
  NotApplicable,
}

impl Status {
  /// Only a completed record carries a completion date and (possibly) an
  /// expiry date. The other statuses hold no temporal evidence.
  pub fn carries_dates(self) -> bool { matches!(self, Self::Completed) }
}

// ─── Association ─────────────────────────────────────────────────────────────

/// The natural key of a record. At most one live record exists per triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Association {
  pub staff_id:    Uuid,
  pub course_id:   Uuid,
  pub location_id: Uuid,
}

impl fmt::Display for Association {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "staff {}, course {}, location {}",
      self.staff_id, self.course_id, self.location_id
    )
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRecord {
  pub record_id:       Uuid,
  pub staff_id:        Uuid,
  pub course_id:       Uuid,
  pub location_id:     Uuid,
  pub status:          Status,
  pub completion_date: Option<NaiveDate>,
  pub expiry_date:     Option<NaiveDate>,
  /// Server-assigned; never changes after creation.
  pub created_at:      DateTime<Utc>,
  /// Server-assigned on every committed transition.
  pub updated_at:      DateTime<Utc>,
}

impl ComplianceRecord {
  /// A fresh record for a new association: `NotApplicable`, no dates.
  pub fn new(association: Association, now: DateTime<Utc>) -> Self {
    Self {
      record_id:       Uuid::new_v4(),
      staff_id:        association.staff_id,
      course_id:       association.course_id,
      location_id:     association.location_id,
      status:          Status::NotApplicable,
      completion_date: None,
      expiry_date:     None,
      created_at:      now,
      updated_at:      now,
    }
  }

  pub fn association(&self) -> Association {
    Association {
      staff_id:    self.staff_id,
      course_id:   self.course_id,
      location_id: self.location_id,
    }
  }

  /// Where this record stands on `today`, given how many days before expiry
  /// a completion counts as expiring soon.
  pub fn standing(&self, today: NaiveDate, warning_days: u32) -> Standing {
    match self.status {
      Status::NotApplicable => Standing::NotRequired,
      Status::Awaiting => Standing::Outstanding,
      Status::Booked => Standing::Booked,
      Status::Completed => match self.expiry_date {
        None => Standing::Current,
        Some(expiry) if expiry < today => Standing::Expired,
        Some(expiry) => {
          let horizon = today
            .checked_add_days(Days::new(u64::from(warning_days)))
            .unwrap_or(NaiveDate::MAX);
          if expiry <= horizon {
            Standing::ExpiringSoon
          } else {
            Standing::Current
          }
        }
      },
    }
  }
}

// ─── Standing ────────────────────────────────────────────────────────────────

/// Derived compliance standing of a record; computed at read time, never
/// stored.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Standing {
  NotRequired,
  Outstanding,
  Booked,
  Current,
  ExpiringSoon,
  Expired,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn completed(expiry: Option<NaiveDate>) -> ComplianceRecord {
    let mut record = ComplianceRecord::new(
      Association {
        staff_id:    Uuid::new_v4(),
        course_id:   Uuid::new_v4(),
        location_id: Uuid::new_v4(),
      },
      Utc::now(),
    );
    record.status = Status::Completed;
    record.completion_date = Some(date(2023, 1, 1));
    record.expiry_date = expiry;
    record
  }

  #[test]
  fn new_record_is_not_applicable_without_dates() {
    let record = ComplianceRecord::new(
      Association {
        staff_id:    Uuid::new_v4(),
        course_id:   Uuid::new_v4(),
        location_id: Uuid::new_v4(),
      },
      Utc::now(),
    );
    assert_eq!(record.status, Status::NotApplicable);
    assert!(record.completion_date.is_none());
    assert!(record.expiry_date.is_none());
    assert_eq!(record.created_at, record.updated_at);
  }

  #[test]
  fn status_strings_are_snake_case() {
    assert_eq!(Status::NotApplicable.to_string(), "not_applicable");
    assert_eq!(Status::from_str("booked").unwrap(), Status::Booked);
    assert!(Status::from_str("done").is_err());
  }

  #[test]
  fn standing_of_completed_records() {
    let today = date(2024, 6, 1);
    assert_eq!(completed(None).standing(today, 30), Standing::Current);
    assert_eq!(
      completed(Some(date(2024, 5, 31))).standing(today, 30),
      Standing::Expired
    );
    assert_eq!(
      completed(Some(date(2024, 6, 1))).standing(today, 30),
      Standing::ExpiringSoon
    );
    assert_eq!(
      completed(Some(date(2024, 7, 1))).standing(today, 30),
      Standing::ExpiringSoon
    );
    assert_eq!(
      completed(Some(date(2024, 7, 2))).standing(today, 30),
      Standing::Current
    );
  }

  #[test]
  fn standing_of_undated_statuses() {
    let mut record = completed(None);
    let today = date(2024, 6, 1);
    for (status, standing) in [
      (Status::NotApplicable, Standing::NotRequired),
      (Status::Awaiting, Standing::Outstanding),
      (Status::Booked, Standing::Booked),
    ] {
      record.status = status;
      assert_eq!(record.standing(today, 30), standing);
    }
  }
}
