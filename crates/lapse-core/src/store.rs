//! The `ComplianceStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `lapse-store-sqlite`).
//! It deliberately has no method that writes a status or a date directly:
//! the only write to an existing record is [`ComplianceStore::commit_transition`],
//! which takes a [`Transition`] built by the state machine.

use std::future::Future;

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error,
  record::{Association, ComplianceRecord, Status},
  scope::RecordScope,
  transition::Transition,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Caller-supplied filters for [`ComplianceStore::list_records`]. They narrow
/// the caller's scope; they never widen it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilters {
  pub location_id:    Option<Uuid>,
  pub staff_id:       Option<Uuid>,
  pub course_id:      Option<Uuid>,
  pub status:         Option<Status>,
  /// Inclusive lower bound on `expiry_date`. Records without one never match.
  pub expires_from:   Option<NaiveDate>,
  /// Inclusive upper bound on `expiry_date`.
  pub expires_to:     Option<NaiveDate>,
  pub completed_from: Option<NaiveDate>,
  pub completed_to:   Option<NaiveDate>,
  /// `None` returns every match.
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

impl RecordFilters {
  /// `true` if `record` satisfies every filter (ignoring pagination).
  pub fn matches(&self, record: &ComplianceRecord) -> bool {
    fn within(
      value: Option<NaiveDate>,
      from: Option<NaiveDate>,
      to: Option<NaiveDate>,
    ) -> bool {
      if from.is_none() && to.is_none() {
        return true;
      }
      value.is_some_and(|v| from.is_none_or(|f| v >= f) && to.is_none_or(|t| v <= t))
    }

    self.location_id.is_none_or(|id| record.location_id == id)
      && self.staff_id.is_none_or(|id| record.staff_id == id)
      && self.course_id.is_none_or(|id| record.course_id == id)
      && self.status.is_none_or(|s| record.status == s)
      && within(record.expiry_date, self.expires_from, self.expires_to)
      && within(record.completion_date, self.completed_from, self.completed_to)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a compliance record store backend.
///
/// Implementations must:
/// - keep the (staff, course, location) triple unique;
/// - commit a transition's status and both dates in one atomic write;
/// - bound every call, failing with [`Error::Unavailable`] rather than
///   blocking indefinitely.
pub trait ComplianceStore: Send + Sync {
  type Error: Into<Error> + std::error::Error + Send + Sync + 'static;

  /// Retrieve a record by UUID. Returns `None` if not found.
  fn get_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Option<ComplianceRecord>, Self::Error>> + Send + '_;

  /// Records inside `scope` matching `filters`, ordered by
  /// (staff, course, location).
  fn list_records<'a>(
    &'a self,
    scope: &'a RecordScope,
    filters: &'a RecordFilters,
  ) -> impl Future<Output = Result<Vec<ComplianceRecord>, Self::Error>> + Send + 'a;

  /// Return the record for `association`, creating it in `NotApplicable`
  /// status if absent. The boolean is `true` when this call created it.
  ///
  /// A concurrent insert of the same triple that wins the uniqueness
  /// constraint surfaces as a conflict.
  fn ensure_association(
    &self,
    association: Association,
  ) -> impl Future<Output = Result<(ComplianceRecord, bool), Self::Error>> + Send + '_;

  /// Atomically write the status and dates of a transition and return the
  /// updated record.
  fn commit_transition(
    &self,
    transition: Transition,
  ) -> impl Future<Output = Result<ComplianceRecord, Self::Error>> + Send + '_;

  /// Remove a record when its association ends. Returns `false` if it did not
  /// exist.
  fn remove_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn record(expiry: Option<NaiveDate>) -> ComplianceRecord {
    let mut r = ComplianceRecord::new(
      Association {
        staff_id:    Uuid::new_v4(),
        course_id:   Uuid::new_v4(),
        location_id: Uuid::new_v4(),
      },
      Utc::now(),
    );
    r.expiry_date = expiry;
    r
  }

  #[test]
  fn empty_filters_match_everything() {
    assert!(RecordFilters::default().matches(&record(None)));
  }

  #[test]
  fn expiry_range_is_inclusive_and_skips_undated() {
    let filters = RecordFilters {
      expires_from: Some(date(2024, 1, 1)),
      expires_to: Some(date(2024, 1, 31)),
      ..Default::default()
    };
    assert!(filters.matches(&record(Some(date(2024, 1, 1)))));
    assert!(filters.matches(&record(Some(date(2024, 1, 31)))));
    assert!(!filters.matches(&record(Some(date(2024, 2, 1)))));
    assert!(!filters.matches(&record(None)));
  }

  #[test]
  fn identity_filters() {
    let r = record(None);
    let hit = RecordFilters { location_id: Some(r.location_id), ..Default::default() };
    let miss = RecordFilters { staff_id: Some(Uuid::new_v4()), ..Default::default() };
    assert!(hit.matches(&r));
    assert!(!miss.matches(&r));
  }
}
