//! The status/date state machine.
//!
//! All four statuses are reachable from all four; there is no terminal state.
//! A transition always rebuilds the whole (status, completion, expiry) triple
//! from its inputs, never from the record's previous dates.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  expiry::compute_expiry,
  record::{ComplianceRecord, Status},
};

/// The validated outcome of a transition, ready to be committed.
///
/// Fields are private: the only way to obtain a `Transition` is
/// [`transition`], so a store that accepts only this type can never persist a
/// status/date combination the state machine did not produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  record_id:       Uuid,
  status:          Status,
  completion_date: Option<NaiveDate>,
  expiry_date:     Option<NaiveDate>,
}

impl Transition {
  pub fn record_id(&self) -> Uuid { self.record_id }

  pub fn status(&self) -> Status { self.status }

  pub fn completion_date(&self) -> Option<NaiveDate> { self.completion_date }

  pub fn expiry_date(&self) -> Option<NaiveDate> { self.expiry_date }

  /// Apply to an in-memory copy of the record, as a store does after commit.
  pub fn apply(&self, record: &mut ComplianceRecord, at: DateTime<Utc>) {
    record.status = self.status;
    record.completion_date = self.completion_date;
    record.expiry_date = self.expiry_date;
    record.updated_at = at;
  }
}

/// Compute the next state of `record`.
///
/// - `Completed` requires a `completion_date` no later than `today`; the
///   expiry is derived from `validity_months` via [`compute_expiry`].
/// - `Booked`, `Awaiting` and `NotApplicable` clear both dates. Supplying a
///   completion date with one of them is rejected rather than ignored.
pub fn transition(
  record: &ComplianceRecord,
  status: Status,
  completion_date: Option<NaiveDate>,
  validity_months: Option<u32>,
  today: NaiveDate,
) -> Result<Transition> {
  if !status.carries_dates() {
    if let Some(date) = completion_date {
      return Err(Error::invalid(format!(
        "a completion date ({date}) can only be given with status completed, not {status}"
      )));
    }
    return Ok(Transition {
      record_id: record.record_id,
      status,
      completion_date: None,
      expiry_date: None,
    });
  }

  let completion = completion_date
    .ok_or_else(|| Error::invalid("status completed requires a completion date"))?;
  if completion > today {
    return Err(Error::FutureCompletion { completion, today });
  }

  Ok(Transition {
    record_id:       record.record_id,
    status,
    completion_date: Some(completion),
    expiry_date:     compute_expiry(completion, validity_months)?,
  })
}
