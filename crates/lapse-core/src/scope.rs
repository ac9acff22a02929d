//! Access scope: which records a caller may read, and which they may change.
//!
//! Scope is derived from a caller's role tier and location memberships, both
//! owned by an external [`Directory`]. The engine resolves a [`Scope`] before
//! every read or write; the store's list query takes the resulting
//! [`RecordScope`] as a mandatory argument.

use std::{collections::BTreeSet, future::Future};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Denial, Error, record::ComplianceRecord};

// ─── Role tiers ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoleTier {
  Staff,
  Manager,
  Scheduler,
  Admin,
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// The external role/location directory the engine consumes.
pub trait Directory: Send + Sync {
  type Error: Into<Error> + std::error::Error + Send + Sync + 'static;

  /// The caller's role tier, or `None` if the caller is unknown.
  fn caller_role(
    &self,
    caller_id: Uuid,
  ) -> impl Future<Output = Result<Option<RoleTier>, Self::Error>> + Send + '_;

  /// Locations the caller is linked to. Empty for unknown callers.
  fn caller_locations(
    &self,
    caller_id: Uuid,
  ) -> impl Future<Output = Result<BTreeSet<Uuid>, Self::Error>> + Send + '_;
}

// ─── Scope ───────────────────────────────────────────────────────────────────

/// The record set a caller may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordScope {
  AllLocations,
  /// Records at any of these locations. An empty set matches nothing.
  Locations { location_ids: BTreeSet<Uuid> },
  /// Records whose `staff_id` is the caller, at any location.
  OwnRecords { staff_id: Uuid },
}

impl RecordScope {
  pub fn contains(&self, record: &ComplianceRecord) -> bool {
    match self {
      Self::AllLocations => true,
      Self::Locations { location_ids } => location_ids.contains(&record.location_id),
      Self::OwnRecords { staff_id } => record.staff_id == *staff_id,
    }
  }

  /// `true` when no record can match.
  pub fn is_empty(&self) -> bool {
    matches!(self, Self::Locations { location_ids } if location_ids.is_empty())
  }
}

/// A resolved scope for one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
  pub caller_id:  Uuid,
  pub tier:       RoleTier,
  pub records:    RecordScope,
  pub can_mutate: bool,
}

/// Derive a caller's scope from their role tier and location memberships.
pub fn resolve_scope(
  caller_id: Uuid,
  tier: RoleTier,
  memberships: BTreeSet<Uuid>,
) -> Scope {
  let (records, can_mutate) = match tier {
    RoleTier::Admin => (RecordScope::AllLocations, true),
    RoleTier::Manager | RoleTier::Scheduler => {
      (RecordScope::Locations { location_ids: memberships }, true)
    }
    RoleTier::Staff => (RecordScope::OwnRecords { staff_id: caller_id }, false),
  };
  Scope { caller_id, tier, records, can_mutate }
}

impl Scope {
  /// Check that the caller may read `record`.
  pub fn authorize_read(&self, record: &ComplianceRecord) -> Result<(), Denial> {
    if self.records.contains(record) {
      return Ok(());
    }
    Err(self.out_of_scope(record.record_id))
  }

  /// Check that the caller may change `record`. Visibility is checked first
  /// so a read-only caller probing someone else's record learns nothing.
  pub fn authorize_write(&self, record: &ComplianceRecord) -> Result<(), Denial> {
    self.authorize_read(record)?;
    if !self.can_mutate {
      return Err(Denial::ReadOnly { caller_id: self.caller_id });
    }
    Ok(())
  }

  /// Check that the caller may create or remove records at `location_id`.
  pub fn authorize_location_write(&self, location_id: Uuid) -> Result<(), Denial> {
    if !self.can_mutate {
      return Err(Denial::ReadOnly { caller_id: self.caller_id });
    }
    match &self.records {
      RecordScope::AllLocations => Ok(()),
      RecordScope::Locations { location_ids } if location_ids.contains(&location_id) => {
        Ok(())
      }
      _ => Err(Denial::LocationOutOfScope { location_id }),
    }
  }

  fn out_of_scope(&self, record_id: Uuid) -> Denial {
    match self.tier {
      RoleTier::Staff => Denial::Concealed { record_id },
      _ => Denial::RecordOutOfScope { record_id },
    }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use chrono::Utc;

  use super::*;
  use crate::record::Association;

  fn record_at(staff_id: Uuid, location_id: Uuid) -> ComplianceRecord {
    ComplianceRecord::new(
      Association { staff_id, course_id: Uuid::new_v4(), location_id },
      Utc::now(),
    )
  }

  #[test]
  fn admin_sees_and_mutates_everything() {
    let scope = resolve_scope(Uuid::new_v4(), RoleTier::Admin, BTreeSet::new());
    let r = record_at(Uuid::new_v4(), Uuid::new_v4());
    assert_eq!(scope.records, RecordScope::AllLocations);
    assert!(scope.authorize_write(&r).is_ok());
    assert!(scope.authorize_location_write(Uuid::new_v4()).is_ok());
  }

  #[test]
  fn manager_is_limited_to_memberships() {
    let l1 = Uuid::new_v4();
    let l2 = Uuid::new_v4();
    let scope = resolve_scope(Uuid::new_v4(), RoleTier::Manager, BTreeSet::from([l1]));

    assert!(scope.authorize_write(&record_at(Uuid::new_v4(), l1)).is_ok());
    let outside = record_at(Uuid::new_v4(), l2);
    assert_eq!(
      scope.authorize_read(&outside),
      Err(Denial::RecordOutOfScope { record_id: outside.record_id })
    );
    assert_eq!(
      scope.authorize_location_write(l2),
      Err(Denial::LocationOutOfScope { location_id: l2 })
    );
  }

  #[test]
  fn scheduler_matches_manager() {
    let l1 = Uuid::new_v4();
    let scope = resolve_scope(Uuid::new_v4(), RoleTier::Scheduler, BTreeSet::from([l1]));
    assert!(scope.can_mutate);
    assert!(scope.authorize_location_write(l1).is_ok());
  }

  #[test]
  fn no_memberships_means_no_records() {
    let scope = resolve_scope(Uuid::new_v4(), RoleTier::Manager, BTreeSet::new());
    assert!(scope.records.is_empty());
    assert!(scope.authorize_read(&record_at(Uuid::new_v4(), Uuid::new_v4())).is_err());
  }

  #[test]
  fn staff_read_only_their_own_records() {
    let me = Uuid::new_v4();
    let scope = resolve_scope(me, RoleTier::Staff, BTreeSet::from([Uuid::new_v4()]));
    let mine = record_at(me, Uuid::new_v4());
    let theirs = record_at(Uuid::new_v4(), Uuid::new_v4());

    assert!(scope.authorize_read(&mine).is_ok());
    assert_eq!(
      scope.authorize_write(&mine),
      Err(Denial::ReadOnly { caller_id: me })
    );
    assert_eq!(
      scope.authorize_write(&theirs),
      Err(Denial::Concealed { record_id: theirs.record_id })
    );
  }

  #[test]
  fn role_tiers_parse_lowercase() {
    assert_eq!(RoleTier::from_str("scheduler").unwrap(), RoleTier::Scheduler);
    assert_eq!(RoleTier::Admin.to_string(), "admin");
  }
}
