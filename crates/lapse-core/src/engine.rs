//! [`ComplianceEngine`], the query/mutation facade.
//!
//! Every operation resolves the caller's scope first, then talks to the store.
//! Route handlers and import tooling call these methods; none of them touch a
//! store directly.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  course::CourseCatalog,
  record::{Association, ComplianceRecord, Standing, Status},
  scope::{Directory, Scope, resolve_scope},
  store::{ComplianceStore, RecordFilters},
  transition::transition,
};

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Source of "today" for future-date checks and standings.
pub trait Clock: Send + Sync {
  fn today(&self) -> NaiveDate;
}

/// The UTC calendar date of the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate { Utc::now().date_naive() }
}

/// A clock frozen on one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
  fn today(&self) -> NaiveDate { self.0 }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Days before expiry at which a completion counts as expiring soon.
  pub expiry_warning_days: u32,
}

impl Default for EngineConfig {
  fn default() -> Self { Self { expiry_warning_days: 30 } }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Record counts per [`Standing`] within a caller's scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
  pub as_of:         NaiveDate,
  pub total:         usize,
  pub not_required:  usize,
  pub outstanding:   usize,
  pub booked:        usize,
  pub current:       usize,
  pub expiring_soon: usize,
  pub expired:       usize,
}

impl ComplianceSummary {
  fn tally(&mut self, standing: Standing) {
    self.total += 1;
    let slot = match standing {
      Standing::NotRequired => &mut self.not_required,
      Standing::Outstanding => &mut self.outstanding,
      Standing::Booked => &mut self.booked,
      Standing::Current => &mut self.current,
      Standing::ExpiringSoon => &mut self.expiring_soon,
      Standing::Expired => &mut self.expired,
    };
    *slot += 1;
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The training compliance facade over a store, a course catalog and a
/// role/location directory.
///
/// A single backend may play all three parts; pass clones of it.
#[derive(Clone)]
pub struct ComplianceEngine<S, C, D> {
  store:     S,
  catalog:   C,
  directory: D,
  clock:     Arc<dyn Clock>,
  config:    EngineConfig,
}

impl<S, C, D> ComplianceEngine<S, C, D>
where
  S: ComplianceStore,
  C: CourseCatalog,
  D: Directory,
{
  pub fn new(store: S, catalog: C, directory: D) -> Self {
    Self {
      store,
      catalog,
      directory,
      clock: Arc::new(SystemClock),
      config: EngineConfig::default(),
    }
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn today(&self) -> NaiveDate { self.clock.today() }

  /// Look the caller up in the directory and derive their scope.
  pub async fn resolve_caller(&self, caller_id: Uuid) -> Result<Scope> {
    let tier = self
      .directory
      .caller_role(caller_id)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or(Error::CallerNotFound(caller_id))?;
    let memberships = self
      .directory
      .caller_locations(caller_id)
      .await
      .map_err(Into::<Error>::into)?;

    let scope = resolve_scope(caller_id, tier, memberships);
    debug!(%caller_id, %tier, can_mutate = scope.can_mutate, "resolved caller scope");
    Ok(scope)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Records in the caller's scope that also match `filters`.
  pub async fn list_records(
    &self,
    caller_id: Uuid,
    filters: &RecordFilters,
  ) -> Result<Vec<ComplianceRecord>> {
    let scope = self.resolve_caller(caller_id).await?;
    self.list_in_scope(&scope, filters).await
  }

  /// A single record, if the caller may see it.
  pub async fn get_record(
    &self,
    caller_id: Uuid,
    record_id: Uuid,
  ) -> Result<ComplianceRecord> {
    let scope = self.resolve_caller(caller_id).await?;
    let record = self.fetch(record_id).await?;
    scope.authorize_read(&record)?;
    Ok(record)
  }

  /// Counts of the caller's visible records per standing, as of today.
  pub async fn compliance_summary(
    &self,
    caller_id: Uuid,
    filters: &RecordFilters,
  ) -> Result<ComplianceSummary> {
    let scope = self.resolve_caller(caller_id).await?;
    let filters = RecordFilters { limit: None, offset: None, ..filters.clone() };
    let records = self.list_in_scope(&scope, &filters).await?;

    let today = self.today();
    let mut summary = ComplianceSummary { as_of: today, ..Default::default() };
    for record in &records {
      summary.tally(record.standing(today, self.config.expiry_warning_days));
    }
    Ok(summary)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Move a record to `status`, recomputing its dates, and persist the result
  /// atomically.
  pub async fn set_status(
    &self,
    caller_id: Uuid,
    record_id: Uuid,
    status: Status,
    completion_date: Option<NaiveDate>,
  ) -> Result<ComplianceRecord> {
    let scope = self.resolve_caller(caller_id).await?;
    let record = self.fetch(record_id).await?;
    if let Err(denial) = scope.authorize_write(&record) {
      warn!(%caller_id, %record_id, %denial, "status change refused");
      return Err(denial.into());
    }

    let validity_months = self.catalog.get_validity_months(record.course_id).await?;
    let next = transition(&record, status, completion_date, validity_months, self.today())?;

    let updated = self
      .store
      .commit_transition(next)
      .await
      .map_err(Into::<Error>::into)?;
    info!(
      %caller_id,
      %record_id,
      from = %record.status,
      to = %updated.status,
      completion_date = ?updated.completion_date,
      expiry_date = ?updated.expiry_date,
      "status changed"
    );
    Ok(updated)
  }

  /// Ensure a record exists for `association`, on behalf of a caller who
  /// must be allowed to write at its location.
  pub async fn ensure_association(
    &self,
    caller_id: Uuid,
    association: Association,
  ) -> Result<ComplianceRecord> {
    let scope = self.resolve_caller(caller_id).await?;
    if let Err(denial) = scope.authorize_location_write(association.location_id) {
      warn!(%caller_id, %association, %denial, "association refused");
      return Err(denial.into());
    }
    self.ensure_association_unscoped(association).await
  }

  /// Ensure a record exists for `association` without a caller scope. For
  /// trusted tooling such as bulk import, which has no directory identity.
  ///
  /// Idempotent: a repeat call returns the existing record.
  pub async fn ensure_association_unscoped(
    &self,
    association: Association,
  ) -> Result<ComplianceRecord> {
    self
      .catalog
      .get_course(association.course_id)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or(Error::CourseNotFound(association.course_id))?;

    let (record, created) = self
      .store
      .ensure_association(association)
      .await
      .map_err(Into::<Error>::into)?;
    if created {
      info!(record_id = %record.record_id, %association, "association created");
    }
    Ok(record)
  }

  /// Remove a record whose association has ended.
  pub async fn remove_association(&self, caller_id: Uuid, record_id: Uuid) -> Result<()> {
    let scope = self.resolve_caller(caller_id).await?;
    let record = self.fetch(record_id).await?;
    scope.authorize_write(&record)?;
    scope.authorize_location_write(record.location_id)?;

    if !self.store.remove_record(record_id).await.map_err(Into::<Error>::into)? {
      return Err(Error::RecordNotFound(record_id));
    }
    info!(%caller_id, %record_id, "association removed");
    Ok(())
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn list_in_scope(
    &self,
    scope: &Scope,
    filters: &RecordFilters,
  ) -> Result<Vec<ComplianceRecord>> {
    if scope.records.is_empty() {
      return Ok(Vec::new());
    }
    self
      .store
      .list_records(&scope.records, filters)
      .await
      .map_err(Into::into)
  }

  async fn fetch(&self, record_id: Uuid) -> Result<ComplianceRecord> {
    self
      .store
      .get_record(record_id)
      .await
      .map_err(Into::<Error>::into)?
      .ok_or(Error::RecordNotFound(record_id))
  }
}
