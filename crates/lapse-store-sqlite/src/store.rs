//! [`SqliteStore`], the SQLite implementation of [`ComplianceStore`],
//! [`CourseCatalog`] and [`Directory`].

use std::{
  collections::BTreeSet,
  path::Path,
  time::{Duration, Instant},
};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};
use tracing::warn;
use uuid::Uuid;

use lapse_core::{
  course::{Course, CourseCatalog},
  record::{Association, ComplianceRecord},
  scope::{Directory, RecordScope, RoleTier},
  store::{ComplianceStore, RecordFilters},
  transition::Transition,
};

use crate::{
  Error, Result,
  encode::{
    RECORD_COLUMNS, RawCourse, RawRecord, decode_role, decode_uuid, encode_date, encode_dt,
    encode_role, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Bounds on how long a call may wait.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long SQLite retries a locked database before failing the statement.
  pub busy_timeout: Duration,
  /// Upper bound on the time a call may wait behind other calls on the
  /// connection thread. A write that has not started by then is dropped.
  pub call_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      busy_timeout: Duration::from_secs(5),
      call_timeout: Duration::from_secs(10),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A compliance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's thread, and every write runs in an
/// `IMMEDIATE` transaction so concurrent processes queue on the write lock.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  call_timeout:    Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreOptions::default()).await
  }

  pub async fn open_in_memory_with(options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let store = Self { conn, call_timeout: options.call_timeout };
    let busy_timeout = options.busy_timeout;
    store
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(store)
  }

  /// Run a read `f` on the connection thread, failing with
  /// [`Error::Timeout`] if it does not finish within the call timeout.
  ///
  /// Abandoning the wait does not cancel `f`; use [`Self::call_write`] for
  /// anything that changes the database.
  async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    match tokio::time::timeout(self.call_timeout, self.conn.call(f)).await {
      Ok(result) => Ok(result?),
      Err(_) => {
        warn!(timeout = ?self.call_timeout, "database call timed out");
        Err(Error::Timeout(self.call_timeout))
      }
    }
  }

  /// Run a write `f` on the connection thread.
  ///
  /// The deadline is checked on the connection thread before `f` starts. A
  /// write still queued at the deadline is dropped and reported as
  /// [`Error::Timeout`]; one that has started always runs to its outcome,
  /// bounded by the SQLite busy timeout. A reported timeout therefore never
  /// commits later.
  async fn call_write<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let deadline = Instant::now() + self.call_timeout;
    let outcome = self
      .conn
      .call(move |conn| {
        if Instant::now() >= deadline {
          return Ok(None);
        }
        f(conn).map(Some)
      })
      .await?;

    outcome.ok_or_else(|| {
      warn!(timeout = ?self.call_timeout, "database write expired before it started");
      Error::Timeout(self.call_timeout)
    })
  }

  // ── Catalog and directory administration ──────────────────────────────────

  /// Add a course to the catalog. `validity_months` must be positive if set.
  pub async fn add_course(
    &self,
    name: impl Into<String>,
    validity_months: Option<u32>,
  ) -> Result<Course> {
    if validity_months == Some(0) {
      return Err(Error::InvalidCourse("validity months must be positive".into()));
    }
    let course = Course {
      course_id: Uuid::new_v4(),
      name: name.into(),
      validity_months,
    };

    let id_str = encode_uuid(course.course_id);
    let name = course.name.clone();
    self
      .call_write(move |conn| {
        conn.execute(
          "INSERT INTO courses (course_id, name, validity_months) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, validity_months],
        )?;
        Ok(())
      })
      .await?;

    Ok(course)
  }

  /// Record a caller's role tier, replacing any previous one.
  pub async fn set_caller_role(&self, caller_id: Uuid, role: RoleTier) -> Result<()> {
    let id_str = encode_uuid(caller_id);
    let role_str = encode_role(role);
    self
      .call_write(move |conn| {
        conn.execute(
          "INSERT INTO caller_roles (caller_id, role) VALUES (?1, ?2)
           ON CONFLICT (caller_id) DO UPDATE SET role = excluded.role",
          rusqlite::params![id_str, role_str],
        )?;
        Ok(())
      })
      .await
  }

  /// Link a caller to a location. Linking twice is a no-op.
  pub async fn add_location_member(&self, caller_id: Uuid, location_id: Uuid) -> Result<()> {
    let caller_str = encode_uuid(caller_id);
    let location_str = encode_uuid(location_id);
    self
      .call_write(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO location_members (caller_id, location_id) VALUES (?1, ?2)",
          rusqlite::params![caller_str, location_str],
        )?;
        Ok(())
      })
      .await
  }

  /// Unlink a caller from a location.
  pub async fn remove_location_member(&self, caller_id: Uuid, location_id: Uuid) -> Result<()> {
    let caller_str = encode_uuid(caller_id);
    let location_str = encode_uuid(location_id);
    self
      .call_write(move |conn| {
        conn.execute(
          "DELETE FROM location_members WHERE caller_id = ?1 AND location_id = ?2",
          rusqlite::params![caller_str, location_str],
        )?;
        Ok(())
      })
      .await
  }
}

// ─── Query building ──────────────────────────────────────────────────────────

/// Translate a scope and filters into a `WHERE` clause and its parameters.
/// The scope condition is always present, so the query can never be wider
/// than the caller's scope.
fn record_conditions(scope: &RecordScope, filters: &RecordFilters) -> (String, Vec<Value>) {
  let mut conds: Vec<String> = vec![];
  let mut params: Vec<Value> = vec![];

  match scope {
    RecordScope::AllLocations => conds.push("1 = 1".into()),
    RecordScope::Locations { location_ids } => {
      let placeholders = vec!["?"; location_ids.len()].join(", ");
      // An empty IN list matches nothing, which is what an empty scope means.
      conds.push(format!("location_id IN ({placeholders})"));
      params.extend(location_ids.iter().map(|id| Value::Text(encode_uuid(*id))));
    }
    RecordScope::OwnRecords { staff_id } => {
      conds.push("staff_id = ?".into());
      params.push(Value::Text(encode_uuid(*staff_id)));
    }
  }

  let mut push = |cond: &str, value: Value| {
    conds.push(cond.to_owned());
    params.push(value);
  };
  if let Some(id) = filters.location_id {
    push("location_id = ?", Value::Text(encode_uuid(id)));
  }
  if let Some(id) = filters.staff_id {
    push("staff_id = ?", Value::Text(encode_uuid(id)));
  }
  if let Some(id) = filters.course_id {
    push("course_id = ?", Value::Text(encode_uuid(id)));
  }
  if let Some(status) = filters.status {
    push("status = ?", Value::Text(encode_status(status).to_owned()));
  }
  if let Some(d) = filters.expires_from {
    push("expiry_date >= ?", Value::Text(encode_date(d)));
  }
  if let Some(d) = filters.expires_to {
    push("expiry_date <= ?", Value::Text(encode_date(d)));
  }
  if let Some(d) = filters.completed_from {
    push("completion_date >= ?", Value::Text(encode_date(d)));
  }
  if let Some(d) = filters.completed_to {
    push("completion_date <= ?", Value::Text(encode_date(d)));
  }

  (format!("WHERE {}", conds.join(" AND ")), params)
}

fn select_record(
  conn: &rusqlite::Connection,
  record_id: &str,
) -> rusqlite::Result<Option<RawRecord>> {
  conn
    .query_row(
      &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
      rusqlite::params![record_id],
      RawRecord::from_row,
    )
    .optional()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

// ─── ComplianceStore impl ────────────────────────────────────────────────────

impl ComplianceStore for SqliteStore {
  type Error = Error;

  async fn get_record(&self, record_id: Uuid) -> Result<Option<ComplianceRecord>> {
    let id_str = encode_uuid(record_id);
    let raw = self
      .call(move |conn| Ok(select_record(conn, &id_str)?))
      .await?;
    raw.map(RawRecord::into_record).transpose()
  }

  async fn list_records<'a>(
    &'a self,
    scope:   &'a RecordScope,
    filters: &'a RecordFilters,
  ) -> Result<Vec<ComplianceRecord>> {
    let (where_clause, mut params) = record_conditions(scope, filters);
    // SQLite treats a negative LIMIT as "no limit".
    let limit = filters.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset = filters.offset.map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));
    params.push(Value::Integer(limit));
    params.push(Value::Integer(offset));

    let sql = format!(
      "SELECT {RECORD_COLUMNS}
       FROM records
       {where_clause}
       ORDER BY staff_id, course_id, location_id
       LIMIT ? OFFSET ?"
    );

    let raws: Vec<RawRecord> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn ensure_association(
    &self,
    association: Association,
  ) -> Result<(ComplianceRecord, bool)> {
    let fresh = ComplianceRecord::new(association, Utc::now());

    let record_id_str   = encode_uuid(fresh.record_id);
    let staff_id_str    = encode_uuid(fresh.staff_id);
    let course_id_str   = encode_uuid(fresh.course_id);
    let location_id_str = encode_uuid(fresh.location_id);
    let status_str      = encode_status(fresh.status);
    let at_str          = encode_dt(fresh.created_at);

    let outcome: Option<(RawRecord, bool)> = self
      .call_write(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
          .query_row(
            &format!(
              "SELECT {RECORD_COLUMNS} FROM records
               WHERE staff_id = ?1 AND course_id = ?2 AND location_id = ?3"
            ),
            rusqlite::params![staff_id_str, course_id_str, location_id_str],
            RawRecord::from_row,
          )
          .optional()?;
        if let Some(raw) = existing {
          tx.commit()?;
          return Ok(Some((raw, false)));
        }

        let inserted = tx.execute(
          "INSERT INTO records (
             record_id, staff_id, course_id, location_id, status,
             completion_date, expiry_date, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?6)",
          rusqlite::params![
            record_id_str,
            staff_id_str,
            course_id_str,
            location_id_str,
            status_str,
            at_str,
          ],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(None),
          Err(e) => return Err(e.into()),
        }

        let raw = select_record(&tx, &record_id_str)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Some((raw, true)))
      })
      .await?;

    let (raw, created) = outcome.ok_or(Error::Conflict(association))?;
    Ok((raw.into_record()?, created))
  }

  async fn commit_transition(&self, transition: Transition) -> Result<ComplianceRecord> {
    let record_id = transition.record_id();

    let record_id_str   = encode_uuid(record_id);
    let status_str      = encode_status(transition.status());
    let completion_str  = transition.completion_date().map(encode_date);
    let expiry_str      = transition.expiry_date().map(encode_date);
    let updated_at_str  = encode_dt(Utc::now());

    let raw: Option<RawRecord> = self
      .call_write(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
          "UPDATE records
           SET status = ?1, completion_date = ?2, expiry_date = ?3, updated_at = ?4
           WHERE record_id = ?5",
          rusqlite::params![
            status_str,
            completion_str,
            expiry_str,
            updated_at_str,
            record_id_str,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let raw = select_record(&tx, &record_id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.ok_or(Error::RecordNotFound(record_id))?.into_record()
  }

  async fn remove_record(&self, record_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(record_id);
    let removed = self
      .call_write(move |conn| {
        Ok(conn.execute("DELETE FROM records WHERE record_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(removed > 0)
  }
}

// ─── CourseCatalog impl ──────────────────────────────────────────────────────

impl CourseCatalog for SqliteStore {
  type Error = Error;

  async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
    let id_str = encode_uuid(course_id);
    let raw: Option<RawCourse> = self
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT course_id, name, validity_months FROM courses WHERE course_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawCourse {
                course_id:       row.get(0)?,
                name:            row.get(1)?,
                validity_months: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCourse::into_course).transpose()
  }
}

// ─── Directory impl ──────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  type Error = Error;

  async fn caller_role(&self, caller_id: Uuid) -> Result<Option<RoleTier>> {
    let id_str = encode_uuid(caller_id);
    let role: Option<String> = self
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT role FROM caller_roles WHERE caller_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    role.as_deref().map(decode_role).transpose()
  }

  async fn caller_locations(&self, caller_id: Uuid) -> Result<BTreeSet<Uuid>> {
    let id_str = encode_uuid(caller_id);
    let ids: Vec<String> = self
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT location_id FROM location_members WHERE caller_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}
