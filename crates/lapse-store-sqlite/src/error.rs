//! Error type for `lapse-store-sqlite`.

use lapse_core::record::Association;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unexpected column value: {0}")]
  Decode(String),

  #[error("invalid course: {0}")]
  InvalidCourse(String),

  /// The call did not complete within the configured timeout.
  #[error("timed out after {0:?} waiting for the database")]
  Timeout(std::time::Duration),

  /// Another writer inserted the same triple first.
  #[error("a record already exists for {0}")]
  Conflict(Association),

  #[error("record not found: {0}")]
  RecordNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// `true` when SQLite gave up waiting for a lock.
  fn is_busy(&self) -> bool {
    matches!(
      self,
      Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
  }
}

impl From<Error> for lapse_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Conflict(association) => Self::Conflict(association),
      Error::RecordNotFound(id) => Self::RecordNotFound(id),
      Error::InvalidCourse(msg) => Self::InvalidArgument(msg),
      Error::Timeout(_) => Self::Unavailable(e.to_string()),
      e if e.is_busy() => Self::Unavailable(e.to_string()),
      e => Self::Storage(Box::new(e)),
    }
  }
}
