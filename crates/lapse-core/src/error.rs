//! Error types for `lapse-core`.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::record::Association;

/// The caller-facing classification of an [`Error`].
///
/// Storage backends map their own failures onto one of these kinds; the HTTP
/// layer maps kinds onto status codes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  InvalidArgument,
  InvalidDate,
  Forbidden,
  Conflict,
  Unavailable,
  Storage,
}

/// Why a caller was refused access to a record or location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
  #[error("caller {caller_id} has read-only access")]
  ReadOnly { caller_id: Uuid },

  #[error("record {record_id} is outside the caller's scope")]
  RecordOutOfScope { record_id: Uuid },

  #[error("location {location_id} is outside the caller's scope")]
  LocationOutOfScope { location_id: Uuid },

  /// Rendered exactly like [`Error::RecordNotFound`]; staff callers must not
  /// learn whether an out-of-scope record exists.
  #[error("record not found: {record_id}")]
  Concealed { record_id: Uuid },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("course not found: {0}")]
  CourseNotFound(Uuid),

  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("caller not found: {0}")]
  CallerNotFound(Uuid),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("completion date {completion} is after today ({today})")]
  FutureCompletion {
    completion: NaiveDate,
    today:      NaiveDate,
  },

  #[error(transparent)]
  Forbidden(#[from] Denial),

  #[error("a record already exists for {0}")]
  Conflict(Association),

  #[error("storage unavailable: {0}")]
  Unavailable(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::CourseNotFound(_) | Self::RecordNotFound(_) | Self::CallerNotFound(_) => {
        ErrorKind::NotFound
      }
      Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
      Self::FutureCompletion { .. } => ErrorKind::InvalidDate,
      Self::Forbidden(_) => ErrorKind::Forbidden,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::Unavailable(_) => ErrorKind::Unavailable,
      Self::Storage(_) => ErrorKind::Storage,
    }
  }

  /// `true` when the error must be presented to the caller as "not found",
  /// either because it is one or because it conceals an out-of-scope record.
  pub fn presents_as_not_found(&self) -> bool {
    matches!(self.kind(), ErrorKind::NotFound)
      || matches!(self, Self::Forbidden(Denial::Concealed { .. }))
  }

  pub(crate) fn invalid(message: impl Into<String>) -> Self {
    Self::InvalidArgument(message.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
