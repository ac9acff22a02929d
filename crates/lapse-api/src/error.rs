//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use lapse_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or malformed x-caller-id header")]
  Unauthenticated,

  #[error(transparent)]
  Engine(#[from] lapse_core::Error),
}

impl ApiError {
  /// The status code and `kind` label presented to the client.
  ///
  /// A concealed denial is presented exactly like a missing record. A missing
  /// caller identity is not an engine error and has its own label.
  fn presentation(&self) -> (StatusCode, &'static str) {
    let e = match self {
      Self::Unauthenticated => return (StatusCode::UNAUTHORIZED, "unauthenticated"),
      Self::Engine(e) => e,
    };
    if e.presents_as_not_found() {
      return (StatusCode::NOT_FOUND, ErrorKind::NotFound.into());
    }
    let status = match e.kind() {
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
      ErrorKind::InvalidDate => StatusCode::UNPROCESSABLE_ENTITY,
      ErrorKind::Forbidden => StatusCode::FORBIDDEN,
      ErrorKind::Conflict => StatusCode::CONFLICT,
      ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
      ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.kind().into())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind) = self.presentation();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string(), "kind": kind }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use lapse_core::{Denial, Error};
  use uuid::Uuid;

  use super::*;

  #[test]
  fn concealed_denial_presents_as_not_found() {
    let id = Uuid::new_v4();
    let concealed = ApiError::from(Error::Forbidden(Denial::Concealed { record_id: id }));
    let missing = ApiError::from(Error::RecordNotFound(id));

    assert_eq!(concealed.presentation(), missing.presentation());
    assert_eq!(concealed.to_string(), missing.to_string());
  }

  #[test]
  fn unauthenticated_has_its_own_label() {
    assert_eq!(
      ApiError::Unauthenticated.presentation(),
      (StatusCode::UNAUTHORIZED, "unauthenticated")
    );
  }

  #[test]
  fn kinds_map_to_status_codes() {
    let cases = [
      (Error::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
      (Error::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
      (
        Error::Forbidden(Denial::ReadOnly { caller_id: Uuid::new_v4() }),
        StatusCode::FORBIDDEN,
      ),
      (Error::CourseNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).presentation().0, status);
    }
  }
}
