//! Caller identity extraction.
//!
//! Authentication happens upstream: an authenticating proxy sets the
//! `x-caller-id` header to the caller's directory UUID. This extractor only
//! reads it.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const CALLER_HEADER: &str = "x-caller-id";

/// The directory identity of the caller making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(CALLER_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .map(Caller)
      .ok_or(ApiError::Unauthenticated)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::Request;

  use super::*;

  async fn extract(req: Request<()>) -> Result<Caller, ApiError> {
    let (mut parts, _) = req.into_parts();
    Caller::from_request_parts(&mut parts, &()).await
  }

  #[tokio::test]
  async fn reads_uuid_header() {
    let id = Uuid::new_v4();
    let req = Request::builder()
      .header(CALLER_HEADER, id.to_string())
      .body(())
      .unwrap();
    assert_eq!(extract(req).await.unwrap(), Caller(id));
  }

  #[tokio::test]
  async fn missing_header() {
    let req = Request::builder().body(()).unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::Unauthenticated)));
  }

  #[tokio::test]
  async fn malformed_header() {
    let req = Request::builder()
      .header(CALLER_HEADER, "not-a-uuid")
      .body(())
      .unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::Unauthenticated)));
  }
}
