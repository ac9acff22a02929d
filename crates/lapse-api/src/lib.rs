//! JSON API for the Lapse training compliance engine.
//!
//! Exposes an axum [`Router`] over a [`ComplianceEngine`] whose store, course
//! catalog and directory are one backend. Authentication, TLS, and transport
//! concerns are the caller's responsibility; the caller's identity arrives in
//! the [`caller::CALLER_HEADER`] header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", lapse_api::api_router(Arc::new(engine)))
//! ```

pub mod caller;
pub mod config;
pub mod error;
pub mod records;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, put},
};
use lapse_core::{
  course::CourseCatalog, engine::ComplianceEngine, scope::Directory, store::ComplianceStore,
};
use tower_http::trace::TraceLayer;

pub use self::config::ServerConfig;
pub use self::error::ApiError;

/// A backend that serves as store, course catalog and directory at once.
pub trait Backend:
  ComplianceStore + CourseCatalog + Directory + Clone + Send + Sync + 'static
{
}

impl<T> Backend for T where
  T: ComplianceStore + CourseCatalog + Directory + Clone + Send + Sync + 'static
{
}

pub type Engine<B> = ComplianceEngine<B, B, B>;

/// Build the API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<B: Backend>(engine: Arc<Engine<B>>) -> Router<()> {
  Router::new()
    .route("/records", get(records::list::<B>).post(records::create::<B>))
    .route("/records/summary", get(records::summary::<B>))
    .route("/records/{id}", get(records::get_one::<B>).delete(records::remove::<B>))
    .route("/records/{id}/status", put(records::set_status::<B>))
    .layer(TraceLayer::new_for_http())
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use chrono::NaiveDate;
  use lapse_core::{engine::FixedClock, scope::RoleTier};
  use lapse_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use crate::caller::CALLER_HEADER;

  struct Fixture {
    store:    SqliteStore,
    router:   Router,
    course:   Uuid,
    location: Uuid,
    manager:  Uuid,
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let engine = ComplianceEngine::new(store.clone(), store.clone(), store.clone())
      .with_clock(FixedClock(today));

    let course = store.add_course("Fire safety", Some(12)).await.unwrap().course_id;
    let location = Uuid::new_v4();
    let manager = Uuid::new_v4();
    store.set_caller_role(manager, RoleTier::Manager).await.unwrap();
    store.add_location_member(manager, location).await.unwrap();

    Fixture {
      router: api_router(Arc::new(engine)),
      store,
      course,
      location,
      manager,
    }
  }

  async fn send(
    router: &Router,
    method: &str,
    uri:    &str,
    caller: Option<Uuid>,
    body:   Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = caller {
      builder = builder.header(CALLER_HEADER, id.to_string());
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn create_record(f: &Fixture, staff_id: Uuid) -> Value {
    let resp = send(
      &f.router,
      "POST",
      "/records",
      Some(f.manager),
      Some(json!({
        "staff_id": staff_id,
        "course_id": f.course,
        "location_id": f.location,
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await
  }

  #[tokio::test]
  async fn missing_caller_header_is_unauthorized() {
    let f = fixture().await;
    let resp = send(&f.router, "GET", "/records", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["kind"], "unauthenticated");
  }

  #[tokio::test]
  async fn create_is_idempotent() {
    let f = fixture().await;
    let staff = Uuid::new_v4();
    let first = create_record(&f, staff).await;
    let second = create_record(&f, staff).await;
    assert_eq!(first["record_id"], second["record_id"]);
    assert_eq!(first["status"], "not_applicable");
    assert_eq!(first["completion_date"], Value::Null);
  }

  #[tokio::test]
  async fn completing_and_listing() {
    let f = fixture().await;
    let record = create_record(&f, Uuid::new_v4()).await;
    let id = record["record_id"].as_str().unwrap();

    let resp = send(
      &f.router,
      "PUT",
      &format!("/records/{id}/status"),
      Some(f.manager),
      Some(json!({ "status": "completed", "completion_date": "2024-01-31" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = json_body(resp).await;
    assert_eq!(updated["expiry_date"], "2025-01-31");

    let resp = send(
      &f.router,
      "GET",
      "/records?status=completed&expires_to=2025-12-31",
      Some(f.manager),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listed = json_body(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["completion_date"], "2024-01-31");

    let resp = send(&f.router, "GET", "/records/summary", Some(f.manager), None).await;
    let summary = json_body(resp).await;
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["current"], 1);
  }

  #[tokio::test]
  async fn future_completion_is_unprocessable() {
    let f = fixture().await;
    let record = create_record(&f, Uuid::new_v4()).await;
    let id = record["record_id"].as_str().unwrap();

    let resp = send(
      &f.router,
      "PUT",
      &format!("/records/{id}/status"),
      Some(f.manager),
      Some(json!({ "status": "completed", "completion_date": "2024-06-02" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["kind"], "invalid_date");
  }

  #[tokio::test]
  async fn staff_reads_of_other_records_look_like_missing_records() {
    let f = fixture().await;
    let staff = Uuid::new_v4();
    f.store.set_caller_role(staff, RoleTier::Staff).await.unwrap();

    let other = create_record(&f, Uuid::new_v4()).await;
    let other_id = other["record_id"].as_str().unwrap();
    let hidden = send(&f.router, "GET", &format!("/records/{other_id}"), Some(staff), None).await;
    let hidden_status = hidden.status();
    let hidden_body = json_body(hidden).await;

    let missing_id = Uuid::new_v4();
    let missing =
      send(&f.router, "GET", &format!("/records/{missing_id}"), Some(staff), None).await;
    let missing_status = missing.status();
    let missing_body = json_body(missing).await;

    assert_eq!(hidden_status, StatusCode::NOT_FOUND);
    assert_eq!(missing_status, StatusCode::NOT_FOUND);
    assert_eq!(hidden_body["kind"], missing_body["kind"]);
    assert_eq!(hidden_body["error"], format!("record not found: {other_id}"));
  }

  #[tokio::test]
  async fn staff_writes_to_other_records_look_like_missing_records() {
    let f = fixture().await;
    let staff = Uuid::new_v4();
    f.store.set_caller_role(staff, RoleTier::Staff).await.unwrap();
    let other = create_record(&f, Uuid::new_v4()).await;
    let other_id = other["record_id"].as_str().unwrap().to_owned();
    let missing_id = Uuid::new_v4().to_string();

    for (method, suffix, body) in [
      ("PUT", "/status", Some(json!({ "status": "booked" }))),
      ("DELETE", "", None),
    ] {
      let mut bodies = Vec::new();
      for id in [&other_id, &missing_id] {
        let resp = send(
          &f.router,
          method,
          &format!("/records/{id}{suffix}"),
          Some(staff),
          body.clone(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} /records/{id}{suffix}");
        let json = json_body(resp).await;
        assert_eq!(json["error"], format!("record not found: {id}"));
        bodies.push(json);
      }
      assert_eq!(bodies[0]["kind"], "not_found");
      assert_eq!(bodies[0]["kind"], bodies[1]["kind"]);
    }

    // The record was neither changed nor removed.
    let resp =
      send(&f.router, "GET", &format!("/records/{other_id}"), Some(f.manager), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "not_applicable");
  }

  #[tokio::test]
  async fn staff_cannot_change_their_own_record() {
    let f = fixture().await;
    let staff = Uuid::new_v4();
    f.store.set_caller_role(staff, RoleTier::Staff).await.unwrap();
    let mine = create_record(&f, staff).await;
    let id = mine["record_id"].as_str().unwrap();

    let resp = send(&f.router, "GET", &format!("/records/{id}"), Some(staff), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
      &f.router,
      "PUT",
      &format!("/records/{id}/status"),
      Some(staff),
      Some(json!({ "status": "booked" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn delete_removes_record() {
    let f = fixture().await;
    let record = create_record(&f, Uuid::new_v4()).await;
    let id = record["record_id"].as_str().unwrap();

    let resp = send(&f.router, "DELETE", &format!("/records/{id}"), Some(f.manager), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&f.router, "GET", &format!("/records/{id}"), Some(f.manager), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
