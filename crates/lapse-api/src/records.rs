//! Handlers for `/records` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/records` | Query params map to [`RecordFilters`] |
//! | `GET`    | `/records/summary` | Counts per standing; same filters |
//! | `GET`    | `/records/:id` | 404 if missing or not visible |
//! | `POST`   | `/records` | Body: [`Association`]; idempotent |
//! | `PUT`    | `/records/:id/status` | Body: [`StatusBody`] |
//! | `DELETE` | `/records/:id` | Removes the association; 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::NaiveDate;
use lapse_core::{
  engine::ComplianceSummary,
  record::{Association, ComplianceRecord, Status},
  store::RecordFilters,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Backend, Engine, caller::Caller, error::ApiError};

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /records[?location_id=...][&status=...][&expires_from=...]...`
pub async fn list<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Caller(caller_id): Caller,
  Query(filters): Query<RecordFilters>,
) -> Result<Json<Vec<ComplianceRecord>>, ApiError> {
  Ok(Json(engine.list_records(caller_id, &filters).await?))
}

/// `GET /records/summary`
pub async fn summary<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Caller(caller_id): Caller,
  Query(filters): Query<RecordFilters>,
) -> Result<Json<ComplianceSummary>, ApiError> {
  Ok(Json(engine.compliance_summary(caller_id, &filters).await?))
}

/// `GET /records/:id`
pub async fn get_one<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Caller(caller_id): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<ComplianceRecord>, ApiError> {
  Ok(Json(engine.get_record(caller_id, id).await?))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// `POST /records` with body `{"staff_id":..,"course_id":..,"location_id":..}`.
/// Returns the existing record if the association is already known.
pub async fn create<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Caller(caller_id): Caller,
  Json(body): Json<Association>,
) -> Result<Json<ComplianceRecord>, ApiError> {
  Ok(Json(engine.ensure_association(caller_id, body).await?))
}

/// JSON body accepted by `PUT /records/:id/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status:          Status,
  /// Required with `completed`, rejected otherwise.
  pub completion_date: Option<NaiveDate>,
}

/// `PUT /records/:id/status`
pub async fn set_status<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Caller(caller_id): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<ComplianceRecord>, ApiError> {
  let record = engine
    .set_status(caller_id, id, body.status, body.completion_date)
    .await?;
  Ok(Json(record))
}

/// `DELETE /records/:id`
pub async fn remove<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Caller(caller_id): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  engine.remove_association(caller_id, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
