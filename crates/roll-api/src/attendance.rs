//! Handlers for attendance endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects/{id}/attendance` | Latest records; `?limit=` (default 5) |
//! | `PUT`    | `/subjects/{id}/attendance/{date}` | Body: `{"status":"absent"}` |
//! | `GET`    | `/attendance` | Optional `subject_id`, `date`, `since`, `limit` |
//! | `DELETE` | `/attendance/{id}` | 404 if not found |
//! | `POST`   | `/attendance/auto-mark` | Optional `?today=`; safe to repeat |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use roll_core::{
  attendance::{AttendanceQuery, AttendanceRecord, Status},
  identity::Identity,
  store::AttendanceStore,
  tracker::{AutoMarkReport, Outcome, SavedAttendance, Tracker},
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{TodayParams, error::ApiError};

// ─── Per subject ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub limit: Option<usize>,
}

/// `GET /subjects/{id}/attendance[?limit=<n>]`
pub async fn recent<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
  Query(params): Query<RecentParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
  // 404 for an unknown subject rather than an empty list.
  tracker.get_subject(&identity.owner, id).await?;
  let records = tracker
    .recent_attendance(&identity.owner, id, params.limit)
    .await?;
  Ok(Json(records))
}

/// Parsed by hand; an unknown status is a 400.
#[derive(Debug, Deserialize)]
pub struct SaveBody {
  pub status: String,
}

/// `PUT /subjects/{id}/attendance/{date}`: creates or replaces the record
/// for that date and reports any alerts the save raised.
pub async fn save<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path((id, date)): Path<(Uuid, NaiveDate)>,
  Json(body): Json<SaveBody>,
) -> Result<Json<Outcome<SavedAttendance>>, ApiError> {
  let status = Status::parse(body.status.trim())?;
  let outcome = tracker
    .save_attendance(&identity.owner, id, date, status)
    .await?;
  debug!(
    owner = %identity.owner,
    subject_id = %id,
    %date,
    alerts = outcome.value.notifications.len(),
    "attendance saved via api"
  );
  Ok(Json(outcome))
}

// ─── Query ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub subject_id: Option<Uuid>,
  pub date:       Option<NaiveDate>,
  pub since:      Option<NaiveDate>,
  pub limit:      Option<usize>,
}

impl From<ListParams> for AttendanceQuery {
  fn from(p: ListParams) -> Self {
    AttendanceQuery {
      subject_id: p.subject_id,
      date:       p.date,
      since:      p.since,
      limit:      p.limit,
    }
  }
}

/// `GET /attendance[?subject_id=...][&date=...][&since=...][&limit=...]`
pub async fn list<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
  let records = tracker
    .attendance(&identity.owner, AttendanceQuery::from(params))
    .await?;
  Ok(Json(records))
}

/// `DELETE /attendance/{id}`
pub async fn delete_one<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
) -> Result<Json<Outcome<AttendanceRecord>>, ApiError> {
  Ok(Json(tracker.delete_attendance(&identity.owner, id).await?))
}

// ─── Auto-mark ────────────────────────────────────────────────────────────────

/// `POST /attendance/auto-mark[?today=<date>]`
pub async fn auto_mark<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<TodayParams>,
) -> Result<Json<Outcome<AutoMarkReport>>, ApiError> {
  let outcome = tracker
    .run_auto_mark(&identity.owner, params.resolve())
    .await?;
  Ok(Json(outcome))
}
