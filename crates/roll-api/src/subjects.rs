//! Handlers for `/subjects` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects` | Optional `?day=monday` (any case) |
//! | `POST`   | `/subjects` | Body: `{"name":"Physics","days":["monday"]}`; 201 |
//! | `GET`    | `/subjects/{id}` | 404 if not found |
//! | `PATCH`  | `/subjects/{id}` | Body: `{"name"?, "days"?}` |
//! | `DELETE` | `/subjects/{id}` | Also deletes every attendance record |
//! | `GET`    | `/subjects/{id}/schedule/nearest` | `?from=YYYY-MM-DD` |
//! | `GET`    | `/subjects/{id}/schedule/step` | `?from=...&direction=next\|previous` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use roll_core::{
  identity::Identity,
  schedule::{self, Day, Direction, Recurrence},
  store::AttendanceStore,
  subject::Subject,
  tracker::{Outcome, Tracker},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// The day is parsed by hand so an unknown name is a JSON 400.
#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub day: Option<String>,
}

/// `GET /subjects[?day=<day>]`
pub async fn list<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Subject>>, ApiError> {
  let day = params.day.as_deref().map(schedule::parse_day).transpose()?;
  let subjects = match day {
    Some(day) => tracker.subjects_on(&identity.owner, day).await?,
    None => tracker.list_subjects(&identity.owner).await?,
  };
  Ok(Json(subjects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// Day names are parsed by hand; an unknown or missing day is a 400.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
  #[serde(default)]
  pub days: Vec<String>,
}

/// `POST /subjects`: returns 201 + the stored subject.
pub async fn create<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let recurrence = Recurrence::parse(&body.days)?;
  let outcome = tracker
    .create_subject(&identity.owner, &body.name, recurrence)
    .await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/{id}`
pub async fn get_one<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
) -> Result<Json<Subject>, ApiError> {
  Ok(Json(tracker.get_subject(&identity.owner, id).await?))
}

// ─── Edit ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EditBody {
  pub name: Option<String>,
  pub days: Option<Vec<String>>,
}

/// `PATCH /subjects/{id}`
pub async fn edit<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
  Json(body): Json<EditBody>,
) -> Result<Json<Outcome<Subject>>, ApiError> {
  let recurrence = body.days.map(Recurrence::parse).transpose()?;
  let outcome = tracker
    .edit_subject(&identity.owner, id, body.name.as_deref(), recurrence)
    .await?;
  Ok(Json(outcome))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /subjects/{id}`: the value is the number of attendance records
/// removed with the subject.
pub async fn delete_one<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
) -> Result<Json<Outcome<usize>>, ApiError> {
  Ok(Json(tracker.delete_subject(&identity.owner, id).await?))
}

// ─── Schedule ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScheduleDate {
  pub subject_id: Uuid,
  pub date:       NaiveDate,
  pub day:        Day,
}

impl ScheduleDate {
  fn new(subject_id: Uuid, date: NaiveDate) -> Self {
    Self { subject_id, date, day: Day::of(date) }
  }
}

#[derive(Debug, Deserialize)]
pub struct NearestParams {
  pub from: NaiveDate,
}

/// `GET /subjects/{id}/schedule/nearest?from=<date>`
pub async fn nearest<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
  Query(params): Query<NearestParams>,
) -> Result<Json<ScheduleDate>, ApiError> {
  let date = tracker.nearest_date(&identity.owner, id, params.from).await?;
  Ok(Json(ScheduleDate::new(id, date)))
}

#[derive(Debug, Deserialize)]
pub struct StepParams {
  pub from:      NaiveDate,
  pub direction: Direction,
}

/// `GET /subjects/{id}/schedule/step?from=<date>&direction=<direction>`
pub async fn step<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
  Query(params): Query<StepParams>,
) -> Result<Json<ScheduleDate>, ApiError> {
  let date = tracker
    .step_date(&identity.owner, id, params.from, params.direction)
    .await?;
  Ok(Json(ScheduleDate::new(id, date)))
}
