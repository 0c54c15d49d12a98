//! Handlers for `/notifications` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notifications` | `?unread=true`, `?limit=` (default 10); newest first |
//! | `POST`   | `/notifications/{id}/read` | 404 if not found |
//! | `DELETE` | `/notifications/{id}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
};
use roll_core::{
  identity::Identity,
  notification::Notification,
  store::AttendanceStore,
  tracker::{Outcome, Tracker},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub unread: bool,
  pub limit:  Option<usize>,
}

/// `GET /notifications[?unread=true][&limit=<n>]`
pub async fn list<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError> {
  let notifications = tracker
    .notifications(&identity.owner, params.unread, params.limit)
    .await?;
  Ok(Json(notifications))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
) -> Result<Json<Outcome<()>>, ApiError> {
  Ok(Json(tracker.mark_notification_read(&identity.owner, id).await?))
}

/// `DELETE /notifications/{id}`
pub async fn delete_one<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Path(id): Path<Uuid>,
) -> Result<Json<Outcome<()>>, ApiError> {
  Ok(Json(tracker.delete_notification(&identity.owner, id).await?))
}
