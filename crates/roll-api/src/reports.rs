//! Handlers for `GET /reports` and `GET /stats/today`.
//!
//! Both accept an optional `?today=YYYY-MM-DD`.

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Query, State},
};
use roll_core::{
  identity::Identity,
  report::{DailySnapshot, Report},
  store::AttendanceStore,
  tracker::Tracker,
};

use crate::{TodayParams, error::ApiError};

/// `GET /reports`: weekly and monthly windows plus per-subject figures.
pub async fn report<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<TodayParams>,
) -> Result<Json<Report>, ApiError> {
  Ok(Json(tracker.report(&identity.owner, params.resolve()).await?))
}

/// `GET /stats/today`
pub async fn today<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<TodayParams>,
) -> Result<Json<DailySnapshot>, ApiError> {
  Ok(Json(tracker.today_snapshot(&identity.owner, params.resolve()).await?))
}
