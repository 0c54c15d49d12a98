//! Session transitions.
//!
//! `POST /session` is the sign-in transition: it makes sure the caller has a
//! profile and runs the auto-marking pass for `?today=` (default: local
//! date). `DELETE /session` is the sign-out transition; the server keeps no
//! session state, so it only logs.

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Query, State},
  http::StatusCode,
};
use roll_core::{
  identity::Identity,
  store::AttendanceStore,
  tracker::{Outcome, SignIn, Tracker},
};

use crate::{TodayParams, error::ApiError};

/// `POST /session[?today=<date>]`
pub async fn sign_in<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Query(params): Query<TodayParams>,
) -> Result<Json<Outcome<SignIn>>, ApiError> {
  Ok(Json(tracker.sign_in(&identity, params.resolve()).await?))
}

/// `DELETE /session`: 204.
pub async fn sign_out<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
) -> StatusCode {
  tracker.sign_out(&identity.owner);
  StatusCode::NO_CONTENT
}
