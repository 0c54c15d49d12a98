//! JSON REST API for Roll.
//!
//! Exposes an axum [`Router`] backed by a [`Tracker`] over any
//! [`roll_core::store::AttendanceStore`]. Authentication is the caller's
//! responsibility: every handler reads the caller's
//! [`Identity`](roll_core::identity::Identity) from a request extension.
//!
//! Mutating endpoints respond with an [`Outcome`](roll_core::tracker::Outcome),
//! i.e. `{"value": ..., "changes": [...]}`, so clients know what to refresh.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roll_api::api_router(tracker.clone()))
//! ```

pub mod attendance;
pub mod error;
pub mod notifications;
pub mod profile;
pub mod reports;
pub mod session;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use chrono::{Local, NaiveDate};
use roll_core::{store::AttendanceStore, tracker::Tracker};
use serde::Deserialize;

pub use error::ApiError;

/// Build a fully-materialised API router for `tracker`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(tracker: Arc<Tracker<S>>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>)
        .patch(subjects::edit::<S>)
        .delete(subjects::delete_one::<S>),
    )
    .route("/subjects/{id}/schedule/nearest", get(subjects::nearest::<S>))
    .route("/subjects/{id}/schedule/step", get(subjects::step::<S>))
    .route("/subjects/{id}/attendance", get(attendance::recent::<S>))
    .route("/subjects/{id}/attendance/{date}", put(attendance::save::<S>))
    // Attendance
    .route("/attendance", get(attendance::list::<S>))
    .route("/attendance/auto-mark", post(attendance::auto_mark::<S>))
    .route("/attendance/{id}", delete(attendance::delete_one::<S>))
    // Reports
    .route("/reports", get(reports::report::<S>))
    .route("/stats/today", get(reports::today::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/{id}", delete(notifications::delete_one::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    // Profile and session
    .route("/profile", get(profile::get_one::<S>).patch(profile::update::<S>))
    .route("/session", post(session::sign_in::<S>).delete(session::sign_out::<S>))
    .with_state(tracker)
}

/// `?today=YYYY-MM-DD`, accepted by every endpoint whose answer depends on
/// the current date. Defaults to the server's local calendar date.
#[derive(Debug, Default, Deserialize)]
pub struct TodayParams {
  pub today: Option<NaiveDate>,
}

impl TodayParams {
  pub fn resolve(&self) -> NaiveDate {
    self.today.unwrap_or_else(|| Local::now().date_naive())
  }
}
