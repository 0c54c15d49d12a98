//! HTTP server for Roll.
//!
//! Mounts the [`roll_api`] router under `/api` behind HTTP Basic
//! authentication, plus an unauthenticated `/health` check.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Json, Router, middleware, routing::get};
use chrono::NaiveDate;
use roll_core::{alert::AlertThresholds, store::AttendanceStore, tracker::Tracker};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use auth::{AuthConfig, UserConfig, authenticate};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLL_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub users:      Vec<UserConfig>,
  #[serde(default)]
  pub alerts:     AlertThresholds,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state assembled once at startup.
#[derive(Clone)]
pub struct AppState<S: AttendanceStore> {
  pub tracker: Arc<Tracker<S>>,
  pub config:  Arc<ServerConfig>,
  pub auth:    Arc<AuthConfig>,
}

impl<S: AttendanceStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let tracker = Tracker::new(store).with_thresholds(config.alerts);
    let auth = AuthConfig { users: config.users.clone() };
    Self {
      tracker: Arc::new(tracker),
      config:  Arc::new(config),
      auth:    Arc::new(auth),
    }
  }

  /// Run the sign-in transition for every configured user, which ensures
  /// each has a profile and auto-marks `today`. A failing user is logged and
  /// skipped.
  pub async fn startup_auto_mark(&self, today: NaiveDate) {
    for user in &self.config.users {
      let identity = user.identity();
      match self.tracker.sign_in(&identity, today).await {
        Ok(outcome) => info!(
          owner = %identity.owner,
          marked = outcome.value.auto_mark.marked.len(),
          "startup auto-mark done"
        ),
        Err(err) => warn!(owner = %identity.owner, error = %err, "startup auto-mark failed"),
      }
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AttendanceStore + 'static,
{
  let api = roll_api::api_router(state.tracker.clone())
    .layer(middleware::from_fn_with_state(state.auth.clone(), authenticate));

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Integration tests ────────────────────────────────────────────────────────
