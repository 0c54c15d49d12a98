//! Handlers for `/profile`.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use roll_core::{
  identity::{Identity, Profile, ProfilePatch},
  store::AttendanceStore,
  tracker::{Outcome, Tracker},
};
use serde::Serialize;

use crate::error::ApiError;

/// A profile plus the initials shown in the avatar.
#[derive(Debug, Serialize)]
pub struct ProfileView {
  #[serde(flatten)]
  pub profile:  Profile,
  pub initials: String,
}

impl From<Profile> for ProfileView {
  fn from(profile: Profile) -> Self {
    let initials = profile.initials();
    Self { profile, initials }
  }
}

/// `GET /profile`: 404 until the first `POST /session`.
pub async fn get_one<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
) -> Result<Json<ProfileView>, ApiError> {
  let profile = tracker.profile(&identity.owner).await?;
  Ok(Json(ProfileView::from(profile)))
}

/// `PATCH /profile`: body: `{"display_name"?: "...", "email"?: "..."}`
pub async fn update<S: AttendanceStore>(
  State(tracker): State<Arc<Tracker<S>>>,
  Extension(identity): Extension<Identity>,
  Json(patch): Json<ProfilePatch>,
) -> Result<Json<Outcome<Profile>>, ApiError> {
  Ok(Json(tracker.update_profile(&identity.owner, patch).await?))
}
