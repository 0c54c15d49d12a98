//! Caller identity as supplied by the identity provider, and the profile
//! projection kept for each owner.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when the identity provider supplies none.
pub const DEFAULT_DISPLAY_NAME: &str = "Student User";

/// The stable user identifier every row is filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Owner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// What the identity provider knows about an authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
  pub owner:        Owner,
  pub display_name: Option<String>,
  pub email:        Option<String>,
}

impl Identity {
  pub fn new(owner: Owner) -> Self {
    Self { owner, display_name: None, email: None }
  }
}

/// Per-owner profile. Created on first sign-in, editable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub owner:        Owner,
  pub display_name: String,
  pub email:        Option<String>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   Option<DateTime<Utc>>,
}

impl Profile {
  /// Upper-cased initials of the display name, e.g. `"Ada Lovelace"` → `"AL"`.
  pub fn initials(&self) -> String {
    self
      .display_name
      .split_whitespace()
      .filter_map(|w| w.chars().next())
      .flat_map(char::to_uppercase)
      .collect()
  }
}

/// Partial update accepted by [`crate::store::AttendanceStore::update_profile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
  pub display_name: Option<String>,
  pub email:        Option<String>,
}
