//! In-app notifications raised by the alert engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::identity::Owner;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  Warning,
  Critical,
}

impl Severity {
  pub fn as_str(self) -> &'static str { self.into() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub owner:           Owner,
  /// The subject whose attendance triggered the notification, if any.
  pub subject_id:      Option<Uuid>,
  pub title:           String,
  pub message:         String,
  pub severity:        Severity,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::raise_alerts`]. New
/// notifications are always unread.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub owner:      Owner,
  pub subject_id: Option<Uuid>,
  pub title:      String,
  pub message:    String,
  pub severity:   Severity,
}
