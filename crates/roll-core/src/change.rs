//! Change descriptions returned by mutating operations.
//!
//! The core never refreshes views itself; it reports what changed and the
//! presentation layer decides what to re-render.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
  SubjectCreated { subject_id: Uuid },
  SubjectUpdated { subject_id: Uuid },
  /// The subject and every attendance record it owned are gone.
  SubjectDeleted { subject_id: Uuid, records_removed: usize },
  AttendanceChanged { subject_id: Uuid, date: NaiveDate },
  NotificationsChanged,
  ProfileChanged,
}

/// An ordered, duplicate-free list of [`Change`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(Vec<Change>);

impl ChangeSet {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, change: Change) {
    if !self.0.contains(&change) {
      self.0.push(change);
    }
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &Change> { self.0.iter() }
}

impl From<Change> for ChangeSet {
  fn from(change: Change) -> Self { Self(vec![change]) }
}
