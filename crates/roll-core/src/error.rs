//! Error types for `roll-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject name must not be empty")]
  EmptyName,

  #[error("a subject must meet on at least one weekday")]
  EmptyRecurrence,

  #[error("unknown weekday: {0:?}")]
  UnknownDay(String),

  #[error("unknown attendance status: {0:?}")]
  UnknownStatus(String),

  #[error("alert threshold {0} must be at least 1")]
  ZeroThreshold(&'static str),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("attendance record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("profile not found: {0}")]
  ProfileNotFound(String),

  /// A persistence collaborator call failed. Nothing is retried.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error raised by an [`AttendanceStore`] call.
  ///
  /// [`AttendanceStore`]: crate::store::AttendanceStore
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  /// `true` for input that was rejected before any write took place.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::EmptyName
        | Self::EmptyRecurrence
        | Self::UnknownDay(_)
        | Self::UnknownStatus(_)
        | Self::ZeroThreshold(_)
    )
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::SubjectNotFound(_)
        | Self::RecordNotFound(_)
        | Self::NotificationNotFound(_)
        | Self::ProfileNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
