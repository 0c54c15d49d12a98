//! The `AttendanceStore` trait: the persistence collaborator.
//!
//! The trait is implemented by storage backends (e.g. `roll-store-sqlite`).
//! Higher layers (`roll-api`, `roll-server`) go through
//! [`Tracker`](crate::tracker::Tracker), which depends on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  alert::AlertState,
  attendance::{AttendanceEntry, AttendanceQuery, AttendanceRecord, StatusCounts, Upserted},
  identity::{Owner, Profile, ProfilePatch},
  notification::{NewNotification, Notification},
  subject::{NewSubject, Subject, SubjectPatch},
};

/// Abstraction over a Roll store backend.
///
/// Every read and write except [`list_all_subjects`](Self::list_all_subjects)
/// is scoped to one [`Owner`]; rows belonging to other owners behave as if
/// they did not exist.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Persist a new subject. `created_at` is set by the store.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All subjects of `owner`, oldest first.
  fn list_subjects(
    &self,
    owner: Owner,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Every subject regardless of owner. Only for degraded reads; callers must
  /// filter the result themselves and never write based on it.
  fn list_all_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Apply `patch` and bump `updated_at`. Returns `None` if not found.
  fn update_subject(
    &self,
    owner: Owner,
    id: Uuid,
    patch: SubjectPatch,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Delete a subject together with all of its attendance records and alert
  /// state, atomically. Returns the number of attendance records removed, or
  /// `None` if the subject does not exist (nothing is deleted).
  fn delete_subject(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<usize>, Self::Error>> + Send + '_;

  // ── Attendance ────────────────────────────────────────────────────────

  /// Write `entry` keyed by `(owner, subject_id, date)`.
  ///
  /// An existing record gets the new status and a fresh `updated_at`; its
  /// origin is kept. Otherwise a record is inserted with `entry.origin`.
  ///
  /// Backends without a keyed upsert may implement this as query-then-write,
  /// in which case two racing calls for one key can both insert.
  fn upsert_attendance(
    &self,
    entry: AttendanceEntry,
  ) -> impl Future<Output = Result<(AttendanceRecord, Upserted), Self::Error>> + Send + '_;

  /// Insert `entry` only if no record exists for its key. Never overwrites;
  /// returns `None` when a record was already there.
  fn insert_attendance_if_absent(
    &self,
    entry: AttendanceEntry,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  fn get_attendance(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  fn find_attendance(
    &self,
    owner: Owner,
    subject_id: Uuid,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Records of `owner` matching `query`, newest date first.
  fn list_attendance(
    &self,
    owner: Owner,
    query: AttendanceQuery,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Delete one record, returning it. `None` if not found.
  fn delete_attendance(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Per-status totals over every record of one subject.
  fn count_statuses(
    &self,
    owner: Owner,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<StatusCounts, Self::Error>> + Send + '_;

  // ── Alert state ───────────────────────────────────────────────────────

  /// The latch for one subject; the default state if none is stored.
  fn get_alert_state(
    &self,
    owner: Owner,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<AlertState, Self::Error>> + Send + '_;

  /// Persist the notifications an evaluation raised together with the latch
  /// that records them, in one atomic write. On error nothing is stored.
  fn raise_alerts(
    &self,
    owner: Owner,
    subject_id: Uuid,
    state: AlertState,
    alerts: Vec<NewNotification>,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Newest first.
  fn list_notifications(
    &self,
    owner: Owner,
    unread_only: bool,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Returns `false` if the notification does not exist.
  fn mark_notification_read(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if the notification does not exist.
  fn delete_notification(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  fn get_profile(
    &self,
    owner: Owner,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Return the stored profile, creating it from the given fields first if
  /// the owner has none. Existing profiles are never modified.
  fn ensure_profile(
    &self,
    owner: Owner,
    display_name: String,
    email: Option<String>,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn update_profile(
    &self,
    owner: Owner,
    patch: ProfilePatch,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;
}
