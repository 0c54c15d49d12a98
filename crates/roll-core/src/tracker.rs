//! `Tracker`: the operations the UI shell calls, generic over any
//! [`AttendanceStore`].
//!
//! Every operation takes its context (owner, subject, date) as arguments and
//! mutating operations report what they changed in a [`ChangeSet`]. Failures
//! are terminal for the operation; nothing is retried.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  alert::{self, AlertThresholds},
  attendance::{AttendanceEntry, AttendanceQuery, AttendanceRecord, Origin, Status, Upserted},
  change::{Change, ChangeSet},
  identity::{DEFAULT_DISPLAY_NAME, Identity, Owner, Profile, ProfilePatch},
  notification::{NewNotification, Notification},
  report::{self, DailySnapshot, Report},
  schedule::{self, Day, Direction, Recurrence},
  store::AttendanceStore,
  subject::{NewSubject, Subject, SubjectPatch},
};

/// How many records [`Tracker::recent_attendance`] returns by default.
pub const RECENT_ATTENDANCE_LIMIT: usize = 5;

/// How many notifications [`Tracker::notifications`] returns by default.
pub const NOTIFICATION_LIMIT: usize = 10;

// ─── Outcome types ───────────────────────────────────────────────────────────

/// The result of a mutating operation plus what it changed.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
  pub value:   T,
  pub changes: ChangeSet,
}

impl<T> Outcome<T> {
  fn new(value: T, changes: impl Into<ChangeSet>) -> Self {
    Self { value, changes: changes.into() }
  }
}

/// Result of [`Tracker::save_attendance`].
#[derive(Debug, Clone, Serialize)]
pub struct SavedAttendance {
  pub record:        AttendanceRecord,
  pub upserted:      Upserted,
  /// Notifications raised by this save.
  pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoMarkFailure {
  pub subject_id: Uuid,
  pub error:      String,
}

/// Result of one auto-marking pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoMarkReport {
  pub date:             Option<NaiveDate>,
  /// Subjects that received a fresh `present` record.
  pub marked:           Vec<Uuid>,
  /// Scheduled subjects that already had a record for the day.
  pub already_recorded: Vec<Uuid>,
  pub failed:           Vec<AutoMarkFailure>,
}

/// Result of [`Tracker::sign_in`].
#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
  pub profile:   Profile,
  pub auto_mark: AutoMarkReport,
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Attendance operations over a store.
///
/// Cloning is as cheap as cloning the store.
#[derive(Debug, Clone)]
pub struct Tracker<S> {
  store:      S,
  thresholds: AlertThresholds,
}

impl<S: AttendanceStore> Tracker<S> {
  pub fn new(store: S) -> Self { Self { store, thresholds: AlertThresholds::default() } }

  pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn thresholds(&self) -> &AlertThresholds { &self.thresholds }

  // ── Subjects ──────────────────────────────────────────────────────────────

  pub async fn create_subject(
    &self,
    owner: &Owner,
    name: &str,
    recurrence: Recurrence,
  ) -> Result<Outcome<Subject>> {
    let input = NewSubject::new(owner.clone(), name, recurrence)?;
    let subject = self.store.add_subject(input).await.map_err(Error::store)?;
    debug!(%owner, subject_id = %subject.subject_id, "subject created");
    let change = Change::SubjectCreated { subject_id: subject.subject_id };
    Ok(Outcome::new(subject, change))
  }

  pub async fn edit_subject(
    &self,
    owner: &Owner,
    id: Uuid,
    name: Option<&str>,
    recurrence: Option<Recurrence>,
  ) -> Result<Outcome<Subject>> {
    let patch = SubjectPatch::new(name, recurrence)?;
    let subject = self
      .store
      .update_subject(owner.clone(), id, patch)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SubjectNotFound(id))?;
    Ok(Outcome::new(subject, Change::SubjectUpdated { subject_id: id }))
  }

  /// Delete a subject and, in the same atomic step, all its records.
  /// The value is the number of attendance records removed.
  pub async fn delete_subject(&self, owner: &Owner, id: Uuid) -> Result<Outcome<usize>> {
    let removed = self
      .store
      .delete_subject(owner.clone(), id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SubjectNotFound(id))?;
    info!(%owner, subject_id = %id, records_removed = removed, "subject deleted");
    let change = Change::SubjectDeleted { subject_id: id, records_removed: removed };
    Ok(Outcome::new(removed, change))
  }

  pub async fn get_subject(&self, owner: &Owner, id: Uuid) -> Result<Subject> {
    self
      .store
      .get_subject(owner.clone(), id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SubjectNotFound(id))
  }

  /// The owner's subjects.
  ///
  /// If the owner-scoped query fails, falls back to an unscoped read filtered
  /// here. Read paths only.
  pub async fn list_subjects(&self, owner: &Owner) -> Result<Vec<Subject>> {
    match self.store.list_subjects(owner.clone()).await {
      Ok(subjects) => Ok(subjects),
      Err(err) => {
        warn!(%owner, error = %err, "scoped subject query failed, using unscoped fallback");
        let all = self.store.list_all_subjects().await.map_err(Error::store)?;
        Ok(all.into_iter().filter(|s| &s.owner == owner).collect())
      }
    }
  }

  /// Subjects meeting on `day`.
  pub async fn subjects_on(&self, owner: &Owner, day: Day) -> Result<Vec<Subject>> {
    let mut subjects = self.list_subjects(owner).await?;
    subjects.retain(|s| s.recurrence.contains(day));
    Ok(subjects)
  }

  // ── Scheduling ────────────────────────────────────────────────────────────

  /// The meeting date of `subject_id` closest to `from`.
  pub async fn nearest_date(
    &self,
    owner: &Owner,
    subject_id: Uuid,
    from: NaiveDate,
  ) -> Result<NaiveDate> {
    let subject = self.get_subject(owner, subject_id).await?;
    Ok(schedule::nearest_valid_date(from, &subject.recurrence))
  }

  /// The next or previous meeting date of `subject_id` from `from`.
  pub async fn step_date(
    &self,
    owner: &Owner,
    subject_id: Uuid,
    from: NaiveDate,
    direction: Direction,
  ) -> Result<NaiveDate> {
    let subject = self.get_subject(owner, subject_id).await?;
    Ok(schedule::step(from, &subject.recurrence, direction))
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  /// The latest records for one subject, newest first.
  pub async fn recent_attendance(
    &self,
    owner: &Owner,
    subject_id: Uuid,
    limit: Option<usize>,
  ) -> Result<Vec<AttendanceRecord>> {
    let query = AttendanceQuery::for_subject(subject_id)
      .limit(limit.unwrap_or(RECENT_ATTENDANCE_LIMIT));
    self.attendance(owner, query).await
  }

  pub async fn attendance(
    &self,
    owner: &Owner,
    query: AttendanceQuery,
  ) -> Result<Vec<AttendanceRecord>> {
    self
      .store
      .list_attendance(owner.clone(), query)
      .await
      .map_err(Error::store)
  }

  /// Record `status` for a subject on `date`, then re-evaluate its alerts.
  ///
  /// The write goes through the store's upsert, so re-saving a date changes
  /// the existing record. If alert evaluation fails the save still stands;
  /// neither the latch nor any notification is written, so the next save
  /// retries the evaluation.
  pub async fn save_attendance(
    &self,
    owner: &Owner,
    subject_id: Uuid,
    date: NaiveDate,
    status: Status,
  ) -> Result<Outcome<SavedAttendance>> {
    let subject = self.get_subject(owner, subject_id).await?;

    let entry = AttendanceEntry {
      owner: owner.clone(),
      subject_id,
      date,
      status,
      origin: Origin::User,
    };
    let (record, upserted) = self.store.upsert_attendance(entry).await.map_err(Error::store)?;
    debug!(%owner, %subject_id, %date, status = status.as_str(), ?upserted, "attendance saved");

    let mut changes = ChangeSet::from(Change::AttendanceChanged { subject_id, date });
    let notifications = match self.check_alerts(owner, &subject).await {
      Ok(notifications) => notifications,
      Err(err) => {
        warn!(%owner, %subject_id, error = %err, "alert evaluation failed");
        Vec::new()
      }
    };
    if !notifications.is_empty() {
      changes.push(Change::NotificationsChanged);
    }

    Ok(Outcome { value: SavedAttendance { record, upserted, notifications }, changes })
  }

  /// Recount a subject's history and persist any alerts it newly crosses.
  pub async fn check_alerts(&self, owner: &Owner, subject: &Subject) -> Result<Vec<Notification>> {
    let id = subject.subject_id;
    let counts = self.store.count_statuses(owner.clone(), id).await.map_err(Error::store)?;
    let before = self.store.get_alert_state(owner.clone(), id).await.map_err(Error::store)?;

    let eval = alert::evaluate(&subject.name, counts, before, &self.thresholds);
    if !eval.changed(before) {
      return Ok(Vec::new());
    }

    let inputs = eval
      .alerts
      .into_iter()
      .map(|a| NewNotification {
        owner:      owner.clone(),
        subject_id: Some(id),
        title:      a.title,
        message:    a.message,
        severity:   a.severity,
      })
      .collect();
    let created = self
      .store
      .raise_alerts(owner.clone(), id, eval.state, inputs)
      .await
      .map_err(Error::store)?;
    for n in &created {
      info!(%owner, subject_id = %id, severity = n.severity.as_str(), "attendance alert raised");
    }
    Ok(created)
  }

  pub async fn delete_attendance(
    &self,
    owner: &Owner,
    record_id: Uuid,
  ) -> Result<Outcome<AttendanceRecord>> {
    let record = self
      .store
      .delete_attendance(owner.clone(), record_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RecordNotFound(record_id))?;
    let change = Change::AttendanceChanged { subject_id: record.subject_id, date: record.date };
    Ok(Outcome::new(record, change))
  }

  /// Insert a `present` auto-marked record unless one exists for the key.
  pub async fn auto_mark_if_absent(
    &self,
    owner: &Owner,
    subject_id: Uuid,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let entry = AttendanceEntry {
      owner: owner.clone(),
      subject_id,
      date,
      status: Status::Present,
      origin: Origin::Auto,
    };
    self
      .store
      .insert_attendance_if_absent(entry)
      .await
      .map_err(Error::store)
  }

  /// Auto-mark every subject scheduled on `today`.
  ///
  /// Safe to re-run. A failure on one subject is logged and recorded in the
  /// report; the remaining subjects are still processed.
  pub async fn run_auto_mark(
    &self,
    owner: &Owner,
    today: NaiveDate,
  ) -> Result<Outcome<AutoMarkReport>> {
    let subjects = self
      .store
      .list_subjects(owner.clone())
      .await
      .map_err(Error::store)?;

    let mut report = AutoMarkReport { date: Some(today), ..Default::default() };
    let mut changes = ChangeSet::new();

    for subject in subjects.iter().filter(|s| schedule::is_valid_day(today, &s.recurrence)) {
      let id = subject.subject_id;
      match self.auto_mark_if_absent(owner, id, today).await {
        Ok(Some(_)) => {
          report.marked.push(id);
          changes.push(Change::AttendanceChanged { subject_id: id, date: today });
        }
        Ok(None) => report.already_recorded.push(id),
        Err(err) => {
          warn!(%owner, subject_id = %id, error = %err, "auto-mark failed for subject");
          report.failed.push(AutoMarkFailure { subject_id: id, error: err.to_string() });
        }
      }
    }

    info!(
      %owner,
      %today,
      marked = report.marked.len(),
      already_recorded = report.already_recorded.len(),
      failed = report.failed.len(),
      "auto-mark pass complete"
    );
    Ok(Outcome { value: report, changes })
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  pub async fn report(&self, owner: &Owner, today: NaiveDate) -> Result<Report> {
    let subjects = self.list_subjects(owner).await?;
    let records = self.attendance(owner, AttendanceQuery::default()).await?;
    Ok(report::build_report(today, &subjects, &records))
  }

  pub async fn today_snapshot(&self, owner: &Owner, today: NaiveDate) -> Result<DailySnapshot> {
    let subjects = self.list_subjects(owner).await?;
    let records = self.attendance(owner, AttendanceQuery::on(today)).await?;
    Ok(report::daily_snapshot(today, subjects.len(), &records))
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  pub async fn notifications(
    &self,
    owner: &Owner,
    unread_only: bool,
    limit: Option<usize>,
  ) -> Result<Vec<Notification>> {
    self
      .store
      .list_notifications(owner.clone(), unread_only, Some(limit.unwrap_or(NOTIFICATION_LIMIT)))
      .await
      .map_err(Error::store)
  }

  pub async fn mark_notification_read(&self, owner: &Owner, id: Uuid) -> Result<Outcome<()>> {
    let found = self
      .store
      .mark_notification_read(owner.clone(), id)
      .await
      .map_err(Error::store)?;
    if !found {
      return Err(Error::NotificationNotFound(id));
    }
    Ok(Outcome::new((), Change::NotificationsChanged))
  }

  pub async fn delete_notification(&self, owner: &Owner, id: Uuid) -> Result<Outcome<()>> {
    let found = self
      .store
      .delete_notification(owner.clone(), id)
      .await
      .map_err(Error::store)?;
    if !found {
      return Err(Error::NotificationNotFound(id));
    }
    Ok(Outcome::new((), Change::NotificationsChanged))
  }

  // ── Profile and session ───────────────────────────────────────────────────

  pub async fn profile(&self, owner: &Owner) -> Result<Profile> {
    self
      .store
      .get_profile(owner.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::ProfileNotFound(owner.to_string()))
  }

  pub async fn update_profile(
    &self,
    owner: &Owner,
    mut patch: ProfilePatch,
  ) -> Result<Outcome<Profile>> {
    if let Some(name) = patch.display_name.take() {
      let name = name.trim();
      if name.is_empty() {
        return Err(Error::EmptyName);
      }
      patch.display_name = Some(name.to_owned());
    }
    let profile = self
      .store
      .update_profile(owner.clone(), patch)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::ProfileNotFound(owner.to_string()))?;
    Ok(Outcome::new(profile, Change::ProfileChanged))
  }

  /// Handle a sign-in transition: make sure a profile exists, then run the
  /// auto-marking pass for `today`.
  pub async fn sign_in(&self, identity: &Identity, today: NaiveDate) -> Result<Outcome<SignIn>> {
    let owner = &identity.owner;
    let display_name = identity
      .display_name
      .clone()
      .filter(|n| !n.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_owned());

    let profile = self
      .store
      .ensure_profile(owner.clone(), display_name, identity.email.clone())
      .await
      .map_err(Error::store)?;
    info!(%owner, "signed in");

    let Outcome { value: auto_mark, changes } = self.run_auto_mark(owner, today).await?;
    Ok(Outcome { value: SignIn { profile, auto_mark }, changes })
  }

  /// Handle a sign-out transition. The core holds no session state.
  pub fn sign_out(&self, owner: &Owner) {
    info!(%owner, "signed out");
  }
}
