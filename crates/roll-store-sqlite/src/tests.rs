//! Integration tests for `SqliteStore` and `Tracker` against an in-memory
//! database.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use roll_core::{
  alert::AlertState,
  attendance::{
    AttendanceEntry, AttendanceQuery, AttendanceRecord, Origin, Status, StatusCounts, Upserted,
  },
  change::Change,
  identity::{Identity, Owner, Profile, ProfilePatch},
  notification::{NewNotification, Notification, Severity},
  schedule::{Day, Direction, Recurrence},
  store::AttendanceStore,
  subject::{NewSubject, Subject, SubjectPatch},
  tracker::Tracker,
};
use uuid::Uuid;

use crate::{Error, Result, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn owner() -> Owner { Owner::new("alice") }

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

/// 2024-06-03 is a Monday.
fn monday() -> NaiveDate { date(2024, 6, 3) }

fn days(names: &[&str]) -> Recurrence { Recurrence::parse(names).unwrap() }

async fn add_subject(s: &SqliteStore, owner: &Owner, name: &str, on: &[&str]) -> Subject {
  let input = NewSubject::new(owner.clone(), name, days(on)).unwrap();
  s.add_subject(input).await.unwrap()
}

fn entry(owner: &Owner, subject_id: Uuid, date: NaiveDate, status: Status) -> AttendanceEntry {
  AttendanceEntry { owner: owner.clone(), subject_id, date, status, origin: Origin::User }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_subject() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday", "wednesday"]).await;

  let fetched = s.get_subject(owner(), subject.subject_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Physics");
  assert_eq!(fetched.recurrence, days(&["wednesday", "monday"]));
  assert_eq!(fetched.created_at, subject.created_at);
  assert!(fetched.updated_at.is_none());
}

#[tokio::test]
async fn subjects_are_scoped_to_their_owner() {
  let s = store().await;
  let bob = Owner::new("bob");
  let mine = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  add_subject(&s, &bob, "History", &["friday"]).await;

  assert!(s.get_subject(bob.clone(), mine.subject_id).await.unwrap().is_none());
  assert_eq!(s.list_subjects(owner()).await.unwrap().len(), 1);
  assert_eq!(s.list_subjects(bob).await.unwrap().len(), 1);
  assert_eq!(s.list_all_subjects().await.unwrap().len(), 2);
}

#[tokio::test]
async fn list_subjects_oldest_first() {
  let s = store().await;
  for name in ["A", "B", "C"] {
    add_subject(&s, &owner(), name, &["monday"]).await;
  }
  let names: Vec<_> = s
    .list_subjects(owner())
    .await
    .unwrap()
    .into_iter()
    .map(|s| s.name)
    .collect();
  assert_eq!(names, ["A", "B", "C"]);
}

#[tokio::test]
async fn update_subject_patches_only_given_fields() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;

  let patch = SubjectPatch::new(None, Some(days(&["tuesday", "thursday"]))).unwrap();
  let updated = s
    .update_subject(owner(), subject.subject_id, patch)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.name, "Physics");
  assert!(updated.recurrence.contains(Day::Thursday));
  assert!(!updated.recurrence.contains(Day::Monday));
  assert!(updated.updated_at.is_some());

  let patch = SubjectPatch::new(Some("Chemistry"), None).unwrap();
  let missing = s.update_subject(owner(), Uuid::new_v4(), patch).await.unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn delete_subject_cascades_to_attendance_and_alert_state() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let other = add_subject(&s, &owner(), "Maths", &["monday"]).await;
  let id = subject.subject_id;

  for d in [3, 10, 17] {
    s.upsert_attendance(entry(&owner(), id, date(2024, 6, d), Status::Absent))
      .await
      .unwrap();
  }
  s.upsert_attendance(entry(&owner(), other.subject_id, monday(), Status::Present))
    .await
    .unwrap();
  let latched = AlertState { warning_sent: true, critical_sent: false };
  s.raise_alerts(owner(), id, latched, Vec::new()).await.unwrap();

  let removed = s.delete_subject(owner(), id).await.unwrap();
  assert_eq!(removed, Some(3));

  assert!(s.get_subject(owner(), id).await.unwrap().is_none());
  let left = s.list_attendance(owner(), AttendanceQuery::default()).await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].subject_id, other.subject_id);
  assert_eq!(s.get_alert_state(owner(), id).await.unwrap(), AlertState::default());
}

#[tokio::test]
async fn delete_subject_missing_or_foreign_deletes_nothing() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  s.upsert_attendance(entry(&owner(), subject.subject_id, monday(), Status::Late))
    .await
    .unwrap();

  assert_eq!(s.delete_subject(owner(), Uuid::new_v4()).await.unwrap(), None);
  assert_eq!(s.delete_subject(Owner::new("bob"), subject.subject_id).await.unwrap(), None);

  let records = s.list_attendance(owner(), AttendanceQuery::default()).await.unwrap();
  assert_eq!(records.len(), 1);
}

// ─── Attendance ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_then_updates_same_key() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let id = subject.subject_id;

  let (first, how) = s
    .upsert_attendance(entry(&owner(), id, monday(), Status::Present))
    .await
    .unwrap();
  assert_eq!(how, Upserted::Inserted);
  assert!(first.updated_at.is_none());

  let (second, how) = s
    .upsert_attendance(entry(&owner(), id, monday(), Status::Absent))
    .await
    .unwrap();
  assert_eq!(how, Upserted::Updated);
  assert_eq!(second.record_id, first.record_id);
  assert_eq!(second.status, Status::Absent);
  assert_eq!(second.created_at, first.created_at);
  assert!(second.updated_at.is_some());

  let all = s.list_attendance(owner(), AttendanceQuery::for_subject(id)).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn upsert_keeps_the_first_origin() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let id = subject.subject_id;

  let auto = AttendanceEntry {
    origin: Origin::Auto,
    ..entry(&owner(), id, monday(), Status::Present)
  };
  s.insert_attendance_if_absent(auto).await.unwrap().unwrap();

  let (record, how) = s
    .upsert_attendance(entry(&owner(), id, monday(), Status::Late))
    .await
    .unwrap();
  assert_eq!(how, Upserted::Updated);
  assert_eq!(record.status, Status::Late);
  assert_eq!(record.origin, Origin::Auto);
}

#[tokio::test]
async fn insert_if_absent_never_overwrites() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let id = subject.subject_id;

  s.upsert_attendance(entry(&owner(), id, monday(), Status::Absent))
    .await
    .unwrap();

  let auto = AttendanceEntry {
    origin: Origin::Auto,
    ..entry(&owner(), id, monday(), Status::Present)
  };
  assert!(s.insert_attendance_if_absent(auto).await.unwrap().is_none());

  let record = s.find_attendance(owner(), id, monday()).await.unwrap().unwrap();
  assert_eq!(record.status, Status::Absent);
  assert_eq!(record.origin, Origin::User);
}

#[tokio::test]
async fn attendance_requires_an_existing_subject() {
  let s = store().await;
  let result = s
    .upsert_attendance(entry(&owner(), Uuid::new_v4(), monday(), Status::Present))
    .await;
  assert!(matches!(result, Err(Error::Database(_))));
}

#[tokio::test]
async fn list_attendance_filters_and_orders_newest_first() {
  let s = store().await;
  let physics = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let maths = add_subject(&s, &owner(), "Maths", &["monday"]).await;

  for d in [3, 10, 17, 24] {
    s.upsert_attendance(entry(&owner(), physics.subject_id, date(2024, 6, d), Status::Present))
      .await
      .unwrap();
  }
  s.upsert_attendance(entry(&owner(), maths.subject_id, date(2024, 6, 10), Status::Late))
    .await
    .unwrap();

  let physics_only = s
    .list_attendance(owner(), AttendanceQuery::for_subject(physics.subject_id))
    .await
    .unwrap();
  let dates: Vec<_> = physics_only.iter().map(|r| r.date.to_string()).collect();
  assert_eq!(dates, ["2024-06-24", "2024-06-17", "2024-06-10", "2024-06-03"]);

  let limited = s
    .list_attendance(owner(), AttendanceQuery::for_subject(physics.subject_id).limit(2))
    .await
    .unwrap();
  assert_eq!(limited.len(), 2);
  assert_eq!(limited[0].date, date(2024, 6, 24));

  let on_day = s
    .list_attendance(owner(), AttendanceQuery::on(date(2024, 6, 10)))
    .await
    .unwrap();
  assert_eq!(on_day.len(), 2);

  let since = s
    .list_attendance(owner(), AttendanceQuery::since(date(2024, 6, 17)))
    .await
    .unwrap();
  assert_eq!(since.len(), 2);

  let foreign = s
    .list_attendance(Owner::new("bob"), AttendanceQuery::default())
    .await
    .unwrap();
  assert!(foreign.is_empty());
}

#[tokio::test]
async fn delete_attendance_returns_the_record() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let (record, _) = s
    .upsert_attendance(entry(&owner(), subject.subject_id, monday(), Status::Late))
    .await
    .unwrap();

  assert!(s.delete_attendance(Owner::new("bob"), record.record_id).await.unwrap().is_none());
  let deleted = s.delete_attendance(owner(), record.record_id).await.unwrap().unwrap();
  assert_eq!(deleted.record_id, record.record_id);
  assert!(s.get_attendance(owner(), record.record_id).await.unwrap().is_none());
}

#[tokio::test]
async fn count_statuses_groups_by_status() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let id = subject.subject_id;
  let statuses = [Status::Absent, Status::Absent, Status::Late, Status::Present, Status::Permission];
  for (i, status) in statuses.into_iter().enumerate() {
    s.upsert_attendance(entry(&owner(), id, date(2024, 6, 1 + i as u32), status))
      .await
      .unwrap();
  }

  let counts = s.count_statuses(owner(), id).await.unwrap();
  assert_eq!(counts.absent, 2);
  assert_eq!(counts.late, 1);
  assert_eq!(counts.present, 1);
  assert_eq!(counts.permission, 1);
  assert_eq!(counts.misses(), 3);
}

// ─── Notifications and profiles ──────────────────────────────────────────────

fn note(owner: &Owner, subject_id: Uuid, title: &str) -> NewNotification {
  NewNotification {
    owner:      owner.clone(),
    subject_id: Some(subject_id),
    title:      title.to_owned(),
    message:    "m".to_owned(),
    severity:   Severity::Warning,
  }
}

async fn raise(s: &SqliteStore, owner: &Owner, subject_id: Uuid, title: &str) -> Notification {
  let alerts = vec![note(owner, subject_id, title)];
  let mut raised = s
    .raise_alerts(owner.clone(), subject_id, AlertState::default(), alerts)
    .await
    .unwrap();
  raised.remove(0)
}

#[tokio::test]
async fn notifications_newest_first_with_unread_filter() {
  let s = store().await;
  let mine = add_subject(&s, &owner(), "Physics", &["monday"]).await.subject_id;
  let theirs = add_subject(&s, &Owner::new("bob"), "History", &["monday"]).await.subject_id;

  let first = raise(&s, &owner(), mine, "first").await;
  raise(&s, &owner(), mine, "second").await;
  raise(&s, &Owner::new("bob"), theirs, "theirs").await;

  let all = s.list_notifications(owner(), false, None).await.unwrap();
  let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
  assert_eq!(titles, ["second", "first"]);

  assert!(s.mark_notification_read(owner(), first.notification_id).await.unwrap());
  let unread = s.list_notifications(owner(), true, None).await.unwrap();
  assert_eq!(unread.len(), 1);
  assert_eq!(unread[0].title, "second");

  assert_eq!(s.list_notifications(owner(), false, Some(1)).await.unwrap().len(), 1);
  assert_eq!(s.list_notifications(owner(), false, Some(usize::MAX)).await.unwrap().len(), 2);

  assert!(s.delete_notification(owner(), first.notification_id).await.unwrap());
  assert!(!s.delete_notification(owner(), first.notification_id).await.unwrap());
}

#[tokio::test]
async fn raise_alerts_stores_notifications_and_latch_together() {
  let s = store().await;
  let id = add_subject(&s, &owner(), "Physics", &["monday"]).await.subject_id;
  let latched = AlertState { warning_sent: true, critical_sent: true };

  let raised = s
    .raise_alerts(owner(), id, latched, vec![note(&owner(), id, "w"), note(&owner(), id, "c")])
    .await
    .unwrap();
  assert_eq!(raised.len(), 2);
  assert!(raised.iter().all(|n| !n.read && n.subject_id == Some(id)));

  assert_eq!(s.get_alert_state(owner(), id).await.unwrap(), latched);
  assert_eq!(s.list_notifications(owner(), false, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn raise_alerts_rolls_back_notifications_when_the_latch_write_fails() {
  let s = store().await;
  // No such subject: the latch row violates its foreign key after the
  // notification insert has already run inside the transaction.
  let missing = Uuid::new_v4();
  let latched = AlertState { warning_sent: true, critical_sent: false };

  let err = s
    .raise_alerts(owner(), missing, latched, vec![note(&owner(), missing, "w")])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  assert!(s.list_notifications(owner(), false, None).await.unwrap().is_empty());
  assert_eq!(s.get_alert_state(owner(), missing).await.unwrap(), AlertState::default());
}

#[tokio::test]
async fn ensure_profile_never_overwrites() {
  let s = store().await;
  let created = s
    .ensure_profile(owner(), "Alice".to_owned(), Some("a@example.com".to_owned()))
    .await
    .unwrap();
  assert_eq!(created.display_name, "Alice");

  let again = s.ensure_profile(owner(), "Someone Else".to_owned(), None).await.unwrap();
  assert_eq!(again.display_name, "Alice");
  assert_eq!(again.email.as_deref(), Some("a@example.com"));

  let patch = ProfilePatch { display_name: Some("Alice B".to_owned()), email: None };
  let updated = s.update_profile(owner(), patch).await.unwrap().unwrap();
  assert_eq!(updated.display_name, "Alice B");
  assert_eq!(updated.email.as_deref(), Some("a@example.com"));

  let missing = s.update_profile(Owner::new("bob"), ProfilePatch::default()).await.unwrap();
  assert!(missing.is_none());
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

async fn tracker() -> Tracker<SqliteStore> { Tracker::new(store().await) }

#[tokio::test]
async fn tracker_rejects_invalid_subjects() {
  let t = tracker().await;
  let err = t.create_subject(&owner(), "   ", days(&["monday"])).await.unwrap_err();
  assert!(err.is_validation());
}

#[tokio::test]
async fn saving_twice_updates_one_record() {
  let t = tracker().await;
  let subject = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;
  let id = subject.subject_id;

  let first = t.save_attendance(&owner(), id, monday(), Status::Present).await.unwrap();
  assert_eq!(first.value.upserted, Upserted::Inserted);
  let second = t.save_attendance(&owner(), id, monday(), Status::Late).await.unwrap();
  assert_eq!(second.value.upserted, Upserted::Updated);
  assert_eq!(second.value.record.record_id, first.value.record.record_id);
  let changed: Vec<_> = second.changes.iter().cloned().collect();
  assert_eq!(changed, [Change::AttendanceChanged { subject_id: id, date: monday() }]);

  let records = t.recent_attendance(&owner(), id, None).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].status, Status::Late);
}

#[tokio::test]
async fn save_for_unknown_subject_is_not_found() {
  let t = tracker().await;
  let err = t
    .save_attendance(&owner(), Uuid::new_v4(), monday(), Status::Present)
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn alerts_fire_once_per_threshold() {
  let t = tracker().await;
  let subject = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;
  let id = subject.subject_id;

  let saved = t.save_attendance(&owner(), id, date(2024, 6, 3), Status::Absent).await.unwrap();
  assert!(saved.value.notifications.is_empty());

  let saved = t.save_attendance(&owner(), id, date(2024, 6, 10), Status::Absent).await.unwrap();
  let raised: Vec<_> = saved.value.notifications.iter().map(|n| n.severity).collect();
  assert_eq!(raised, [Severity::Warning]);
  assert_eq!(
    saved.value.notifications[0].message,
    "You have 2 absences in Physics. Please improve your attendance."
  );
  assert!(saved.changes.iter().any(|c| *c == Change::NotificationsChanged));

  // Re-saving the same date does not re-announce the warning.
  let saved = t.save_attendance(&owner(), id, date(2024, 6, 10), Status::Absent).await.unwrap();
  assert!(saved.value.notifications.is_empty());

  let saved = t.save_attendance(&owner(), id, date(2024, 6, 17), Status::Late).await.unwrap();
  let critical: Vec<&Notification> = saved.value.notifications.iter().collect();
  assert_eq!(critical.len(), 1);
  assert_eq!(critical[0].severity, Severity::Critical);
  assert_eq!(critical[0].title, "Critical Attendance Alert");
  assert_eq!(
    critical[0].message,
    "You have 2 absences and 1 late arrivals in Physics. Immediate attention required."
  );

  let saved = t.save_attendance(&owner(), id, date(2024, 6, 24), Status::Absent).await.unwrap();
  assert!(saved.value.notifications.is_empty());

  let all = t.notifications(&owner(), false, None).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].severity, Severity::Critical);
}

#[tokio::test]
async fn both_alerts_can_fire_on_one_save() {
  let t = tracker().await;
  let subject = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;
  let id = subject.subject_id;

  t.save_attendance(&owner(), id, date(2024, 6, 3), Status::Late).await.unwrap();
  t.save_attendance(&owner(), id, date(2024, 6, 10), Status::Late).await.unwrap();
  let saved = t.save_attendance(&owner(), id, date(2024, 6, 17), Status::Absent).await.unwrap();
  let raised: Vec<_> = saved.value.notifications.iter().map(|n| n.severity).collect();
  assert_eq!(raised, [Severity::Critical]);

  let saved = t.save_attendance(&owner(), id, date(2024, 6, 24), Status::Absent).await.unwrap();
  let raised: Vec<_> = saved.value.notifications.iter().map(|n| n.severity).collect();
  assert_eq!(raised, [Severity::Warning]);
}

#[tokio::test]
async fn deleting_a_subject_keeps_notifications_and_resets_the_latch() {
  let t = tracker().await;
  let subject = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;
  let id = subject.subject_id;
  for d in [3, 10] {
    t.save_attendance(&owner(), id, date(2024, 6, d), Status::Absent).await.unwrap();
  }

  let deleted = t.delete_subject(&owner(), id).await.unwrap();
  assert_eq!(deleted.value, 2);
  assert!(
    deleted
      .changes
      .iter()
      .any(|c| *c == Change::SubjectDeleted { subject_id: id, records_removed: 2 })
  );

  let err = t.get_subject(&owner(), id).await.unwrap_err();
  assert!(err.is_not_found());
  assert_eq!(t.notifications(&owner(), false, None).await.unwrap().len(), 1);
  assert_eq!(
    t.store().get_alert_state(owner(), id).await.unwrap(),
    AlertState::default()
  );
}

#[tokio::test]
async fn scheduling_operations_use_the_subject_recurrence() {
  let t = tracker().await;
  let subject = t
    .create_subject(&owner(), "Physics", days(&["monday", "thursday"]))
    .await
    .unwrap()
    .value;
  let id = subject.subject_id;

  let tuesday = date(2024, 6, 4);
  let wednesday = date(2024, 6, 5);
  assert_eq!(t.nearest_date(&owner(), id, tuesday).await.unwrap(), monday());
  assert_eq!(t.nearest_date(&owner(), id, wednesday).await.unwrap(), date(2024, 6, 6));
  assert_eq!(t.nearest_date(&owner(), id, monday()).await.unwrap(), monday());

  let next = t.step_date(&owner(), id, monday(), Direction::Forward).await.unwrap();
  assert_eq!(next, date(2024, 6, 6));
  let prev = t.step_date(&owner(), id, monday(), Direction::Backward).await.unwrap();
  assert_eq!(prev, date(2024, 5, 30));

  let on_thursday = t.subjects_on(&owner(), Day::Thursday).await.unwrap();
  assert_eq!(on_thursday.len(), 1);
  assert!(t.subjects_on(&owner(), Day::Friday).await.unwrap().is_empty());
}

#[tokio::test]
async fn auto_mark_is_idempotent_and_respects_existing_records() {
  let t = tracker().await;
  let physics = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;
  let maths = t.create_subject(&owner(), "Maths", days(&["monday"])).await.unwrap().value;
  // Meets on Tuesdays only; never marked on a Monday.
  t.create_subject(&owner(), "History", days(&["tuesday"])).await.unwrap();

  t.save_attendance(&owner(), maths.subject_id, monday(), Status::Absent)
    .await
    .unwrap();

  let run = t.run_auto_mark(&owner(), monday()).await.unwrap();
  assert_eq!(run.value.marked, [physics.subject_id]);
  assert_eq!(run.value.already_recorded, [maths.subject_id]);
  assert!(run.value.failed.is_empty());
  let changed: Vec<_> = run.changes.iter().cloned().collect();
  assert_eq!(
    changed,
    [Change::AttendanceChanged { subject_id: physics.subject_id, date: monday() }]
  );

  let marked = t
    .store()
    .find_attendance(owner(), physics.subject_id, monday())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(marked.status, Status::Present);
  assert_eq!(marked.origin, Origin::Auto);

  let kept = t
    .store()
    .find_attendance(owner(), maths.subject_id, monday())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(kept.status, Status::Absent);

  let rerun = t.run_auto_mark(&owner(), monday()).await.unwrap();
  assert!(rerun.value.marked.is_empty());
  assert_eq!(rerun.value.already_recorded.len(), 2);
  assert!(rerun.changes.is_empty());
}

#[tokio::test]
async fn report_windows_are_inclusive_at_the_start() {
  let t = tracker().await;
  let physics = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;
  let maths = t.create_subject(&owner(), "Maths", days(&["monday"])).await.unwrap().value;
  let today = date(2024, 6, 20);

  let saves = [
    (physics.subject_id, date(2024, 6, 13), Status::Present), // today - 7: weekly
    (physics.subject_id, date(2024, 6, 12), Status::Absent),  // monthly only
    (physics.subject_id, date(2024, 6, 1), Status::Present),  // first of month
    (maths.subject_id, date(2024, 5, 31), Status::Late),      // neither window
    (maths.subject_id, today, Status::Present),
  ];
  for (id, d, status) in saves {
    t.save_attendance(&owner(), id, d, status).await.unwrap();
  }

  let report = t.report(&owner(), today).await.unwrap();
  assert_eq!(report.weekly.start, date(2024, 6, 13));
  assert_eq!(report.weekly.counts.total(), 2);
  assert_eq!(report.monthly.start, date(2024, 6, 1));
  assert_eq!(report.monthly.counts.total(), 4);
  assert_eq!(report.monthly.counts.absent, 1);

  let physics_perf = &report.subjects[0];
  assert_eq!(physics_perf.name, "Physics");
  assert_eq!(physics_perf.total, 3);
  assert_eq!(physics_perf.percentage, 67);
  let maths_perf = &report.subjects[1];
  assert_eq!(maths_perf.percentage, 50);

  let snapshot = t.today_snapshot(&owner(), today).await.unwrap();
  assert_eq!(snapshot.total_subjects, 2);
  assert_eq!(snapshot.counts.present, 1);
}

#[tokio::test]
async fn sign_in_creates_profile_and_auto_marks() {
  let t = tracker().await;
  let subject = t.create_subject(&owner(), "Physics", days(&["monday"])).await.unwrap().value;

  let signed = t.sign_in(&Identity::new(owner()), monday()).await.unwrap();
  assert_eq!(signed.value.profile.display_name, "Student User");
  assert_eq!(signed.value.auto_mark.marked, [subject.subject_id]);

  let identity = Identity { display_name: Some("Alice".to_owned()), ..Identity::new(owner()) };
  let again = t.sign_in(&identity, monday()).await.unwrap();
  assert_eq!(again.value.profile.display_name, "Student User");
  assert!(again.value.auto_mark.marked.is_empty());

  let patch = ProfilePatch { display_name: Some("  ".to_owned()), email: None };
  let err = t.update_profile(&owner(), patch).await.unwrap_err();
  assert!(err.is_validation());

  let patch = ProfilePatch { display_name: Some(" Alice ".to_owned()), email: None };
  let updated = t.update_profile(&owner(), patch).await.unwrap();
  assert_eq!(updated.value.display_name, "Alice");
  assert_eq!(t.profile(&owner()).await.unwrap().display_name, "Alice");
}

#[tokio::test]
async fn notification_operations_report_missing_ids() {
  let t = tracker().await;
  let err = t.mark_notification_read(&owner(), Uuid::new_v4()).await.unwrap_err();
  assert!(err.is_not_found());
  let err = t.delete_notification(&owner(), Uuid::new_v4()).await.unwrap_err();
  assert!(err.is_not_found());
}

// ─── Degraded store ──────────────────────────────────────────────────────────

/// Delegates to a real store but fails selected calls.
struct FlakyStore {
  inner:              SqliteStore,
  fail_scoped_list:   bool,
  fail_auto_mark_for: Option<Uuid>,
  fail_next_raise:    AtomicBool,
}

fn injected(what: &str) -> Error { Error::Decode(format!("injected failure: {what}")) }

impl AttendanceStore for FlakyStore {
  type Error = Error;

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    self.inner.add_subject(input).await
  }

  async fn get_subject(&self, owner: Owner, id: Uuid) -> Result<Option<Subject>> {
    self.inner.get_subject(owner, id).await
  }

  async fn list_subjects(&self, owner: Owner) -> Result<Vec<Subject>> {
    if self.fail_scoped_list {
      return Err(injected("list_subjects"));
    }
    self.inner.list_subjects(owner).await
  }

  async fn list_all_subjects(&self) -> Result<Vec<Subject>> {
    self.inner.list_all_subjects().await
  }

  async fn update_subject(
    &self,
    owner: Owner,
    id: Uuid,
    patch: SubjectPatch,
  ) -> Result<Option<Subject>> {
    self.inner.update_subject(owner, id, patch).await
  }

  async fn delete_subject(&self, owner: Owner, id: Uuid) -> Result<Option<usize>> {
    self.inner.delete_subject(owner, id).await
  }

  async fn upsert_attendance(
    &self,
    entry: AttendanceEntry,
  ) -> Result<(AttendanceRecord, Upserted)> {
    self.inner.upsert_attendance(entry).await
  }

  async fn insert_attendance_if_absent(
    &self,
    entry: AttendanceEntry,
  ) -> Result<Option<AttendanceRecord>> {
    if self.fail_auto_mark_for == Some(entry.subject_id) {
      return Err(injected("insert_attendance_if_absent"));
    }
    self.inner.insert_attendance_if_absent(entry).await
  }

  async fn get_attendance(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> Result<Option<AttendanceRecord>> {
    self.inner.get_attendance(owner, id).await
  }

  async fn find_attendance(
    &self,
    owner: Owner,
    subject_id: Uuid,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    self.inner.find_attendance(owner, subject_id, date).await
  }

  async fn list_attendance(
    &self,
    owner: Owner,
    query: AttendanceQuery,
  ) -> Result<Vec<AttendanceRecord>> {
    self.inner.list_attendance(owner, query).await
  }

  async fn delete_attendance(
    &self,
    owner: Owner,
    id: Uuid,
  ) -> Result<Option<AttendanceRecord>> {
    self.inner.delete_attendance(owner, id).await
  }

  async fn count_statuses(
    &self,
    owner: Owner,
    subject_id: Uuid,
  ) -> Result<StatusCounts> {
    self.inner.count_statuses(owner, subject_id).await
  }

  async fn get_alert_state(&self, owner: Owner, subject_id: Uuid) -> Result<AlertState> {
    self.inner.get_alert_state(owner, subject_id).await
  }

  async fn raise_alerts(
    &self,
    owner: Owner,
    subject_id: Uuid,
    state: AlertState,
    alerts: Vec<NewNotification>,
  ) -> Result<Vec<Notification>> {
    if self.fail_next_raise.swap(false, Ordering::SeqCst) {
      return Err(injected("raise_alerts"));
    }
    self.inner.raise_alerts(owner, subject_id, state, alerts).await
  }

  async fn list_notifications(
    &self,
    owner: Owner,
    unread_only: bool,
    limit: Option<usize>,
  ) -> Result<Vec<Notification>> {
    self.inner.list_notifications(owner, unread_only, limit).await
  }

  async fn mark_notification_read(&self, owner: Owner, id: Uuid) -> Result<bool> {
    self.inner.mark_notification_read(owner, id).await
  }

  async fn delete_notification(&self, owner: Owner, id: Uuid) -> Result<bool> {
    self.inner.delete_notification(owner, id).await
  }

  async fn get_profile(&self, owner: Owner) -> Result<Option<Profile>> {
    self.inner.get_profile(owner).await
  }

  async fn ensure_profile(
    &self,
    owner: Owner,
    display_name: String,
    email: Option<String>,
  ) -> Result<Profile> {
    self.inner.ensure_profile(owner, display_name, email).await
  }

  async fn update_profile(
    &self,
    owner: Owner,
    patch: ProfilePatch,
  ) -> Result<Option<Profile>> {
    self.inner.update_profile(owner, patch).await
  }
}

fn flaky(
  inner: SqliteStore,
  fail_scoped_list: bool,
  fail_auto_mark_for: Option<Uuid>,
) -> Tracker<FlakyStore> {
  Tracker::new(FlakyStore {
    inner,
    fail_scoped_list,
    fail_auto_mark_for,
    fail_next_raise: AtomicBool::new(false),
  })
}

#[tokio::test]
async fn subject_reads_fall_back_to_an_unscoped_query() {
  let s = store().await;
  let mine = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  add_subject(&s, &Owner::new("bob"), "History", &["monday"]).await;

  let t = flaky(s, true, None);
  let subjects = t.list_subjects(&owner()).await.unwrap();
  assert_eq!(subjects.len(), 1);
  assert_eq!(subjects[0].subject_id, mine.subject_id);

  // Writes never use the fallback.
  let err = t.run_auto_mark(&owner(), monday()).await.unwrap_err();
  assert!(!err.is_not_found());
}

#[tokio::test]
async fn auto_mark_failure_on_one_subject_does_not_stop_the_rest() {
  let s = store().await;
  let broken = add_subject(&s, &owner(), "Physics", &["monday"]).await;
  let fine = add_subject(&s, &owner(), "Maths", &["monday"]).await;

  let t = flaky(s, false, Some(broken.subject_id));
  let run = t.run_auto_mark(&owner(), monday()).await.unwrap();
  assert_eq!(run.value.marked, [fine.subject_id]);
  assert_eq!(run.value.failed.len(), 1);
  assert_eq!(run.value.failed[0].subject_id, broken.subject_id);
}

#[tokio::test]
async fn failed_alert_write_is_retried_without_duplicates() {
  let s = store().await;
  let subject = add_subject(&s, &owner(), "Maths", &["monday"]).await;
  let id = subject.subject_id;

  let t = flaky(s, false, None);
  t.save_attendance(&owner(), id, date(2024, 6, 3), Status::Absent).await.unwrap();

  t.store().fail_next_raise.store(true, Ordering::SeqCst);
  let second = t.save_attendance(&owner(), id, date(2024, 6, 10), Status::Absent).await.unwrap();
  assert!(second.value.notifications.is_empty());
  assert!(!second.changes.iter().any(|c| *c == Change::NotificationsChanged));
  assert!(t.notifications(&owner(), false, None).await.unwrap().is_empty());

  // Still two absences: the warning is raised now, exactly once.
  let third = t.save_attendance(&owner(), id, date(2024, 6, 17), Status::Present).await.unwrap();
  assert_eq!(third.value.notifications.len(), 1);
  assert_eq!(third.value.notifications[0].severity, Severity::Warning);
  assert!(third.changes.iter().any(|c| *c == Change::NotificationsChanged));

  t.save_attendance(&owner(), id, date(2024, 6, 24), Status::Present).await.unwrap();
  let warnings = t
    .notifications(&owner(), false, None)
    .await
    .unwrap()
    .into_iter()
    .filter(|n| n.severity == Severity::Warning)
    .count();
  assert_eq!(warnings, 1);
}
