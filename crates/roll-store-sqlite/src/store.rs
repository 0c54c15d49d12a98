//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use roll_core::{
  alert::AlertState,
  attendance::{
    AttendanceEntry, AttendanceQuery, AttendanceRecord, Status, StatusCounts, Upserted,
  },
  identity::{Owner, Profile, ProfilePatch},
  notification::{NewNotification, Notification},
  store::AttendanceStore,
  subject::{NewSubject, Subject, SubjectPatch},
};

use crate::{
  Error, Result,
  encode::{
    ATTENDANCE_COLUMNS, NOTIFICATION_COLUMNS, PROFILE_COLUMNS, RawAttendance, RawNotification,
    RawProfile, RawSubject, SUBJECT_COLUMNS, alert_state_from_row, decode_status, encode_date,
    encode_days, encode_dt, encode_limit, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roll store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run an attendance insert whose statement ends in `RETURNING`; `None`
  /// when the statement produced no row.
  async fn insert_attendance_returning(
    &self,
    sql: String,
    entry: AttendanceEntry,
    record_id: Uuid,
  ) -> Result<Option<RawAttendance>> {
    let id_str      = encode_uuid(record_id);
    let owner       = entry.owner.as_str().to_owned();
    let subject_str = encode_uuid(entry.subject_id);
    let date_str    = encode_date(entry.date);
    let status      = entry.status.as_str();
    let origin      = entry.origin.as_str();
    let now_str     = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &sql,
            rusqlite::params![id_str, owner, subject_str, date_str, status, origin, now_str],
            RawAttendance::from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(raw)
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let subject = Subject {
      subject_id: Uuid::new_v4(),
      owner:      input.owner,
      name:       input.name,
      recurrence: input.recurrence,
      created_at: Utc::now(),
      updated_at: None,
    };

    let id_str   = encode_uuid(subject.subject_id);
    let owner    = subject.owner.as_str().to_owned();
    let name     = subject.name.clone();
    let days_str = encode_days(&subject.recurrence)?;
    let at_str   = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, owner, name, days, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, owner, name, days_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, owner: Owner, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE owner = ?1 AND subject_id = ?2");

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![owner.as_str(), id_str], RawSubject::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self, owner: Owner) -> Result<Vec<Subject>> {
    let sql = format!(
      "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE owner = ?1 ORDER BY created_at, rowid"
    );

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner.as_str()], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn list_all_subjects(&self) -> Result<Vec<Subject>> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY created_at, rowid");

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn update_subject(
    &self,
    owner: Owner,
    id: Uuid,
    patch: SubjectPatch,
  ) -> Result<Option<Subject>> {
    let id_str   = encode_uuid(id);
    let name     = patch.name;
    let days_str = patch.recurrence.as_ref().map(encode_days).transpose()?;
    let at_str   = encode_dt(Utc::now());
    let sql = format!(
      "UPDATE subjects
       SET name       = COALESCE(?3, name),
           days       = COALESCE(?4, days),
           updated_at = ?5
       WHERE owner = ?1 AND subject_id = ?2
       RETURNING {SUBJECT_COLUMNS}"
    );

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &sql,
            rusqlite::params![owner.as_str(), id_str, name, days_str, at_str],
            RawSubject::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn delete_subject(&self, owner: Owner, id: Uuid) -> Result<Option<usize>> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE owner = ?1 AND subject_id = ?2",
            rusqlite::params![owner.as_str(), id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let removed = tx.execute(
          "DELETE FROM attendance WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM alert_states WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?;

        tx.commit()?;
        Ok(Some(removed))
      })
      .await?;

    Ok(removed)
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  async fn upsert_attendance(&self, entry: AttendanceEntry) -> Result<(AttendanceRecord, Upserted)> {
    // On conflict only status and updated_at change; origin and created_at
    // keep the values of the first write.
    let sql = format!(
      "INSERT INTO attendance
         (record_id, owner, subject_id, date, status, origin, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT (owner, subject_id, date) DO UPDATE
         SET status = excluded.status, updated_at = excluded.created_at
       RETURNING {ATTENDANCE_COLUMNS}"
    );
    let record_id = Uuid::new_v4();

    let raw = self
      .insert_attendance_returning(sql, entry, record_id)
      .await?
      .ok_or_else(|| Error::Decode("upsert returned no row".to_owned()))?;
    let record = raw.into_record()?;

    let upserted = if record.record_id == record_id {
      Upserted::Inserted
    } else {
      Upserted::Updated
    };
    Ok((record, upserted))
  }

  async fn insert_attendance_if_absent(
    &self,
    entry: AttendanceEntry,
  ) -> Result<Option<AttendanceRecord>> {
    let sql = format!(
      "INSERT INTO attendance
         (record_id, owner, subject_id, date, status, origin, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT (owner, subject_id, date) DO NOTHING
       RETURNING {ATTENDANCE_COLUMNS}"
    );
    let subject_id = entry.subject_id;
    let date = entry.date;

    let raw = self.insert_attendance_returning(sql, entry, Uuid::new_v4()).await?;
    if raw.is_none() {
      debug!(%subject_id, %date, "attendance already recorded, left untouched");
    }
    raw.map(RawAttendance::into_record).transpose()
  }

  async fn get_attendance(&self, owner: Owner, id: Uuid) -> Result<Option<AttendanceRecord>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE owner = ?1 AND record_id = ?2"
    );

    let raw: Option<RawAttendance> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![owner.as_str(), id_str], RawAttendance::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  async fn find_attendance(
    &self,
    owner: Owner,
    subject_id: Uuid,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let subject_str = encode_uuid(subject_id);
    let date_str    = encode_date(date);
    let sql = format!(
      "SELECT {ATTENDANCE_COLUMNS} FROM attendance
       WHERE owner = ?1 AND subject_id = ?2 AND date = ?3"
    );

    let raw: Option<RawAttendance> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &sql,
            rusqlite::params![owner.as_str(), subject_str, date_str],
            RawAttendance::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  async fn list_attendance(
    &self,
    owner: Owner,
    query: AttendanceQuery,
  ) -> Result<Vec<AttendanceRecord>> {
    let subject_str = query.subject_id.map(encode_uuid);
    let date_str    = query.date.map(encode_date);
    let since_str   = query.since.map(encode_date);
    let limit_val   = encode_limit(query.limit);
    let sql = format!(
      "SELECT {ATTENDANCE_COLUMNS} FROM attendance
       WHERE owner = ?1
         AND (?2 IS NULL OR subject_id = ?2)
         AND (?3 IS NULL OR date = ?3)
         AND (?4 IS NULL OR date >= ?4)
       ORDER BY date DESC, created_at DESC, rowid DESC
       LIMIT ?5"
    );

    let raws: Vec<RawAttendance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![owner.as_str(), subject_str, date_str, since_str, limit_val],
            RawAttendance::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_record).collect()
  }

  async fn delete_attendance(&self, owner: Owner, id: Uuid) -> Result<Option<AttendanceRecord>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "DELETE FROM attendance WHERE owner = ?1 AND record_id = ?2
       RETURNING {ATTENDANCE_COLUMNS}"
    );

    let raw: Option<RawAttendance> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![owner.as_str(), id_str], RawAttendance::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  async fn count_statuses(&self, owner: Owner, subject_id: Uuid) -> Result<StatusCounts> {
    let subject_str = encode_uuid(subject_id);

    let rows: Vec<(String, u32)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT status, COUNT(*) FROM attendance
           WHERE owner = ?1 AND subject_id = ?2
           GROUP BY status",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![owner.as_str(), subject_str], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut counts = StatusCounts::default();
    for (status, n) in rows {
      match decode_status(&status)? {
        Status::Present => counts.present = n,
        Status::Absent => counts.absent = n,
        Status::Late => counts.late = n,
        Status::Permission => counts.permission = n,
      }
    }
    Ok(counts)
  }

  // ── Alert state ───────────────────────────────────────────────────────────

  async fn get_alert_state(&self, owner: Owner, subject_id: Uuid) -> Result<AlertState> {
    let subject_str = encode_uuid(subject_id);

    let state: Option<AlertState> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT warning_sent, critical_sent FROM alert_states
             WHERE owner = ?1 AND subject_id = ?2",
            rusqlite::params![owner.as_str(), subject_str],
            alert_state_from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(state.unwrap_or_default())
  }

  async fn raise_alerts(
    &self,
    owner: Owner,
    subject_id: Uuid,
    state: AlertState,
    alerts: Vec<NewNotification>,
  ) -> Result<Vec<Notification>> {
    let created_at = Utc::now();
    let notifications: Vec<Notification> = alerts
      .into_iter()
      .map(|input| Notification {
        notification_id: Uuid::new_v4(),
        owner:           input.owner,
        subject_id:      input.subject_id,
        title:           input.title,
        message:         input.message,
        severity:        input.severity,
        read:            false,
        created_at,
      })
      .collect();

    let rows: Vec<_> = notifications
      .iter()
      .map(|n| {
        (
          encode_uuid(n.notification_id),
          n.owner.as_str().to_owned(),
          n.subject_id.map(encode_uuid),
          n.title.clone(),
          n.message.clone(),
          n.severity.as_str(),
        )
      })
      .collect();
    let subject_str = encode_uuid(subject_id);
    let at_str      = encode_dt(created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO notifications
               (notification_id, owner, subject_id, title, message, severity, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
          )?;
          for (id_str, n_owner, n_subject, title, message, severity) in &rows {
            insert.execute(rusqlite::params![
              id_str, n_owner, n_subject, title, message, severity, at_str
            ])?;
          }
        }
        tx.execute(
          "INSERT INTO alert_states (owner, subject_id, warning_sent, critical_sent)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (owner, subject_id) DO UPDATE
             SET warning_sent  = excluded.warning_sent,
                 critical_sent = excluded.critical_sent",
          rusqlite::params![owner.as_str(), subject_str, state.warning_sent, state.critical_sent],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(%subject_id, raised = notifications.len(), "alerts raised");
    Ok(notifications)
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn list_notifications(
    &self,
    owner: Owner,
    unread_only: bool,
    limit: Option<usize>,
  ) -> Result<Vec<Notification>> {
    let limit_val = encode_limit(limit);
    let sql = format!(
      "SELECT {NOTIFICATION_COLUMNS} FROM notifications
       WHERE owner = ?1 AND (?2 = 0 OR read = 0)
       ORDER BY created_at DESC, rowid DESC
       LIMIT ?3"
    );

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![owner.as_str(), unread_only, limit_val],
            RawNotification::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn mark_notification_read(&self, owner: Owner, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1 WHERE owner = ?1 AND notification_id = ?2",
          rusqlite::params![owner.as_str(), id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete_notification(&self, owner: Owner, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM notifications WHERE owner = ?1 AND notification_id = ?2",
          rusqlite::params![owner.as_str(), id_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn get_profile(&self, owner: Owner) -> Result<Option<Profile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE owner = ?1");

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![owner.as_str()], RawProfile::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn ensure_profile(
    &self,
    owner: Owner,
    display_name: String,
    email: Option<String>,
  ) -> Result<Profile> {
    let at_str = encode_dt(Utc::now());
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE owner = ?1");

    let raw: RawProfile = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (owner, display_name, email, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (owner) DO NOTHING",
          rusqlite::params![owner.as_str(), display_name, email, at_str],
        )?;
        Ok(conn.query_row(&sql, rusqlite::params![owner.as_str()], RawProfile::from_row)?)
      })
      .await?;

    raw.into_profile()
  }

  async fn update_profile(&self, owner: Owner, patch: ProfilePatch) -> Result<Option<Profile>> {
    let at_str = encode_dt(Utc::now());
    let sql = format!(
      "UPDATE profiles
       SET display_name = COALESCE(?2, display_name),
           email        = COALESCE(?3, email),
           updated_at   = ?4
       WHERE owner = ?1
       RETURNING {PROFILE_COLUMNS}"
    );

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &sql,
            rusqlite::params![owner.as_str(), patch.display_name, patch.email, at_str],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }
}
