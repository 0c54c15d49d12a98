//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that string order matches time order. Calendar dates are `YYYY-MM-DD`.
//! Recurrences are stored as a compact JSON array of day names. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use roll_core::{
  alert::AlertState,
  attendance::{AttendanceRecord, Origin, Status},
  identity::{Owner, Profile},
  notification::{Notification, Severity},
  schedule::Recurrence,
  subject::Subject,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

// ─── Recurrence ───────────────────────────────────────────────────────────────

pub fn encode_days(r: &Recurrence) -> Result<String> { Ok(serde_json::to_string(r)?) }

pub fn decode_days(s: &str) -> Result<Recurrence> { Ok(serde_json::from_str(s)?) }

// ─── Enumerations ─────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<Status> { Ok(Status::parse(s)?) }

pub fn decode_origin(s: &str) -> Result<Origin> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown origin: {s:?}")))
}

pub fn decode_severity(s: &str) -> Result<Severity> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown severity: {s:?}")))
}

// ─── LIMIT ────────────────────────────────────────────────────────────────────

/// SQLite treats a negative `LIMIT` as "no limit"; oversized limits saturate.
pub fn encode_limit(limit: Option<usize>) -> i64 {
  limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SUBJECT_COLUMNS: &str = "subject_id, owner, name, days, created_at, updated_at";

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id: String,
  pub owner:      String,
  pub name:       String,
  pub days:       String,
  pub created_at: String,
  pub updated_at: Option<String>,
}

impl RawSubject {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id: row.get(0)?,
      owner:      row.get(1)?,
      name:       row.get(2)?,
      days:       row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id: decode_uuid(&self.subject_id)?,
      owner:      Owner::new(self.owner),
      name:       self.name,
      recurrence: decode_days(&self.days)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_opt_dt(self.updated_at)?,
    })
  }
}

pub const ATTENDANCE_COLUMNS: &str =
  "record_id, owner, subject_id, date, status, origin, created_at, updated_at";

/// Raw strings read directly from an `attendance` row.
pub struct RawAttendance {
  pub record_id:  String,
  pub owner:      String,
  pub subject_id: String,
  pub date:       String,
  pub status:     String,
  pub origin:     String,
  pub created_at: String,
  pub updated_at: Option<String>,
}

impl RawAttendance {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:  row.get(0)?,
      owner:      row.get(1)?,
      subject_id: row.get(2)?,
      date:       row.get(3)?,
      status:     row.get(4)?,
      origin:     row.get(5)?,
      created_at: row.get(6)?,
      updated_at: row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      record_id:  decode_uuid(&self.record_id)?,
      owner:      Owner::new(self.owner),
      subject_id: decode_uuid(&self.subject_id)?,
      date:       decode_date(&self.date)?,
      status:     decode_status(&self.status)?,
      origin:     decode_origin(&self.origin)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_opt_dt(self.updated_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, owner, subject_id, title, message, severity, read, created_at";

/// Raw values read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id: String,
  pub owner:           String,
  pub subject_id:      Option<String>,
  pub title:           String,
  pub message:         String,
  pub severity:        String,
  pub read:            bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      owner:           row.get(1)?,
      subject_id:      row.get(2)?,
      title:           row.get(3)?,
      message:         row.get(4)?,
      severity:        row.get(5)?,
      read:            row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      owner:           Owner::new(self.owner),
      subject_id:      self.subject_id.as_deref().map(decode_uuid).transpose()?,
      title:           self.title,
      message:         self.message,
      severity:        decode_severity(&self.severity)?,
      read:            self.read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const PROFILE_COLUMNS: &str = "owner, display_name, email, created_at, updated_at";

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub owner:        String,
  pub display_name: String,
  pub email:        Option<String>,
  pub created_at:   String,
  pub updated_at:   Option<String>,
}

impl RawProfile {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      owner:        row.get(0)?,
      display_name: row.get(1)?,
      email:        row.get(2)?,
      created_at:   row.get(3)?,
      updated_at:   row.get(4)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      owner:        Owner::new(self.owner),
      display_name: self.display_name,
      email:        self.email,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_opt_dt(self.updated_at)?,
    })
  }
}

/// An `alert_states` row; both flags are plain integers in SQLite.
pub fn alert_state_from_row(row: &Row<'_>) -> rusqlite::Result<AlertState> {
  Ok(AlertState { warning_sent: row.get(0)?, critical_sent: row.get(1)? })
}
