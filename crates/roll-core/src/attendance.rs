//! Attendance records: one fact per owner, subject and calendar date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, identity::Owner};

// ─── Status and origin ───────────────────────────────────────────────────────

/// What happened at a class meeting.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  #[default]
  Present,
  Absent,
  Late,
  /// Excused absence.
  Permission,
}

impl Status {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }
}

/// How a record entered the store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Origin {
  /// Saved explicitly by the owner.
  #[default]
  User,
  /// Created by the daily auto-marking job.
  Auto,
}

impl Origin {
  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A stored attendance fact. `(owner, subject_id, date)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub record_id:  Uuid,
  pub owner:      Owner,
  pub subject_id: Uuid,
  /// Calendar date; stored and compared as `YYYY-MM-DD`.
  pub date:       NaiveDate,
  pub status:     Status,
  /// Set when the record is first written and never changed afterwards.
  pub origin:     Origin,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Input to the attendance write path.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
  pub owner:      Owner,
  pub subject_id: Uuid,
  pub date:       NaiveDate,
  pub status:     Status,
  pub origin:     Origin,
}

/// Whether an upsert created a record or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Upserted {
  Inserted,
  Updated,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Filters for [`crate::store::AttendanceStore::list_attendance`]. Results are
/// always scoped to one owner and ordered by date, newest first.
#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
  pub subject_id: Option<Uuid>,
  /// Exact calendar date.
  pub date:       Option<NaiveDate>,
  /// Inclusive lower bound on the date.
  pub since:      Option<NaiveDate>,
  pub limit:      Option<usize>,
}

impl AttendanceQuery {
  pub fn for_subject(subject_id: Uuid) -> Self {
    Self { subject_id: Some(subject_id), ..Default::default() }
  }

  pub fn on(date: NaiveDate) -> Self { Self { date: Some(date), ..Default::default() } }

  pub fn since(date: NaiveDate) -> Self { Self { since: Some(date), ..Default::default() } }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// In-memory equivalent of the query's filters (the limit is not applied).
  pub fn matches(&self, record: &AttendanceRecord) -> bool {
    self.subject_id.is_none_or(|id| record.subject_id == id)
      && self.date.is_none_or(|d| record.date == d)
      && self.since.is_none_or(|d| record.date >= d)
  }
}

// ─── Counts ──────────────────────────────────────────────────────────────────

/// Per-status tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub present:    u32,
  pub absent:     u32,
  pub late:       u32,
  pub permission: u32,
}

impl StatusCounts {
  pub fn tally(&mut self, status: Status) {
    match status {
      Status::Present => self.present += 1,
      Status::Absent => self.absent += 1,
      Status::Late => self.late += 1,
      Status::Permission => self.permission += 1,
    }
  }

  pub fn total(&self) -> u32 { self.present + self.absent + self.late + self.permission }

  /// Absences plus late arrivals.
  pub fn misses(&self) -> u32 { self.absent + self.late }

  /// `round(present / total * 100)`, or 0 when nothing has been recorded.
  pub fn attendance_percentage(&self) -> u32 {
    let total = self.total();
    if total == 0 {
      return 0;
    }
    (f64::from(self.present) / f64::from(total) * 100.0).round() as u32
  }
}

impl FromIterator<Status> for StatusCounts {
  fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
    let mut counts = Self::default();
    for status in iter {
      counts.tally(status);
    }
    counts
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn percentage_rounds_and_handles_empty() {
    let c = StatusCounts { present: 3, absent: 1, ..Default::default() };
    assert_eq!(c.total(), 4);
    assert_eq!(c.attendance_percentage(), 75);

    assert_eq!(StatusCounts::default().attendance_percentage(), 0);

    // 2 / 3 = 66.67 → 67
    let c = StatusCounts { present: 2, late: 1, ..Default::default() };
    assert_eq!(c.attendance_percentage(), 67);
  }

  #[test]
  fn status_parses_lowercase_names() {
    assert_eq!(Status::parse("permission").unwrap(), Status::Permission);
    assert!(matches!(Status::parse("sick"), Err(Error::UnknownStatus(_))));
    assert_eq!(Status::Late.as_str(), "late");
  }

  #[test]
  fn counts_collect_from_statuses() {
    let c: StatusCounts =
      [Status::Absent, Status::Late, Status::Absent, Status::Present].into_iter().collect();
    assert_eq!(c.absent, 2);
    assert_eq!(c.misses(), 3);
  }
}
