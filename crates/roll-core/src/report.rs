//! Reporting aggregator: read-only projections over an owner's records.

use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, StatusCounts},
  subject::Subject,
};

// ─── Windows ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
  /// The last seven days plus today.
  Weekly,
  /// From the first of the current month.
  Monthly,
}

impl Window {
  /// First date inside the window.
  pub fn start(self, today: NaiveDate) -> NaiveDate {
    match self {
      Self::Weekly => today.checked_sub_days(Days::new(7)).unwrap_or(NaiveDate::MIN),
      Self::Monthly => today.with_day(1).unwrap_or(today),
    }
  }

  pub fn contains(self, today: NaiveDate, date: NaiveDate) -> bool {
    date >= self.start(today)
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Counts for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
  pub window: Window,
  pub start:  NaiveDate,
  pub counts: StatusCounts,
}

/// All-time figures for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPerformance {
  pub subject_id: Uuid,
  pub name:       String,
  pub counts:     StatusCounts,
  pub total:      u32,
  pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
  pub today:    NaiveDate,
  pub weekly:   WindowReport,
  pub monthly:  WindowReport,
  /// In the order the subjects were given.
  pub subjects: Vec<SubjectPerformance>,
}

fn window_report(window: Window, today: NaiveDate, records: &[AttendanceRecord]) -> WindowReport {
  let counts = records
    .iter()
    .filter(|r| window.contains(today, r.date))
    .map(|r| r.status)
    .collect();
  WindowReport { window, start: window.start(today), counts }
}

/// Build the weekly, monthly and per-subject report.
///
/// Records for subjects not in `subjects` still count toward the windows.
pub fn build_report(
  today: NaiveDate,
  subjects: &[Subject],
  records: &[AttendanceRecord],
) -> Report {
  let mut per_subject: HashMap<Uuid, StatusCounts> = HashMap::new();
  for r in records {
    per_subject.entry(r.subject_id).or_default().tally(r.status);
  }

  let subjects = subjects
    .iter()
    .map(|s| {
      let counts = per_subject.get(&s.subject_id).copied().unwrap_or_default();
      SubjectPerformance {
        subject_id: s.subject_id,
        name: s.name.clone(),
        counts,
        total: counts.total(),
        percentage: counts.attendance_percentage(),
      }
    })
    .collect();

  Report {
    today,
    weekly: window_report(Window::Weekly, today, records),
    monthly: window_report(Window::Monthly, today, records),
    subjects,
  }
}

// ─── Daily snapshot ──────────────────────────────────────────────────────────

/// Dashboard figures for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
  pub date:           NaiveDate,
  pub total_subjects: usize,
  pub counts:         StatusCounts,
}

/// Tally the records dated `date`; others are ignored.
pub fn daily_snapshot(
  date: NaiveDate,
  total_subjects: usize,
  records: &[AttendanceRecord],
) -> DailySnapshot {
  let counts = records
    .iter()
    .filter(|r| r.date == date)
    .map(|r| r.status)
    .collect();
  DailySnapshot { date, total_subjects, counts }
}
