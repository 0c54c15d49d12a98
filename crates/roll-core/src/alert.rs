//! Alert engine: turns a subject's attendance counts into one-time
//! notifications.
//!
//! Counts are always recomputed from the full record set. Which thresholds
//! have already been announced is tracked explicitly per subject in an
//! [`AlertState`], so evaluating the same history twice never produces a
//! second notification. Once latched, a threshold stays latched until the
//! subject is deleted.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, attendance::StatusCounts, notification::Severity};

/// Count thresholds at which alerts fire. Both are at least 1, otherwise an
/// alert would fire for a subject with no absences at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct AlertThresholds {
  /// Absences that trigger the warning.
  pub warning_absences: u32,
  /// Absences plus late arrivals that trigger the critical alert.
  pub critical_misses:  u32,
}

impl AlertThresholds {
  pub fn new(warning_absences: u32, critical_misses: u32) -> Result<Self> {
    if warning_absences == 0 {
      return Err(Error::ZeroThreshold("warning_absences"));
    }
    if critical_misses == 0 {
      return Err(Error::ZeroThreshold("critical_misses"));
    }
    Ok(Self { warning_absences, critical_misses })
  }
}

impl Default for AlertThresholds {
  fn default() -> Self { Self { warning_absences: 2, critical_misses: 3 } }
}

/// Unchecked form read from configuration; missing fields take the defaults.
#[derive(Deserialize)]
#[serde(default)]
struct RawThresholds {
  warning_absences: u32,
  critical_misses:  u32,
}

impl Default for RawThresholds {
  fn default() -> Self {
    let d = AlertThresholds::default();
    Self { warning_absences: d.warning_absences, critical_misses: d.critical_misses }
  }
}

impl TryFrom<RawThresholds> for AlertThresholds {
  type Error = Error;

  fn try_from(raw: RawThresholds) -> Result<Self> {
    Self::new(raw.warning_absences, raw.critical_misses)
  }
}

/// Which alerts a subject has already raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
  pub warning_sent:  bool,
  pub critical_sent: bool,
}

/// A notification the caller should persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
  pub severity: Severity,
  pub title:    String,
  pub message:  String,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
  pub state:  AlertState,
  pub alerts: Vec<Alert>,
}

impl Evaluation {
  pub fn changed(&self, before: AlertState) -> bool { self.state != before }
}

/// Decide which alerts fire for `counts`, given what `state` already sent.
///
/// The warning and critical checks are independent; both may fire at once.
pub fn evaluate(
  subject_name: &str,
  counts: StatusCounts,
  state: AlertState,
  thresholds: &AlertThresholds,
) -> Evaluation {
  let mut next = state;
  let mut alerts = Vec::new();

  if !state.warning_sent && counts.absent >= thresholds.warning_absences {
    next.warning_sent = true;
    alerts.push(Alert {
      severity: Severity::Warning,
      title:    "Attendance Warning".to_owned(),
      message:  format!(
        "You have {} absences in {subject_name}. Please improve your attendance.",
        counts.absent
      ),
    });
  }

  if !state.critical_sent && counts.misses() >= thresholds.critical_misses {
    next.critical_sent = true;
    alerts.push(Alert {
      severity: Severity::Critical,
      title:    "Critical Attendance Alert".to_owned(),
      message:  format!(
        "You have {} absences and {} late arrivals in {subject_name}. \
         Immediate attention required.",
        counts.absent, counts.late
      ),
    });
  }

  Evaluation { state: next, alerts }
}
