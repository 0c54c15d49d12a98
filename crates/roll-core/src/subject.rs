//! Subject: a recurring weekly class the owner tracks attendance for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, identity::Owner, schedule::Recurrence};

/// A named class meeting on a fixed set of weekdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: Uuid,
  pub owner:      Owner,
  pub name:       String,
  pub recurrence: Recurrence,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Input to [`crate::store::AttendanceStore::add_subject`].
#[derive(Debug, Clone)]
pub struct NewSubject {
  pub owner:      Owner,
  pub name:       String,
  pub recurrence: Recurrence,
}

impl NewSubject {
  /// Validates and normalises the name. The recurrence is non-empty by type.
  pub fn new(owner: Owner, name: &str, recurrence: Recurrence) -> Result<Self> {
    Ok(Self { owner, name: validate_name(name)?, recurrence })
  }
}

/// Edit applied by [`crate::store::AttendanceStore::update_subject`];
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
  pub name:       Option<String>,
  pub recurrence: Option<Recurrence>,
}

impl SubjectPatch {
  pub fn new(name: Option<&str>, recurrence: Option<Recurrence>) -> Result<Self> {
    let name = name.map(validate_name).transpose()?;
    Ok(Self { name, recurrence })
  }
}

fn validate_name(name: &str) -> Result<String> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    return Err(Error::EmptyName);
  }
  Ok(trimmed.to_owned())
}
