//! Calendar engine: maps a subject's weekly recurrence to concrete dates.
//!
//! Everything here is pure date math on [`NaiveDate`]: dates are local
//! calendar days and equality is by calendar date, never by instant.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{Error, Result};

/// Any non-empty weekday set has a member within this many days of any date.
const SEARCH_SPAN: u64 = 7;

// ─── Day ─────────────────────────────────────────────────────────────────────

/// A day of the week, Sunday first.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Day {
  Sunday,
  Monday,
  Tuesday,
  Wednesday,
  Thursday,
  Friday,
  Saturday,
}

impl Day {
  /// The weekday of a calendar date.
  pub fn of(date: NaiveDate) -> Self { Self::from(date.weekday()) }

  pub fn as_str(self) -> &'static str { self.into() }

  fn bit(self) -> u8 { 1 << (self as u8) }
}

impl From<Weekday> for Day {
  fn from(w: Weekday) -> Self {
    match w {
      Weekday::Sun => Self::Sunday,
      Weekday::Mon => Self::Monday,
      Weekday::Tue => Self::Tuesday,
      Weekday::Wed => Self::Wednesday,
      Weekday::Thu => Self::Thursday,
      Weekday::Fri => Self::Friday,
      Weekday::Sat => Self::Saturday,
    }
  }
}

impl fmt::Display for Day {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Parse a day name (`"monday"`, `"Monday"`, ...).
pub fn parse_day(s: &str) -> Result<Day> {
  s.trim()
    .parse()
    .map_err(|_| Error::UnknownDay(s.to_owned()))
}

// ─── Recurrence ──────────────────────────────────────────────────────────────

/// The set of weekdays on which a subject meets. Never empty.
///
/// Stored as a seven-bit mask; serialised as a list of day names in
/// Sunday-first order. Duplicates in the input collapse.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Day>", into = "Vec<Day>")]
pub struct Recurrence(u8);

impl Recurrence {
  /// Build a recurrence, rejecting an empty day set.
  pub fn new(days: impl IntoIterator<Item = Day>) -> Result<Self> {
    let mask = days.into_iter().fold(0u8, |mask, d| mask | d.bit());
    if mask == 0 {
      return Err(Error::EmptyRecurrence);
    }
    Ok(Self(mask))
  }

  /// Parse a list of day names, e.g. `["monday", "wednesday"]`.
  pub fn parse<I, T>(names: I) -> Result<Self>
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    let days = names
      .into_iter()
      .map(|n| parse_day(n.as_ref()))
      .collect::<Result<Vec<_>>>()?;
    Self::new(days)
  }

  pub fn contains(&self, day: Day) -> bool { self.0 & day.bit() != 0 }

  /// Member days in Sunday-first order.
  pub fn days(&self) -> impl Iterator<Item = Day> + '_ {
    Day::iter().filter(|d| self.contains(*d))
  }

  pub fn len(&self) -> usize { self.0.count_ones() as usize }

  /// A constructed recurrence is never empty.
  pub fn is_empty(&self) -> bool { self.0 == 0 }
}

impl fmt::Debug for Recurrence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.days()).finish()
  }
}

impl TryFrom<Vec<Day>> for Recurrence {
  type Error = Error;

  fn try_from(days: Vec<Day>) -> Result<Self> { Self::new(days) }
}

impl From<Recurrence> for Vec<Day> {
  fn from(r: Recurrence) -> Self { r.days().collect() }
}

// ─── Occurrence math ─────────────────────────────────────────────────────────

/// Which way [`step`] walks along the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[serde(alias = "next")]
  Forward,
  #[serde(alias = "previous", alias = "prev")]
  Backward,
}

/// `true` iff `date` falls on one of the recurrence's weekdays.
pub fn is_valid_day(date: NaiveDate, recurrence: &Recurrence) -> bool {
  recurrence.contains(Day::of(date))
}

/// The valid date closest to `start`.
///
/// `start` itself wins when valid. Otherwise offsets 1..=7 are tried
/// forward first, then backward, so ties go to the later date. Falls back to
/// `start` only at the edges of the representable calendar.
pub fn nearest_valid_date(start: NaiveDate, recurrence: &Recurrence) -> NaiveDate {
  if is_valid_day(start, recurrence) {
    return start;
  }
  for offset in 1..=SEARCH_SPAN {
    let span = Days::new(offset);
    if let Some(forward) = start.checked_add_days(span)
      && is_valid_day(forward, recurrence)
    {
      return forward;
    }
    if let Some(backward) = start.checked_sub_days(span)
      && is_valid_day(backward, recurrence)
    {
      return backward;
    }
  }
  start
}

/// The next (or previous) valid date strictly after (or before) `current`.
///
/// Walks one day at a time and gives up after a week, which a non-empty
/// recurrence never needs. With a single meeting day the result is exactly
/// seven days away in either direction.
pub fn step(
  current: NaiveDate,
  recurrence: &Recurrence,
  direction: Direction,
) -> NaiveDate {
  let mut date = current;
  for _ in 0..SEARCH_SPAN {
    let next = match direction {
      Direction::Forward => date.succ_opt(),
      Direction::Backward => date.pred_opt(),
    };
    let Some(next) = next else { return current };
    date = next;
    if is_valid_day(date, recurrence) {
      return date;
    }
  }
  current
}
