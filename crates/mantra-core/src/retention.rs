//! Retention horizon: which records are live and which are purged.
//!
//! The engine never reads the wall clock directly. A [`Clock`] supplies the
//! reference instant and a [`RetentionPolicy`] turns it into a horizon.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use parking_lot::Mutex;

use crate::exercise::Exercise;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for deterministic tests.
///
/// Clones share the same instant, so a test can keep one handle and advance
/// time under an engine that owns another.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// How the retention horizon is derived from the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Anything that started before now is expired.
    Now,
    /// Anything that started before midnight of the current day is expired.
    /// Midnight is taken at the given UTC offset.
    StartOfDay { offset: FixedOffset },
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::StartOfDay { offset: Utc.fix() }
    }
}

impl RetentionPolicy {
    /// The cutoff instant for the given reference time.
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Now => now,
            Self::StartOfDay { offset } => {
                let local = now.with_timezone(offset);
                let since_midnight = local.time() - NaiveTime::MIN;
                (local - since_midnight).with_timezone(&Utc)
            }
        }
    }
}

/// Whether a record is visible to the engine at `horizon`.
pub fn is_live(exercise: &Exercise, horizon: DateTime<Utc>) -> bool {
    exercise.start_time >= horizon
}

/// Splits records into `(live, expired)` at `horizon`, preserving order.
pub fn partition_expired(
    exercises: impl IntoIterator<Item = Exercise>,
    horizon: DateTime<Utc>,
) -> (Vec<Exercise>, Vec<Exercise>) {
    exercises
        .into_iter()
        .partition(|exercise| is_live(exercise, horizon))
}
