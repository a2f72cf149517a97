//! Scheduled exercise records and the time intervals they occupy.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExerciseId, ExerciseSource, GroupId, ValidationError};

/// Fractional-second digits kept on start times. The database persists no
/// more than this, and duplicate matching compares at this precision.
pub const START_TIME_PRECISION: u16 = 3;

/// A validated exercise that has not been stored yet.
///
/// Build one with [`NewExercise::new`], which rejects empty names and
/// negative counts. Stores assign the [`ExerciseId`] on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExercise {
    pub name: String,
    pub duration_minutes: u32,
    pub calories: u32,
    pub start_time: DateTime<Utc>,
    pub source: ExerciseSource,
}

impl NewExercise {
    /// Validates raw field values and builds a candidate record.
    ///
    /// The start time is truncated to [`START_TIME_PRECISION`].
    pub fn new(
        name: impl Into<String>,
        duration_minutes: i64,
        calories: i64,
        start_time: DateTime<Utc>,
        source: ExerciseSource,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        Ok(Self {
            name,
            duration_minutes: non_negative("duration", duration_minutes)?,
            calories: non_negative("calories", calories)?,
            start_time: start_time.trunc_subsecs(START_TIME_PRECISION),
            source,
        })
    }

    /// Re-checks the invariants that public fields cannot enforce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        Ok(())
    }

    /// The half-open interval this exercise would occupy.
    pub fn interval(&self) -> Interval {
        Interval::from_duration(self.start_time, self.duration_minutes)
    }

    /// Attaches a store-assigned ID. The result carries no conflict tag.
    #[must_use]
    pub fn into_exercise(self, id: ExerciseId) -> Exercise {
        Exercise {
            id,
            name: self.name,
            duration_minutes: self.duration_minutes,
            calories: self.calories,
            start_time: self.start_time,
            source: self.source,
            conflict_group_id: None,
        }
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    u32::try_from(value).map_err(|_| ValidationError::TooLarge { field, value })
}

/// A stored exercise record.
///
/// `conflict_group_id` is derived state owned by the conflict engine. A record
/// is conflicted exactly when it carries a group ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub name: String,
    pub duration_minutes: u32,
    /// Informational only, never used by detection.
    pub calories: u32,
    pub start_time: DateTime<Utc>,
    pub source: ExerciseSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_group_id: Option<GroupId>,
}

impl Exercise {
    /// Whether the record currently belongs to a conflict group.
    pub const fn is_conflicted(&self) -> bool {
        self.conflict_group_id.is_some()
    }

    /// The half-open interval `[start_time, start_time + duration)`.
    pub fn interval(&self) -> Interval {
        Interval::from_duration(self.start_time, self.duration_minutes)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.interval().end
    }

    /// Returns a copy tagged with `group` (or untagged for `None`).
    #[must_use]
    pub fn with_group(&self, group: Option<GroupId>) -> Self {
        Self {
            conflict_group_id: group,
            ..self.clone()
        }
    }
}

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn from_duration(start: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Strict overlap: touching endpoints do not overlap, and an empty
    /// interval overlaps nothing.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && self.end > other.start
    }
}
