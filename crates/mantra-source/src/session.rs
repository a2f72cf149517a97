//! Platform sessions and how they become candidate exercises.

use chrono::{DateTime, Duration, Utc};
use mantra_core::{ExerciseSource, NewExercise};
use serde::{Deserialize, Serialize};

/// Name used when a session has no title.
pub const DEFAULT_NAME: &str = "Exercise";

/// Estimated burn for sessions that report no calories.
pub const CALORIES_PER_MINUTE: i64 = 5;

/// Default window before "now" in which sessions are fetched.
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

/// One exercise session as reported by a fitness platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub calories: Option<i64>,
    /// Overrides the source's default platform tag.
    #[serde(default)]
    pub source: Option<ExerciseSource>,
}

/// How sessions are turned into [`NewExercise`] candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMapping {
    /// Platform tag for sessions that do not name one.
    pub source: ExerciseSource,
    /// Sessions starting earlier than `now - lookback` are dropped.
    pub lookback: Duration,
}

impl Default for SessionMapping {
    fn default() -> Self {
        Self {
            source: ExerciseSource::GoogleHealth,
            lookback: Duration::hours(i64::from(DEFAULT_LOOKBACK_HOURS)),
        }
    }
}

impl SessionMapping {
    pub fn with_lookback_hours(mut self, hours: u32) -> Self {
        self.lookback = Duration::hours(i64::from(hours));
        self
    }

    /// Maps a single session, or `None` if it falls outside the window or
    /// cannot describe a valid exercise.
    pub fn map(&self, session: Session, now: DateTime<Utc>) -> Option<NewExercise> {
        if session.start_time < now - self.lookback {
            return None;
        }
        if session.end_time < session.start_time {
            tracing::warn!(
                start = %session.start_time,
                end = %session.end_time,
                "skipping session that ends before it starts"
            );
            return None;
        }

        let minutes = (session.end_time - session.start_time).num_minutes();
        let calories = session
            .calories
            .unwrap_or_else(|| minutes.saturating_mul(CALORIES_PER_MINUTE));
        let name = session
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        let source = session.source.unwrap_or(self.source);

        match NewExercise::new(name, minutes, calories, session.start_time, source) {
            Ok(candidate) => Some(candidate),
            Err(err) => {
                tracing::warn!(error = %err, start = %session.start_time, "skipping session");
                None
            }
        }
    }

    /// Maps every session that yields a candidate, preserving order.
    pub fn map_all(
        &self,
        sessions: impl IntoIterator<Item = Session>,
        now: DateTime<Utc>,
    ) -> Vec<NewExercise> {
        sessions
            .into_iter()
            .filter_map(|session| self.map(session, now))
            .collect()
    }
}
