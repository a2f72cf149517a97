//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A count that must be non-negative was negative.
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: i64 },

    /// A count did not fit the stored integer width.
    #[error("{field} is too large: {value}")]
    TooLarge { field: &'static str, value: i64 },

    /// The exercise starts before the retention horizon and would be purged.
    #[error("start time {start_time} is before the retention horizon {horizon}")]
    BeforeHorizon {
        start_time: DateTime<Utc>,
        horizon: DateTime<Utc>,
    },

    /// Invalid exercise source value.
    #[error("invalid exercise source: {value}")]
    InvalidSource { value: String },
}

/// Where an exercise record came from.
///
/// Informational only: detection never looks at it, but merges preserve it
/// and duplicate detection keys on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseSource {
    /// Entered by hand.
    Manual,
    /// Imported from Google Health.
    GoogleHealth,
    /// Imported from Samsung Health.
    SamsungHealth,
    /// Imported from Garmin.
    Garmin,
}

impl ExerciseSource {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::GoogleHealth => "google_health",
            Self::SamsungHealth => "samsung_health",
            Self::Garmin => "garmin",
        }
    }

    /// Whether the record was pulled from an outside platform.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        !matches!(self, Self::Manual)
    }
}

impl fmt::Display for ExerciseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExerciseSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "google_health" => Ok(Self::GoogleHealth),
            "samsung_health" => Ok(Self::SamsungHealth),
            "garmin" => Ok(Self::Garmin),
            _ => Err(ValidationError::InvalidSource {
                value: s.to_string(),
            }),
        }
    }
}

/// Store-assigned identifier of an exercise record.
///
/// Assigned once on insert and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseId(i64);

impl ExerciseId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ExerciseId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated conflict group identifier.
    ///
    /// Group IDs are regenerated on every detection pass, so they are only
    /// meaningful until the next mutation of the store.
    GroupId, "conflict group ID"
);

impl GroupId {
    /// Generates a fresh random group ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
