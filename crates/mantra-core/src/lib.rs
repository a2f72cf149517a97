//! Core domain logic for exercise scheduling.
//!
//! This crate contains:
//! - The exercise record model and its validation rules
//! - Conflict detection: grouping records whose time intervals overlap
//! - Retention: the horizon before which records are purged
//! - The [`ConflictEngine`], which keeps conflict tags consistent on any
//!   [`ExerciseStore`] and merges candidates from an [`ExternalSource`]
//!
//! Storage backends live in other crates; [`InMemoryStore`] is provided for
//! embedding and tests.

pub mod conflict;
mod engine;
mod error;
mod exercise;
mod memory;
mod projection;
mod retention;
mod source;
mod store;
pub mod types;

pub use conflict::{ConflictGroup, TaggingPlan, build_conflict_groups, plan_tagging};
pub use engine::{ConflictEngine, DetectReport, MergeReport, ResolveReport, Summary};
pub use error::EngineError;
pub use exercise::{Exercise, Interval, NewExercise, START_TIME_PRECISION};
pub use memory::InMemoryStore;
pub use projection::{LiveConflictGroups, LiveExercises, project_live};
pub use retention::{Clock, FixedClock, RetentionPolicy, SystemClock, is_live, partition_expired};
pub use source::{ExternalSource, SourceError};
pub use store::{ExerciseStore, Snapshot, SnapshotPublisher};
pub use types::{ExerciseId, ExerciseSource, GroupId, ValidationError};
