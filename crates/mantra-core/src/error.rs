//! Errors reported by the conflict engine.

use thiserror::Error;

use crate::source::SourceError;
use crate::types::{ExerciseId, GroupId, ValidationError};

/// Conflict engine errors.
///
/// Every variant means the operation left the store as it was, except
/// [`EngineError::Store`], where the last committed write still stands.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The exercise was rejected before touching the store.
    #[error("invalid exercise: {0}")]
    Validation(#[from] ValidationError),
    /// The external source could not be read; nothing was merged.
    #[error("sync skipped: {0}")]
    SourceUnavailable(#[source] SourceError),
    /// No stored exercise has this ID.
    #[error("exercise {id} not found")]
    ExerciseNotFound { id: ExerciseId },
    /// No live exercise carries this conflict group ID.
    #[error("conflict group {group_id} not found")]
    GroupNotFound { group_id: GroupId },
    /// The exercise exists but is not part of the named group.
    #[error("exercise {id} is not in conflict group {group_id}")]
    NotInGroup { id: ExerciseId, group_id: GroupId },
    /// The underlying store failed.
    #[error("store failure: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }

    /// Whether the target of the operation no longer exists.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ExerciseNotFound { .. } | Self::GroupNotFound { .. } | Self::NotInGroup { .. }
        )
    }
}
