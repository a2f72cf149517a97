//! The boundary to outside fitness platforms.

use std::future::Future;

use thiserror::Error;

use crate::exercise::NewExercise;

/// Why a source could not produce records.
///
/// Every variant means "nothing was fetched"; none of them is the same as a
/// successful fetch that returned zero records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The platform could not be reached.
    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },
    /// The platform refused access (missing or revoked permission).
    #[error("source access not authorized")]
    Unauthorized,
    /// The platform answered with something that could not be read.
    #[error("invalid source payload: {0}")]
    InvalidPayload(String),
}

/// Supplies candidate exercises pulled from an outside platform.
pub trait ExternalSource {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Fetches candidate records. An empty list is a successful fetch.
    fn fetch(&self) -> impl Future<Output = Result<Vec<NewExercise>, SourceError>> + Send;
}
