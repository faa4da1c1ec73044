//! Shared error types for the services crate.

use thiserror::Error;

use review_core::model::{CardId, SessionKey};
use review_core::scheduler::SchedulerError;
use storage::repository::StorageError;

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the review session store, view and loader.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no cards to review")]
    Empty,
    #[error("review session has not been initialized")]
    NotInitialized,
    #[error("session key mismatch: store is {expected}, got {actual}")]
    KeyMismatch {
        expected: SessionKey,
        actual: SessionKey,
    },
    #[error("card {0} is not part of today's manifest")]
    UnknownCard(CardId),
    #[error("answer must be revealed before grading")]
    AnswerHidden,
    #[error("no async runtime available to persist outcomes")]
    NoRuntime,
    #[error(transparent)]
    Review(#[from] ReviewServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
