#![forbid(unsafe_code)]

pub mod error;
pub mod review_service;
pub mod sessions;

pub use review_core::Clock;

pub use error::{ReviewServiceError, SessionError};
pub use review_service::{PersistedReview, ReviewRecorder, ReviewService};

pub use sessions::{
    CardFace, CompletionStatus, LoadedReview, ManifestBuilder, ManifestLoader, OutcomeSink,
    ReviewSession, ReviewSessionService, ReviewSnapshot, ReviewStage, ReviewStore, SkippedPasses,
};
