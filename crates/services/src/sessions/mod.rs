mod plan;
mod progress;
mod queries;
mod store;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use plan::{ManifestBuilder, ManifestPlan};
pub use progress::{
    CompletionStatus, OutcomeMap, ReviewSnapshot, ReviewStage, SkippedPasses, completion_status,
    count_again, count_graded, count_passed_over_ungraded, count_ungraded, first_needing_work_index,
    first_open_index, next_again_index, next_ungraded_index, next_valid_index, review_stage,
};
pub use queries::{LoadedReview, ManifestLoader};
pub use store::ReviewStore;
pub use view::{CardFace, OutcomeSink, PersistErrorHandler, ReviewSession};
pub use workflow::ReviewSessionService;
