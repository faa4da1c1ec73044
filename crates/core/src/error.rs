use thiserror::Error;

use crate::model::{CardError, DeckError, ReviewError, SessionKeyError};
use crate::scheduler::SchedulerError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    SessionKey(#[from] SessionKeyError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
