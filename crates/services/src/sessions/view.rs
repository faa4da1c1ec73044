use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use review_core::model::{CardId, ReviewGrade, ReviewOutcome, SessionKey};
use review_core::time::Clock;

use super::progress::{CompletionStatus, ReviewSnapshot};
use super::store::ReviewStore;
use crate::error::SessionError;

/// Durable destination for graded outcomes.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Write one outcome. Must be an idempotent upsert keyed by
    /// `(language, day, card)`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the write fails.
    async fn persist_outcome(
        &self,
        key: SessionKey,
        outcome: ReviewOutcome,
    ) -> Result<(), SessionError>;
}

/// Called with the outcome whose background write failed.
pub type PersistErrorHandler = Arc<dyn Fn(&ReviewOutcome, &SessionError) + Send + Sync>;

/// Reveal phase of the card under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardFace {
    /// Prompt only.
    #[default]
    Hidden,
    /// Prompt and answer; grading is allowed.
    Revealed,
}

/// One learner's pass through a day's manifest.
///
/// Grades land in the store synchronously and are written to the sink in the
/// background. A failed write is reported but the in-memory grade stays, so
/// the learner is never blocked. Grading the card again retries the write.
pub struct ReviewSession {
    store: ReviewStore,
    face: CardFace,
    clock: Clock,
    sink: Arc<dyn OutcomeSink>,
    on_persist_error: Option<PersistErrorHandler>,
}

impl ReviewSession {
    #[must_use]
    pub fn new(store: ReviewStore, sink: Arc<dyn OutcomeSink>, clock: Clock) -> Self {
        Self {
            store,
            face: CardFace::Hidden,
            clock,
            sink,
            on_persist_error: None,
        }
    }

    #[must_use]
    pub fn with_persist_error_handler(mut self, handler: PersistErrorHandler) -> Self {
        self.on_persist_error = Some(handler);
        self
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.store.key()
    }

    #[must_use]
    pub fn store(&self) -> &ReviewStore {
        &self.store
    }

    #[must_use]
    pub fn face(&self) -> CardFace {
        self.face
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&CardId> {
        self.store.current_card()
    }

    #[must_use]
    pub fn status(&self) -> CompletionStatus {
        self.store.completion_status()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReviewSnapshot> {
        self.store.subscribe()
    }

    /// Show the answer of the current card. Does nothing at the end.
    pub fn reveal(&mut self) {
        if self.current_card().is_some() {
            self.face = CardFace::Revealed;
        }
    }

    pub fn next(&mut self) {
        self.store.goto_next();
        self.face = CardFace::Hidden;
    }

    pub fn previous(&mut self) {
        self.store.goto_previous();
        self.face = CardFace::Hidden;
    }

    pub fn goto(&mut self, index: usize) {
        self.store.goto_index(index);
        self.face = CardFace::Hidden;
    }

    /// Start another pass over the ungraded and `Again` cards once the end is
    /// reached. Returns whether there was anything to resume.
    pub fn resume(&mut self) -> bool {
        self.face = CardFace::Hidden;
        self.store.resume_pass()
    }

    /// Decline the extra pass that `resume` would start. Ungraded cards are
    /// declined first, then `Again` cards. Returns whether a pass was declined.
    pub fn skip_pass(&mut self) -> bool {
        self.face = CardFace::Hidden;
        self.store.skip_pass()
    }

    /// Grade the revealed card, then advance to the next card needing work.
    ///
    /// Every grade is sent to the sink, even when it matches the grade already
    /// held in memory, so grading a card again retries a write that failed.
    /// The sink upserts by `(language, day, card)`, which makes the resend
    /// harmless when the earlier write did land. The write runs on the current
    /// tokio runtime; dropping the returned handle leaves it running.
    ///
    /// # Errors
    ///
    /// - `SessionError::AnswerHidden` if the answer is not revealed
    /// - `SessionError::NoRuntime` outside a tokio runtime (nothing is recorded)
    pub fn grade(&mut self, grade: ReviewGrade) -> Result<JoinHandle<()>, SessionError> {
        if self.face != CardFace::Revealed {
            return Err(SessionError::AnswerHidden);
        }
        let card_id = self
            .current_card()
            .cloned()
            .ok_or(SessionError::NotInitialized)?;
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let outcome = ReviewOutcome::new(card_id, grade, self.clock.now());
        // an unchanged grade keeps the earlier timestamp in memory
        let outcome = if self.store.record_outcome(outcome.clone())? {
            outcome
        } else {
            self.store
                .outcome(&outcome.card_id)
                .cloned()
                .unwrap_or(outcome)
        };

        self.face = CardFace::Hidden;
        self.store.goto_next_valid();

        let key = self.store.key();
        let sink = Arc::clone(&self.sink);
        let handler = self.on_persist_error.clone();
        Ok(runtime.spawn(async move {
            if let Err(err) = sink.persist_outcome(key, outcome.clone()).await {
                warn!(%key, card = %outcome.card_id, error = %err, "failed to persist review outcome");
                if let Some(handler) = handler {
                    handler(&outcome, &err);
                }
            }
        }))
    }
}
