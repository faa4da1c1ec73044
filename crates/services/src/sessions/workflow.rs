use std::sync::Arc;
use tracing::info;

use review_core::model::{Language, SessionKey};
use review_core::time::Clock;
use storage::repository::Storage;

use super::queries::ManifestLoader;
use super::store::ReviewStore;
use super::view::{OutcomeSink, PersistErrorHandler, ReviewSession};
use crate::error::SessionError;
use crate::review_service::{ReviewRecorder, ReviewService};

/// Orchestrates opening a day's review session from storage.
#[derive(Clone)]
pub struct ReviewSessionService {
    clock: Clock,
    storage: Storage,
    sink: Option<Arc<dyn OutcomeSink>>,
    on_persist_error: Option<PersistErrorHandler>,
    shuffle_new: bool,
}

impl ReviewSessionService {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage) -> Self {
        Self {
            clock,
            storage,
            sink: None,
            on_persist_error: None,
            shuffle_new: false,
        }
    }

    #[must_use]
    pub fn with_shuffle_new(mut self, shuffle_new: bool) -> Self {
        self.shuffle_new = shuffle_new;
        self
    }

    /// Replace the default `ReviewRecorder` sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_persist_error_handler(mut self, handler: PersistErrorHandler) -> Self {
        self.on_persist_error = Some(handler);
        self
    }

    /// Today's session key for a language, by this service's clock.
    #[must_use]
    pub fn today(&self, language: Language) -> SessionKey {
        SessionKey::new(language, self.clock.today())
    }

    /// Load the manifest for `key` and open a session on it.
    ///
    /// Returns `Ok(None)` when nothing is due; the store is never
    /// initialised with an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures and
    /// `SessionError::Review` if the deck's scheduler cannot be built.
    pub async fn start_session(&self, key: SessionKey) -> Result<Option<ReviewSession>, SessionError> {
        let loaded = ManifestLoader::new(
            Arc::clone(&self.storage.decks),
            Arc::clone(&self.storage.cards),
            Arc::clone(&self.storage.manifests),
            Arc::clone(&self.storage.reviews),
        )
        .with_shuffle_new(self.shuffle_new)
        .load(&key, self.clock.now())
        .await?;

        if loaded.is_empty() {
            info!(%key, "nothing due");
            return Ok(None);
        }

        let mut store = ReviewStore::with_outcomes(key, loaded.outcomes);
        store.init(loaded.manifest, key)?;

        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => self.default_sink(&key).await?,
        };

        let mut session = ReviewSession::new(store, sink, self.clock);
        if let Some(handler) = &self.on_persist_error {
            session = session.with_persist_error_handler(Arc::clone(handler));
        }

        let snapshot = session.store().snapshot();
        info!(
            %key,
            total = snapshot.total,
            graded = snapshot.graded,
            cursor = snapshot.cursor,
            "review session started"
        );
        Ok(Some(session))
    }

    async fn default_sink(&self, key: &SessionKey) -> Result<Arc<dyn OutcomeSink>, SessionError> {
        let service = match self.storage.decks.get_deck(key.language).await? {
            Some(deck) => ReviewService::for_deck(&deck)?,
            None => ReviewService::new()?,
        };
        Ok(Arc::new(ReviewRecorder::new(service, self.storage.clone())))
    }
}
