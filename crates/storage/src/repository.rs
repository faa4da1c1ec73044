use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_core::model::{
    Card, CardId, Deck, Language, ReviewGrade, ReviewManifest, ReviewOutcome, SessionKey,
};
use review_core::scheduler::MemoryState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted grading of one card within one session.
///
/// There is at most one record per `(language, day, card)`: re-grading the
/// card on the same day replaces it. The `prior_*` fields hold the card's
/// memory state from before the day's first review so that a replacement
/// grade is scheduled from the same starting point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub key: SessionKey,
    pub card_id: CardId,
    pub grade: ReviewGrade,
    pub reviewed_at: DateTime<Utc>,
    pub retrievability: Option<f64>,
    pub stability: f64,
    pub difficulty: f64,
    pub prior_stability: Option<f64>,
    pub prior_difficulty: Option<f64>,
    pub prior_review_at: Option<DateTime<Utc>>,
}

impl ReviewRecord {
    #[must_use]
    pub fn outcome(&self) -> ReviewOutcome {
        ReviewOutcome::new(self.card_id.clone(), self.grade, self.reviewed_at)
    }

    #[must_use]
    pub fn memory(&self) -> MemoryState {
        MemoryState::new(self.stability, self.difficulty)
    }

    /// Memory state the card had before this day's first review.
    #[must_use]
    pub fn prior_memory(&self) -> Option<MemoryState> {
        match (self.prior_stability, self.prior_difficulty) {
            (Some(stability), Some(difficulty)) => Some(MemoryState::new(stability, difficulty)),
            _ => None,
        }
    }
}

/// Repository contract for per-language decks.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Persist or update a deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch the deck for a language, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_deck(&self, language: Language) -> Result<Option<Deck>, StorageError>;
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Persist or update a card with its memory state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the card cannot be stored.
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError>;

    /// Fetch one card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_card(&self, language: Language, id: &CardId) -> Result<Card, StorageError>;

    /// All cards of a language deck, ordered by `(created_at, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_cards(&self, language: Language) -> Result<Vec<Card>, StorageError>;
}

#[async_trait]
pub trait ManifestRepository: Send + Sync {
    /// Fetch the stored manifest for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_manifest(&self, key: &SessionKey) -> Result<Option<ReviewManifest>, StorageError>;

    /// Store `manifest` unless one already exists for `key`, returning
    /// whichever manifest is stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn insert_manifest_if_absent(
        &self,
        key: &SessionKey,
        manifest: &ReviewManifest,
    ) -> Result<ReviewManifest, StorageError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Fetch the day's review record for one card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_review(
        &self,
        key: &SessionKey,
        card_id: &CardId,
    ) -> Result<Option<ReviewRecord>, StorageError>;

    /// All review records for a session, ordered by `reviewed_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn reviews_for_day(&self, key: &SessionKey) -> Result<Vec<ReviewRecord>, StorageError>;
}

/// Atomic write of a graded card: the card's new memory state and the day's
/// review record land together or not at all.
#[async_trait]
pub trait ReviewPersistence: Send + Sync {
    /// Upsert the review record and update the card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the record does not belong to the
    /// card, or other storage errors.
    async fn apply_review(&self, card: &Card, record: ReviewRecord) -> Result<(), StorageError>;
}

type CardKey = (Language, CardId);
type ReviewKey = (SessionKey, CardId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    decks: Arc<Mutex<HashMap<Language, Deck>>>,
    cards: Arc<Mutex<HashMap<CardKey, Card>>>,
    manifests: Arc<Mutex<HashMap<SessionKey, ReviewManifest>>>,
    reviews: Arc<Mutex<HashMap<ReviewKey, ReviewRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut guard = self.decks.lock().map_err(poisoned)?;
        guard.insert(deck.language(), deck.clone());
        Ok(())
    }

    async fn get_deck(&self, language: Language) -> Result<Option<Deck>, StorageError> {
        let guard = self.decks.lock().map_err(poisoned)?;
        Ok(guard.get(&language).cloned())
    }
}

#[async_trait]
impl CardRepository for InMemoryRepository {
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        let mut guard = self.cards.lock().map_err(poisoned)?;
        guard.insert((card.language(), card.id().clone()), card.clone());
        Ok(())
    }

    async fn get_card(&self, language: Language, id: &CardId) -> Result<Card, StorageError> {
        let guard = self.cards.lock().map_err(poisoned)?;
        guard
            .get(&(language, id.clone()))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_cards(&self, language: Language) -> Result<Vec<Card>, StorageError> {
        let guard = self.cards.lock().map_err(poisoned)?;
        let mut cards: Vec<Card> = guard
            .values()
            .filter(|card| card.language() == language)
            .cloned()
            .collect();
        cards.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(cards)
    }
}

#[async_trait]
impl ManifestRepository for InMemoryRepository {
    async fn get_manifest(&self, key: &SessionKey) -> Result<Option<ReviewManifest>, StorageError> {
        let guard = self.manifests.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn insert_manifest_if_absent(
        &self,
        key: &SessionKey,
        manifest: &ReviewManifest,
    ) -> Result<ReviewManifest, StorageError> {
        let mut guard = self.manifests.lock().map_err(poisoned)?;
        Ok(guard.entry(*key).or_insert_with(|| manifest.clone()).clone())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryRepository {
    async fn get_review(
        &self,
        key: &SessionKey,
        card_id: &CardId,
    ) -> Result<Option<ReviewRecord>, StorageError> {
        let guard = self.reviews.lock().map_err(poisoned)?;
        Ok(guard.get(&(*key, card_id.clone())).cloned())
    }

    async fn reviews_for_day(&self, key: &SessionKey) -> Result<Vec<ReviewRecord>, StorageError> {
        let guard = self.reviews.lock().map_err(poisoned)?;
        let mut records: Vec<ReviewRecord> = guard
            .iter()
            .filter(|((k, _), _)| k == key)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| {
            a.reviewed_at
                .cmp(&b.reviewed_at)
                .then_with(|| a.card_id.cmp(&b.card_id))
        });
        Ok(records)
    }
}

#[async_trait]
impl ReviewPersistence for InMemoryRepository {
    async fn apply_review(&self, card: &Card, record: ReviewRecord) -> Result<(), StorageError> {
        if record.card_id != *card.id() || record.key.language != card.language() {
            return Err(StorageError::Conflict);
        }

        // lock order: cards then reviews
        let mut cards = self.cards.lock().map_err(poisoned)?;
        let mut reviews = self.reviews.lock().map_err(poisoned)?;
        cards.insert((card.language(), card.id().clone()), card.clone());
        reviews.insert((record.key, record.card_id.clone()), record);
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn DeckRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub manifests: Arc<dyn ManifestRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub review_persistence: Arc<dyn ReviewPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire one backend that implements every repository trait.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: DeckRepository
            + CardRepository
            + ManifestRepository
            + ReviewRepository
            + ReviewPersistence
            + Clone
            + 'static,
    {
        let decks: Arc<dyn DeckRepository> = Arc::new(repo.clone());
        let cards: Arc<dyn CardRepository> = Arc::new(repo.clone());
        let manifests: Arc<dyn ManifestRepository> = Arc::new(repo.clone());
        let reviews: Arc<dyn ReviewRepository> = Arc::new(repo.clone());
        let review_persistence: Arc<dyn ReviewPersistence> = Arc::new(repo);
        Self {
            decks,
            cards,
            manifests,
            reviews,
            review_persistence,
        }
    }
}
