use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use review_core::model::{ReviewManifest, ReviewOutcome, SessionKey};
use storage::repository::{CardRepository, DeckRepository, ManifestRepository, ReviewRepository};

use super::plan::ManifestBuilder;
use crate::error::SessionError;

/// Everything needed to open a day's session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedReview {
    pub manifest: ReviewManifest,
    /// Reviews already stored for the day, oldest first, restricted to the
    /// manifest's cards.
    pub outcomes: Vec<ReviewOutcome>,
}

impl LoadedReview {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}

/// Produces the day's manifest and the outcomes already recorded for it.
///
/// The first manifest stored for a session key is reused for the rest of the
/// day, so re-loading mid-session never reorders cards under the cursor.
#[derive(Clone)]
pub struct ManifestLoader {
    decks: Arc<dyn DeckRepository>,
    cards: Arc<dyn CardRepository>,
    manifests: Arc<dyn ManifestRepository>,
    reviews: Arc<dyn ReviewRepository>,
    shuffle_new: bool,
}

impl ManifestLoader {
    #[must_use]
    pub fn new(
        decks: Arc<dyn DeckRepository>,
        cards: Arc<dyn CardRepository>,
        manifests: Arc<dyn ManifestRepository>,
        reviews: Arc<dyn ReviewRepository>,
    ) -> Self {
        Self {
            decks,
            cards,
            manifests,
            reviews,
            shuffle_new: false,
        }
    }

    #[must_use]
    pub fn with_shuffle_new(mut self, shuffle_new: bool) -> Self {
        self.shuffle_new = shuffle_new;
        self
    }

    /// Load (or build and store) the manifest for `key` plus its outcomes.
    ///
    /// An empty manifest is a valid result meaning "nothing to review"; it is
    /// not stored, so cards added later the same day can still be picked up.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn load(
        &self,
        key: &SessionKey,
        now: DateTime<Utc>,
    ) -> Result<LoadedReview, SessionError> {
        let manifest = match self.manifests.get_manifest(key).await? {
            Some(stored) => {
                debug!(%key, total = stored.len(), "reusing stored manifest");
                stored
            }
            None => self.build_and_store(key, now).await?,
        };

        let outcomes = self
            .reviews
            .reviews_for_day(key)
            .await?
            .into_iter()
            .filter(|record| manifest.contains(&record.card_id))
            .map(|record| record.outcome())
            .collect();

        Ok(LoadedReview { manifest, outcomes })
    }

    async fn build_and_store(
        &self,
        key: &SessionKey,
        now: DateTime<Utc>,
    ) -> Result<ReviewManifest, SessionError> {
        let Some(deck) = self.decks.get_deck(key.language).await? else {
            debug!(%key, "no deck for language");
            return Ok(ReviewManifest::empty());
        };

        let cards = self.cards.list_cards(key.language).await?;
        let plan = ManifestBuilder::new(deck.settings())
            .with_shuffle_new(self.shuffle_new)
            .build(cards, now);

        if plan.is_empty() {
            return Ok(plan.manifest);
        }

        let stored = self
            .manifests
            .insert_manifest_if_absent(key, &plan.manifest)
            .await?;
        info!(
            %key,
            due = plan.due_selected,
            new = plan.new_selected,
            total = stored.len(),
            "manifest created"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use review_core::model::{
        Card, CardId, Deck, DeckSettings, Language, ReviewDay, ReviewGrade,
    };
    use review_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ReviewPersistence, ReviewRecord};

    fn lang() -> Language {
        "spa".parse().unwrap()
    }

    fn key() -> SessionKey {
        SessionKey::new(lang(), ReviewDay::from_local(&fixed_now()))
    }

    fn loader(repo: &InMemoryRepository) -> ManifestLoader {
        ManifestLoader::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn seed(repo: &InMemoryRepository, ids: &[&str]) {
        let deck = Deck::new(lang(), "Spanish", DeckSettings::default(), fixed_now()).unwrap();
        repo.upsert_deck(&deck).await.unwrap();
        for (i, id) in ids.iter().enumerate() {
            let created = fixed_now() + Duration::minutes(i64::try_from(i).unwrap());
            let card = Card::new(CardId::new(*id), lang(), "q", "a", created).unwrap();
            repo.upsert_card(&card).await.unwrap();
        }
    }

    #[tokio::test]
    async fn missing_deck_yields_empty_manifest() {
        let repo = InMemoryRepository::new();
        let loaded = loader(&repo).load(&key(), fixed_now()).await.unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.outcomes.is_empty());
    }

    #[tokio::test]
    async fn manifest_is_stable_for_the_day() {
        let repo = InMemoryRepository::new();
        seed(&repo, &["a", "b"]).await;

        let first = loader(&repo).load(&key(), fixed_now()).await.unwrap();
        assert_eq!(first.manifest.len(), 2);

        // a card added later does not change today's manifest
        let late = Card::new(
            CardId::new("c"),
            lang(),
            "q",
            "a",
            fixed_now() - Duration::days(1),
        )
        .unwrap();
        repo.upsert_card(&late).await.unwrap();

        let second = loader(&repo).load(&key(), fixed_now()).await.unwrap();
        assert_eq!(second.manifest, first.manifest);
    }

    #[tokio::test]
    async fn outcomes_are_filtered_to_manifest_cards() {
        let repo = InMemoryRepository::new();
        seed(&repo, &["a", "b"]).await;
        let loaded = loader(&repo).load(&key(), fixed_now()).await.unwrap();

        let stray = Card::new(CardId::new("stray"), lang(), "q", "a", fixed_now()).unwrap();
        repo.upsert_card(&stray).await.unwrap();
        for (id, grade) in [("a", ReviewGrade::Again), ("stray", ReviewGrade::Good)] {
            let card = repo.get_card(lang(), &CardId::new(id)).await.unwrap();
            let record = ReviewRecord {
                key: key(),
                card_id: CardId::new(id),
                grade,
                reviewed_at: fixed_now(),
                retrievability: None,
                stability: 1.0,
                difficulty: 5.0,
                prior_stability: None,
                prior_difficulty: None,
                prior_review_at: None,
            };
            repo.apply_review(&card, record).await.unwrap();
        }

        let reloaded = loader(&repo).load(&key(), fixed_now()).await.unwrap();
        assert_eq!(reloaded.manifest, loaded.manifest);
        assert_eq!(reloaded.outcomes.len(), 1);
        assert_eq!(reloaded.outcomes[0].card_id, CardId::new("a"));
        assert!(reloaded.outcomes[0].is_again());
    }
}
