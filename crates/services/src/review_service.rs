use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use review_core::{
    model::{Card, Deck, ReviewGrade, ReviewOutcome, SessionKey},
    scheduler::{AppliedReview, MemoryState, Schedule, Scheduler, elapsed_days},
};
use storage::repository::{
    CardRepository, ReviewPersistence, ReviewRecord, ReviewRepository, Storage,
};

use crate::error::{ReviewServiceError, SessionError};
use crate::sessions::OutcomeSink;

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Result of a persisted review: updated card, stored record and the chosen
/// schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedReview {
    pub card: Card,
    pub record: ReviewRecord,
    pub schedule: Schedule,
}

/// Memory state a grade is scheduled from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    memory: Option<MemoryState>,
    last_review_at: Option<DateTime<Utc>>,
}

impl Baseline {
    fn of_card(card: &Card) -> Self {
        Self {
            memory: card.memory_state().copied(),
            last_review_at: card.last_review_at(),
        }
    }

    fn of_record(record: &ReviewRecord) -> Self {
        Self {
            memory: record.prior_memory(),
            last_review_at: record.prior_review_at,
        }
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Applies a learner's grade to a card with the FSRS scheduler and writes the
/// result to storage.
///
/// Holds only the desired retention; an FSRS scheduler is built for each
/// grade so the service can be shared across tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewService {
    desired_retention: f32,
}

impl ReviewService {
    /// Create a review service at the default desired retention.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Scheduler` if the underlying scheduler fails to initialize.
    pub fn new() -> Result<Self, ReviewServiceError> {
        Self::with_retention(Scheduler::DEFAULT_RETENTION)
    }

    /// Create a review service scheduling at the deck's desired retention.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Scheduler` if the retention is rejected.
    pub fn for_deck(deck: &Deck) -> Result<Self, ReviewServiceError> {
        Self::with_retention(deck.settings().desired_retention())
    }

    /// # Errors
    ///
    /// Returns `ReviewServiceError::Scheduler` if the retention is rejected.
    pub fn with_retention(desired_retention: f32) -> Result<Self, ReviewServiceError> {
        // fail early rather than on the first grade
        Scheduler::try_with_retention(desired_retention)?;
        Ok(Self { desired_retention })
    }

    #[must_use]
    pub fn desired_retention(&self) -> f32 {
        self.desired_retention
    }

    fn schedule_from(
        &self,
        card: &Card,
        baseline: Baseline,
        grade: ReviewGrade,
        reviewed_at: DateTime<Utc>,
    ) -> Result<AppliedReview, ReviewServiceError> {
        let elapsed = elapsed_days(baseline.last_review_at, reviewed_at);
        let scheduler = Scheduler::try_with_retention(self.desired_retention)?;
        Ok(scheduler.apply_review(
            card.id().clone(),
            baseline.memory.as_ref(),
            grade,
            reviewed_at,
            elapsed,
        )?)
    }

    /// Apply a grade to an in-memory card from its current memory state.
    ///
    /// # Errors
    ///
    /// Propagates scheduler errors, e.g. a review time before the card's last review.
    pub fn review_card(
        &self,
        card: &mut Card,
        grade: ReviewGrade,
        reviewed_at: DateTime<Utc>,
    ) -> Result<AppliedReview, ReviewServiceError> {
        let applied = self.schedule_from(card, Baseline::of_card(card), grade, reviewed_at)?;
        card.apply_review(applied.memory, reviewed_at);
        Ok(applied)
    }

    /// Persist one session outcome.
    ///
    /// The grade is scheduled from the card's memory state before the day's
    /// first review, so re-grading a card on the same day replaces the earlier
    /// grade instead of compounding it. Returns `None` when the stored grade
    /// for the card already equals `outcome.grade`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card is missing, scheduler errors
    /// for invalid elapsed time, and storage errors if persistence fails.
    pub async fn persist_outcome(
        &self,
        key: &SessionKey,
        outcome: &ReviewOutcome,
        cards: &dyn CardRepository,
        reviews: &dyn ReviewRepository,
        persistence: &dyn ReviewPersistence,
    ) -> Result<Option<PersistedReview>, ReviewServiceError> {
        let existing = reviews.get_review(key, &outcome.card_id).await?;
        if existing.as_ref().is_some_and(|r| r.grade == outcome.grade) {
            debug!(%key, card = %outcome.card_id, "grade unchanged, skipping write");
            return Ok(None);
        }

        let mut card = cards.get_card(key.language, &outcome.card_id).await?;
        let baseline = existing
            .as_ref()
            .map_or_else(|| Baseline::of_card(&card), Baseline::of_record);

        let applied = self.schedule_from(&card, baseline, outcome.grade, outcome.reviewed_at)?;
        card.apply_review(applied.memory, outcome.reviewed_at);

        let record = ReviewRecord {
            key: *key,
            card_id: outcome.card_id.clone(),
            grade: outcome.grade,
            reviewed_at: outcome.reviewed_at,
            retrievability: applied.retrievability,
            stability: applied.memory.stability,
            difficulty: applied.memory.difficulty,
            prior_stability: baseline.memory.map(|m| m.stability),
            prior_difficulty: baseline.memory.map(|m| m.difficulty),
            prior_review_at: baseline.last_review_at,
        };

        persistence.apply_review(&card, record.clone()).await?;

        debug!(
            %key,
            card = %outcome.card_id,
            grade = outcome.grade.label(),
            next_review = %applied.schedule.next_review,
            replaced = existing.is_some(),
            "review persisted"
        );

        Ok(Some(PersistedReview {
            card,
            record,
            schedule: applied.schedule,
        }))
    }
}

//
// ─── OUTCOME SINK ──────────────────────────────────────────────────────────────
//

/// Production `OutcomeSink`: schedules with FSRS and writes through the
/// storage repositories.
#[derive(Clone)]
pub struct ReviewRecorder {
    service: ReviewService,
    storage: Storage,
}

impl ReviewRecorder {
    #[must_use]
    pub fn new(service: ReviewService, storage: Storage) -> Self {
        Self { service, storage }
    }
}

#[async_trait]
impl OutcomeSink for ReviewRecorder {
    async fn persist_outcome(
        &self,
        key: SessionKey,
        outcome: ReviewOutcome,
    ) -> Result<(), SessionError> {
        self.service
            .persist_outcome(
                &key,
                &outcome,
                self.storage.cards.as_ref(),
                self.storage.reviews.as_ref(),
                self.storage.review_persistence.as_ref(),
            )
            .await?;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use review_core::{
        model::{CardId, DeckSettings, Language, ReviewDay},
        scheduler::SchedulerError,
        time::fixed_now,
    };
    use storage::repository::{DeckRepository, InMemoryRepository, StorageError};

    fn lang() -> Language {
        "spa".parse().unwrap()
    }

    fn key() -> SessionKey {
        SessionKey::new(lang(), ReviewDay::from_local(&fixed_now()))
    }

    fn build_card() -> Card {
        Card::new(CardId::new("c1"), lang(), "gato", "cat", fixed_now()).unwrap()
    }

    async fn seeded_repo(card: &Card) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        let deck = Deck::new(lang(), "Spanish", DeckSettings::default(), fixed_now()).unwrap();
        repo.upsert_deck(&deck).await.unwrap();
        repo.upsert_card(card).await.unwrap();
        repo
    }

    fn outcome(grade: ReviewGrade, minutes: i64) -> ReviewOutcome {
        ReviewOutcome::new(
            CardId::new("c1"),
            grade,
            fixed_now() + Duration::minutes(minutes),
        )
    }

    #[test]
    fn review_new_card_sets_memory() {
        let mut card = build_card();
        let service = ReviewService::new().unwrap();

        let applied = service
            .review_card(&mut card, ReviewGrade::Good, fixed_now())
            .unwrap();

        assert_eq!(applied.card_id, *card.id());
        assert_eq!(card.memory_state(), Some(&applied.memory));
        assert_eq!(card.last_review_at(), Some(fixed_now()));
    }

    #[test]
    fn review_with_backdated_timestamp_errors() {
        let mut card = build_card();
        let service = ReviewService::new().unwrap();
        service
            .review_card(&mut card, ReviewGrade::Good, fixed_now())
            .unwrap();

        let err = service
            .review_card(&mut card, ReviewGrade::Good, fixed_now() - Duration::days(1))
            .unwrap_err();

        assert!(matches!(
            err,
            ReviewServiceError::Scheduler(SchedulerError::InvalidElapsedDays { .. })
        ));
    }

    #[tokio::test]
    async fn persist_outcome_writes_card_and_record() {
        let repo = seeded_repo(&build_card()).await;
        let service = ReviewService::new().unwrap();

        let persisted = service
            .persist_outcome(&key(), &outcome(ReviewGrade::Hard, 0), &repo, &repo, &repo)
            .await
            .unwrap()
            .expect("written");

        assert_eq!(persisted.record.grade, ReviewGrade::Hard);
        assert_eq!(persisted.record.prior_stability, None);
        let stored = repo.get_review(&key(), &CardId::new("c1")).await.unwrap();
        assert_eq!(stored, Some(persisted.record));
        let card = repo.get_card(lang(), &CardId::new("c1")).await.unwrap();
        assert!(!card.is_new());
    }

    #[tokio::test]
    async fn same_grade_twice_is_a_no_op() {
        let repo = seeded_repo(&build_card()).await;
        let service = ReviewService::new().unwrap();

        let first = service
            .persist_outcome(&key(), &outcome(ReviewGrade::Good, 0), &repo, &repo, &repo)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = service
            .persist_outcome(&key(), &outcome(ReviewGrade::Good, 3), &repo, &repo, &repo)
            .await
            .unwrap();
        assert!(second.is_none());

        let stored = repo.get_review(&key(), &CardId::new("c1")).await.unwrap().unwrap();
        assert_eq!(stored.reviewed_at, fixed_now());
    }

    #[tokio::test]
    async fn regrade_schedules_from_state_before_first_review() {
        let mut card = build_card();
        card.apply_review(MemoryState::new(10.0, 5.0), fixed_now() - Duration::days(10));
        let repo = seeded_repo(&card).await;
        let service = ReviewService::new().unwrap();

        service
            .persist_outcome(&key(), &outcome(ReviewGrade::Again, 0), &repo, &repo, &repo)
            .await
            .unwrap();
        let regraded = service
            .persist_outcome(&key(), &outcome(ReviewGrade::Again, 1), &repo, &repo, &repo)
            .await
            .unwrap();
        assert!(regraded.is_none());

        let good = service
            .persist_outcome(&key(), &outcome(ReviewGrade::Good, 2), &repo, &repo, &repo)
            .await
            .unwrap()
            .unwrap();

        // a direct Good from the original state gives the same stability
        let mut fresh = card.clone();
        let direct = service
            .review_card(&mut fresh, ReviewGrade::Good, fixed_now() + Duration::minutes(2))
            .unwrap();

        assert_eq!(good.record.prior_stability, Some(10.0));
        assert!((good.record.stability - direct.memory.stability).abs() < 1e-9);
        assert_eq!(
            good.record.prior_review_at,
            Some(fixed_now() - Duration::days(10))
        );
    }

    #[tokio::test]
    async fn missing_card_is_not_found() {
        let repo = InMemoryRepository::new();
        let service = ReviewService::new().unwrap();

        let err = service
            .persist_outcome(&key(), &outcome(ReviewGrade::Good, 0), &repo, &repo, &repo)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn recorder_forwards_to_storage() {
        let repo = seeded_repo(&build_card()).await;
        let recorder = ReviewRecorder::new(
            ReviewService::new().unwrap(),
            Storage::from_repository(repo.clone()),
        );

        recorder
            .persist_outcome(key(), outcome(ReviewGrade::Easy, 0))
            .await
            .unwrap();

        let records = repo.reviews_for_day(&key()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].grade, ReviewGrade::Easy);
    }

    #[test]
    fn rejects_out_of_range_retention() {
        let err = ReviewService::with_retention(1.5).unwrap_err();
        assert!(matches!(
            err,
            ReviewServiceError::Scheduler(SchedulerError::InvalidRetention { .. })
        ));
        let deck = Deck::new(lang(), "Spanish", DeckSettings::new(5, 0.8).unwrap(), fixed_now())
            .unwrap();
        assert!((ReviewService::for_deck(&deck).unwrap().desired_retention() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn recorder_can_be_shared_across_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReviewRecorder>();
    }
}
