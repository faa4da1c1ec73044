use std::collections::HashMap;

use tokio::sync::watch;
use tracing::debug;

use review_core::model::{CardId, ReviewManifest, ReviewOutcome, SessionKey};

use super::progress::{self, CompletionStatus, OutcomeMap, ReviewSnapshot, SkippedPasses};
use crate::error::SessionError;

/// In-memory state of one day's review session.
///
/// The store is synchronous and owned by a single session. It tracks the
/// manifest, a cursor in `0..=len` (where `len` means the pass is finished)
/// and the latest outcome per card. Stage and counts are derived on demand.
///
/// Navigation before `init` and out-of-range jumps are silent no-ops.
#[derive(Debug)]
pub struct ReviewStore {
    key: SessionKey,
    manifest: Option<ReviewManifest>,
    cursor: usize,
    outcomes: OutcomeMap,
    pending: OutcomeMap,
    skipped: SkippedPasses,
    snapshot: watch::Sender<ReviewSnapshot>,
}

impl ReviewStore {
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        let (snapshot, _) = watch::channel(ReviewSnapshot::uninitialized());
        Self {
            key,
            manifest: None,
            cursor: 0,
            outcomes: HashMap::new(),
            pending: HashMap::new(),
            skipped: SkippedPasses::default(),
            snapshot,
        }
    }

    /// Create a store seeded with outcomes already recorded for the day.
    ///
    /// Seeds are held until `init` and filtered to the manifest there. For a
    /// card graded several times the latest `reviewed_at` wins.
    #[must_use]
    pub fn with_outcomes(key: SessionKey, seed: impl IntoIterator<Item = ReviewOutcome>) -> Self {
        let mut store = Self::new(key);
        for outcome in seed {
            match store.pending.get(&outcome.card_id) {
                Some(existing) if existing.reviewed_at > outcome.reviewed_at => {}
                _ => {
                    store.pending.insert(outcome.card_id.clone(), outcome);
                }
            }
        }
        store
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.key
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.manifest.is_some()
    }

    #[must_use]
    pub fn manifest(&self) -> Option<&ReviewManifest> {
        self.manifest.as_ref()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.manifest.as_ref().map_or(0, ReviewManifest::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Passes declined at the end of the manifest.
    #[must_use]
    pub fn skipped(&self) -> SkippedPasses {
        self.skipped
    }

    #[must_use]
    pub fn completion_status(&self) -> CompletionStatus {
        match &self.manifest {
            Some(manifest) => {
                progress::completion_status(manifest, &self.outcomes, self.cursor, self.skipped)
            }
            None => CompletionStatus::NothingDue,
        }
    }

    #[must_use]
    pub fn outcomes(&self) -> &OutcomeMap {
        &self.outcomes
    }

    #[must_use]
    pub fn outcome(&self, card_id: &CardId) -> Option<&ReviewOutcome> {
        self.outcomes.get(card_id)
    }

    /// Card under the cursor, `None` at the end or before `init`.
    #[must_use]
    pub fn current_card(&self) -> Option<&CardId> {
        self.manifest.as_ref()?.get(self.cursor)
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.is_initialized() && self.cursor == self.len()
    }

    #[must_use]
    pub fn snapshot(&self) -> ReviewSnapshot {
        *self.snapshot.borrow()
    }

    /// Subscribe to snapshot changes. Receivers only wake when a field differs.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ReviewSnapshot> {
        self.snapshot.subscribe()
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Load the manifest and move the cursor to the first ungraded card.
    ///
    /// Re-initialising with the same manifest is a no-op. A different manifest
    /// replaces the current one and keeps only the outcomes whose card is
    /// still present.
    ///
    /// # Errors
    ///
    /// - `SessionError::Empty` for an empty manifest
    /// - `SessionError::KeyMismatch` when `key` is not this store's key
    ///
    /// The state is unchanged in both cases.
    pub fn init(&mut self, manifest: ReviewManifest, key: SessionKey) -> Result<(), SessionError> {
        if key != self.key {
            return Err(SessionError::KeyMismatch {
                expected: self.key,
                actual: key,
            });
        }
        if manifest.is_empty() {
            return Err(SessionError::Empty);
        }
        if self.manifest.as_ref() == Some(&manifest) {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        let mut outcomes = std::mem::take(&mut self.outcomes);
        outcomes.extend(pending);
        outcomes.retain(|id, _| manifest.contains(id));

        self.cursor = manifest
            .iter()
            .position(|id| !outcomes.contains_key(id))
            .unwrap_or(manifest.len());
        self.outcomes = outcomes;
        self.manifest = Some(manifest);
        self.skipped = SkippedPasses::default();

        debug!(key = %self.key, cursor = self.cursor, total = self.len(), "review store initialized");
        self.publish();
        Ok(())
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    pub fn goto_next(&mut self) {
        let target = (self.cursor + 1).min(self.len());
        self.move_to(target);
    }

    pub fn goto_previous(&mut self) {
        let target = self.cursor.saturating_sub(1);
        self.move_to(target);
    }

    /// Jump to `index` when it lies in `0..=len`; otherwise nothing happens.
    pub fn goto_index(&mut self, index: usize) {
        if index <= self.len() {
            self.move_to(index);
        }
    }

    pub fn goto_next_unreviewed(&mut self) {
        if let Some(manifest) = &self.manifest {
            let target = progress::next_ungraded_index(manifest, &self.outcomes, self.cursor)
                .unwrap_or(manifest.len());
            self.move_to(target);
        }
    }

    pub fn goto_next_again(&mut self) {
        if let Some(manifest) = &self.manifest {
            let target = progress::next_again_index(manifest, &self.outcomes, self.cursor)
                .unwrap_or(manifest.len());
            self.move_to(target);
        }
    }

    /// Stage-aware advance used after grading.
    pub fn goto_next_valid(&mut self) {
        if let Some(manifest) = &self.manifest {
            let target = progress::next_valid_index(manifest, &self.outcomes, self.cursor, self.skipped);
            self.move_to(target);
        }
    }

    /// Start another pass from the first ungraded or `Again` card that was
    /// not skipped.
    ///
    /// Only acts when the cursor is at the end and work remains. Returns
    /// whether the cursor moved.
    pub fn resume_pass(&mut self) -> bool {
        if !self.is_at_end() {
            return false;
        }
        let Some(target) = self
            .manifest
            .as_ref()
            .and_then(|m| progress::first_open_index(m, &self.outcomes, self.skipped))
        else {
            return false;
        };
        self.move_to(target);
        true
    }

    /// Decline the next extra pass instead of resuming it.
    ///
    /// Ungraded cards are declined first, then `Again` cards, one pass per
    /// call. Only acts when the cursor is at the end and work remains; the
    /// cursor stays at the end. Returns whether a pass was declined.
    pub fn skip_pass(&mut self) -> bool {
        if !self.is_at_end() {
            return false;
        }
        let CompletionStatus::NeedsAnotherPass { ungraded, again, .. } = self.completion_status()
        else {
            return false;
        };
        if ungraded > 0 {
            self.skipped.ungraded = true;
        } else {
            self.skipped.again = true;
        }
        debug!(key = %self.key, ungraded, again, "extra pass skipped");
        true
    }

    fn move_to(&mut self, target: usize) {
        if self.manifest.is_none() || target == self.cursor {
            return;
        }
        debug!(key = %self.key, from = self.cursor, to = target, "cursor moved");
        self.cursor = target;
        self.publish();
    }

    //
    // ─── RECORDING ─────────────────────────────────────────────────────────────
    //

    /// Upsert the outcome for its card. Never moves the cursor.
    ///
    /// Returns `Ok(false)` when the card already holds the same grade; the
    /// stored outcome is left untouched in that case.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotInitialized` before `init`
    /// - `SessionError::UnknownCard` for a card outside the manifest
    pub fn record_outcome(&mut self, outcome: ReviewOutcome) -> Result<bool, SessionError> {
        let manifest = self.manifest.as_ref().ok_or(SessionError::NotInitialized)?;
        if !manifest.contains(&outcome.card_id) {
            return Err(SessionError::UnknownCard(outcome.card_id));
        }
        if self
            .outcomes
            .get(&outcome.card_id)
            .is_some_and(|existing| existing.grade == outcome.grade)
        {
            return Ok(false);
        }

        debug!(
            key = %self.key,
            card = %outcome.card_id,
            grade = outcome.grade.label(),
            "outcome recorded"
        );
        self.outcomes.insert(outcome.card_id.clone(), outcome);
        self.publish();
        Ok(true)
    }

    fn publish(&self) {
        let Some(manifest) = &self.manifest else {
            return;
        };
        let next = ReviewSnapshot::capture(manifest, &self.outcomes, self.cursor);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::progress::{ReviewStage, count_again};
    use chrono::Duration;
    use review_core::model::{Language, ReviewDay, ReviewGrade};
    use review_core::time::fixed_now;

    fn key() -> SessionKey {
        SessionKey::new("hin".parse().unwrap(), ReviewDay::from_local(&fixed_now()))
    }

    fn manifest(ids: &[&str]) -> ReviewManifest {
        ids.iter().map(|s| CardId::new(*s)).collect()
    }

    fn outcome(id: &str, grade: ReviewGrade) -> ReviewOutcome {
        ReviewOutcome::new(CardId::new(id), grade, fixed_now())
    }

    fn active(ids: &[&str]) -> ReviewStore {
        let mut store = ReviewStore::new(key());
        store.init(manifest(ids), key()).unwrap();
        store
    }

    #[test]
    fn walkthrough_first_pass_then_again() {
        let mut store = active(&["a", "b", "c"]);
        assert_eq!(store.cursor(), 0);

        store.record_outcome(outcome("a", ReviewGrade::Good)).unwrap();
        store.goto_next();
        assert_eq!(store.cursor(), 1);

        store.record_outcome(outcome("b", ReviewGrade::Again)).unwrap();
        store.goto_next();
        store.record_outcome(outcome("c", ReviewGrade::Hard)).unwrap();
        store.goto_next();
        assert_eq!(store.cursor(), 3);
        assert!(store.is_at_end());

        let m = store.manifest().unwrap();
        assert_eq!(count_again(m, store.outcomes()), 1);

        store.goto_next_again();
        assert_eq!(store.cursor(), 1);
        assert_eq!(store.current_card(), Some(&CardId::new("b")));
    }

    #[test]
    fn init_rejects_empty_manifest_and_stays_uninitialized() {
        let mut store = ReviewStore::new(key());
        let err = store.init(ReviewManifest::empty(), key()).unwrap_err();
        assert!(matches!(err, SessionError::Empty));
        assert!(!store.is_initialized());
        assert!(!store.snapshot().initialized);
    }

    #[test]
    fn init_rejects_other_session_key() {
        let mut store = ReviewStore::new(key());
        let other = SessionKey::new("spa".parse::<Language>().unwrap(), key().day);
        let err = store.init(manifest(&["a"]), other).unwrap_err();
        assert!(matches!(err, SessionError::KeyMismatch { .. }));
        assert!(!store.is_initialized());
    }

    #[test]
    fn seeded_outcomes_place_cursor_at_first_gap() {
        let mut store = ReviewStore::with_outcomes(
            key(),
            [
                outcome("a", ReviewGrade::Good),
                outcome("c", ReviewGrade::Good),
                outcome("zzz", ReviewGrade::Good),
            ],
        );
        store.init(manifest(&["a", "b", "c"]), key()).unwrap();

        assert_eq!(store.cursor(), 1);
        assert_eq!(store.outcomes().len(), 2);
        assert!(store.outcome(&CardId::new("zzz")).is_none());
    }

    #[test]
    fn fully_seeded_store_starts_at_end() {
        let mut store = ReviewStore::with_outcomes(
            key(),
            [outcome("a", ReviewGrade::Good), outcome("b", ReviewGrade::Easy)],
        );
        store.init(manifest(&["a", "b"]), key()).unwrap();
        assert!(store.is_at_end());
        assert_eq!(store.current_card(), None);
    }

    #[test]
    fn later_seed_wins() {
        let early = outcome("a", ReviewGrade::Again);
        let mut late = outcome("a", ReviewGrade::Good);
        late.reviewed_at = fixed_now() + Duration::minutes(5);

        let mut store = ReviewStore::with_outcomes(key(), [late, early]);
        store.init(manifest(&["a", "b"]), key()).unwrap();
        assert_eq!(
            store.outcome(&CardId::new("a")).map(|o| o.grade),
            Some(ReviewGrade::Good)
        );
    }

    #[test]
    fn reinit_is_idempotent_and_preserves_surviving_outcomes() {
        let mut store = active(&["a", "b", "c"]);
        store.record_outcome(outcome("a", ReviewGrade::Good)).unwrap();
        store.record_outcome(outcome("b", ReviewGrade::Good)).unwrap();
        store.goto_index(2);

        store.init(manifest(&["a", "b", "c"]), key()).unwrap();
        assert_eq!(store.cursor(), 2);

        store.init(manifest(&["b", "d"]), key()).unwrap();
        assert_eq!(store.outcomes().len(), 1);
        assert!(store.outcome(&CardId::new("b")).is_some());
        assert_eq!(store.cursor(), 1);
    }

    #[test]
    fn navigation_clamps_and_round_trips() {
        let mut store = active(&["a", "b", "c"]);
        store.goto_previous();
        assert_eq!(store.cursor(), 0);

        store.goto_next();
        store.goto_previous();
        assert_eq!(store.cursor(), 0);

        store.goto_index(3);
        store.goto_next();
        assert_eq!(store.cursor(), 3);

        store.goto_index(4);
        assert_eq!(store.cursor(), 3);
        store.goto_index(1);
        assert_eq!(store.cursor(), 1);
    }

    #[test]
    fn next_then_previous_returns_to_every_interior_cursor() {
        let ids = ["a", "b", "c", "d"];
        let mut store = active(&ids);
        for start in 0..ids.len() {
            store.goto_index(start);
            store.goto_next();
            assert_eq!(store.cursor(), start + 1);
            store.goto_previous();
            assert_eq!(store.cursor(), start);
        }

        // at the end, next is clamped so the round trip lands one short
        store.goto_index(ids.len());
        store.goto_next();
        assert_eq!(store.cursor(), ids.len());
        store.goto_previous();
        assert_eq!(store.cursor(), ids.len() - 1);
    }

    #[test]
    fn next_again_from_interior_cursor_wraps_past_the_end() {
        let mut store = active(&["a", "b", "c", "d"]);
        store.record_outcome(outcome("a", ReviewGrade::Again)).unwrap();
        store.record_outcome(outcome("b", ReviewGrade::Good)).unwrap();
        store.record_outcome(outcome("c", ReviewGrade::Good)).unwrap();
        store.record_outcome(outcome("d", ReviewGrade::Hard)).unwrap();

        store.goto_index(2);
        store.goto_next_again();
        assert_eq!(store.cursor(), 0);

        // only the cursor's own card is again: it is found last
        store.goto_next_again();
        assert_eq!(store.cursor(), 0);

        store.record_outcome(outcome("a", ReviewGrade::Good)).unwrap();
        store.goto_next_again();
        assert_eq!(store.cursor(), 4);
        assert!(store.is_at_end());
    }

    #[test]
    fn navigation_before_init_is_a_no_op() {
        let mut store = ReviewStore::new(key());
        store.goto_next();
        store.goto_index(0);
        store.goto_next_again();
        assert_eq!(store.cursor(), 0);
        assert!(!store.resume_pass());
    }

    #[test]
    fn record_outcome_is_idempotent_and_does_not_move_cursor() {
        let mut store = active(&["a", "b"]);
        assert!(store.record_outcome(outcome("a", ReviewGrade::Good)).unwrap());

        let mut again = outcome("a", ReviewGrade::Good);
        again.reviewed_at = fixed_now() + Duration::minutes(1);
        assert!(!store.record_outcome(again).unwrap());
        assert_eq!(
            store.outcome(&CardId::new("a")).unwrap().reviewed_at,
            fixed_now()
        );

        assert!(store.record_outcome(outcome("a", ReviewGrade::Again)).unwrap());
        assert_eq!(store.cursor(), 0);
    }

    #[test]
    fn record_outcome_rejects_unknown_card_and_uninitialized_store() {
        let mut store = ReviewStore::new(key());
        let err = store.record_outcome(outcome("a", ReviewGrade::Good)).unwrap_err();
        assert!(matches!(err, SessionError::NotInitialized));

        store.init(manifest(&["a"]), key()).unwrap();
        let err = store.record_outcome(outcome("x", ReviewGrade::Good)).unwrap_err();
        assert!(matches!(err, SessionError::UnknownCard(id) if id == CardId::new("x")));
    }

    #[test]
    fn next_unreviewed_restarts_only_from_the_end() {
        let mut store = active(&["a", "b", "c"]);
        store.record_outcome(outcome("b", ReviewGrade::Good)).unwrap();
        store.goto_index(1);
        store.goto_next_unreviewed();
        assert_eq!(store.cursor(), 2);

        store.record_outcome(outcome("c", ReviewGrade::Good)).unwrap();
        store.goto_next_unreviewed();
        assert_eq!(store.cursor(), 3);

        store.goto_next_unreviewed();
        assert_eq!(store.cursor(), 0);
    }

    #[test]
    fn resume_pass_targets_first_card_needing_work() {
        let mut store = active(&["a", "b", "c"]);
        store.record_outcome(outcome("a", ReviewGrade::Good)).unwrap();
        store.record_outcome(outcome("b", ReviewGrade::Good)).unwrap();
        store.record_outcome(outcome("c", ReviewGrade::Again)).unwrap();
        assert!(!store.resume_pass());

        store.goto_index(3);
        assert!(matches!(
            store.completion_status(),
            CompletionStatus::NeedsAnotherPass { resume_at: 2, .. }
        ));
        assert!(store.resume_pass());
        assert_eq!(store.cursor(), 2);
    }

    #[test]
    fn skip_pass_declines_ungraded_then_again_cards() {
        let mut store = active(&["a", "b", "c"]);
        store.record_outcome(outcome("a", ReviewGrade::Again)).unwrap();
        store.goto_next();
        assert!(!store.skip_pass());

        store.goto_index(3);
        assert!(store.skip_pass());
        assert!(store.skipped().ungraded);
        assert_eq!(store.cursor(), 3);
        assert_eq!(
            store.completion_status(),
            CompletionStatus::NeedsAnotherPass {
                ungraded: 0,
                again: 1,
                resume_at: 0
            }
        );

        assert!(store.skip_pass());
        assert!(store.skipped().again);
        assert_eq!(store.completion_status(), CompletionStatus::Complete);
        assert!(!store.skip_pass());
        assert!(!store.resume_pass());
        assert_eq!(store.outcomes().len(), 1);
    }

    #[test]
    fn skipped_ungraded_pass_resumes_at_again_cards_only() {
        let mut store = active(&["a", "b", "c", "d"]);
        store.record_outcome(outcome("b", ReviewGrade::Again)).unwrap();
        store.record_outcome(outcome("d", ReviewGrade::Again)).unwrap();
        store.goto_index(4);

        assert!(store.skip_pass());
        assert!(store.resume_pass());
        assert_eq!(store.cursor(), 1);

        store.record_outcome(outcome("b", ReviewGrade::Good)).unwrap();
        store.goto_next_valid();
        assert_eq!(store.cursor(), 3);
    }

    #[test]
    fn subscribers_see_changes_only() {
        let mut store = active(&["a", "b"]);
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.goto_previous();
        assert!(!rx.has_changed().unwrap());

        store.record_outcome(outcome("a", ReviewGrade::Again)).unwrap();
        assert!(rx.has_changed().unwrap());
        let snap = *rx.borrow_and_update();
        assert_eq!(snap.graded, 1);
        assert_eq!(snap.again, 1);
        assert_eq!(snap.stage, ReviewStage::FirstPass);

        store.goto_next_valid();
        assert_eq!(rx.borrow_and_update().cursor, 1);
    }
}
