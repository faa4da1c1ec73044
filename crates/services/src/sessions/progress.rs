//! Counts, stage and completion status derived from a session's manifest,
//! outcomes and cursor. Nothing here is stored.

use std::collections::HashMap;

use review_core::model::{CardId, ReviewManifest, ReviewOutcome};

pub type OutcomeMap = HashMap<CardId, ReviewOutcome>;

fn is_again(outcomes: &OutcomeMap, id: &CardId) -> bool {
    outcomes.get(id).is_some_and(ReviewOutcome::is_again)
}

fn is_ungraded(outcomes: &OutcomeMap, id: &CardId) -> bool {
    !outcomes.contains_key(id)
}

/// Cards whose latest grade is `Again`.
#[must_use]
pub fn count_again(manifest: &ReviewManifest, outcomes: &OutcomeMap) -> usize {
    manifest.iter().filter(|id| is_again(outcomes, id)).count()
}

/// Cards with no outcome at all, wherever the cursor is.
#[must_use]
pub fn count_ungraded(manifest: &ReviewManifest, outcomes: &OutcomeMap) -> usize {
    manifest.iter().filter(|id| is_ungraded(outcomes, id)).count()
}

/// Cards with an outcome. Always `len - count_ungraded`.
#[must_use]
pub fn count_graded(manifest: &ReviewManifest, outcomes: &OutcomeMap) -> usize {
    manifest.len() - count_ungraded(manifest, outcomes)
}

/// Ungraded cards the cursor has already moved past.
#[must_use]
pub fn count_passed_over_ungraded(
    manifest: &ReviewManifest,
    outcomes: &OutcomeMap,
    cursor: usize,
) -> usize {
    manifest
        .iter()
        .take(cursor)
        .filter(|id| is_ungraded(outcomes, id))
        .count()
}

/// First ungraded index strictly after `cursor`.
///
/// With the cursor at the end of the manifest the scan restarts from 0, so a
/// finished pass can pick up the gaps it left behind.
#[must_use]
pub fn next_ungraded_index(
    manifest: &ReviewManifest,
    outcomes: &OutcomeMap,
    cursor: usize,
) -> Option<usize> {
    let start = if cursor >= manifest.len() { 0 } else { cursor + 1 };
    (start..manifest.len())
        .find(|&i| manifest.get(i).is_some_and(|id| is_ungraded(outcomes, id)))
}

/// First `Again` card in a circular scan starting at `(cursor + 1) % len`.
/// Every index is visited once, including the cursor itself last. From the
/// end of a pass the scan therefore starts at index 1 and checks index 0
/// last; use `first_needing_work_index` to search from the top.
#[must_use]
pub fn next_again_index(
    manifest: &ReviewManifest,
    outcomes: &OutcomeMap,
    cursor: usize,
) -> Option<usize> {
    let len = manifest.len();
    if len == 0 {
        return None;
    }
    let start = (cursor + 1) % len;
    (0..len)
        .map(|k| (start + k) % len)
        .find(|&i| manifest.get(i).is_some_and(|id| is_again(outcomes, id)))
}

/// First card that is ungraded or graded `Again`.
#[must_use]
pub fn first_needing_work_index(manifest: &ReviewManifest, outcomes: &OutcomeMap) -> Option<usize> {
    first_open_index(manifest, outcomes, SkippedPasses::default())
}

/// First card still owed a pass once `skipped` passes are left out.
#[must_use]
pub fn first_open_index(
    manifest: &ReviewManifest,
    outcomes: &OutcomeMap,
    skipped: SkippedPasses,
) -> Option<usize> {
    manifest.iter().position(|id| skipped.wants(outcomes, id))
}

//
// ─── SKIPPED PASSES ────────────────────────────────────────────────────────────
//

/// Extra passes the learner declined at the end of the manifest.
///
/// Declining only changes what counts as finished for the day. Outcomes are
/// untouched, and declined cards come back in a later day's manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkippedPasses {
    /// Cards left without a grade are not revisited today.
    pub ungraded: bool,
    /// `Again` cards are not retried today.
    pub again: bool,
}

impl SkippedPasses {
    fn wants(self, outcomes: &OutcomeMap, id: &CardId) -> bool {
        (!self.ungraded && is_ungraded(outcomes, id)) || (!self.again && is_again(outcomes, id))
    }
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    /// Some cards have not been graded yet.
    FirstPass,
    /// Every card is graded, some with `Again`.
    AgainPass,
    Complete,
}

#[must_use]
pub fn review_stage(manifest: &ReviewManifest, outcomes: &OutcomeMap) -> ReviewStage {
    if count_ungraded(manifest, outcomes) > 0 {
        ReviewStage::FirstPass
    } else if count_again(manifest, outcomes) > 0 {
        ReviewStage::AgainPass
    } else {
        ReviewStage::Complete
    }
}

/// Where the stage-aware "next" lands: the next ungraded card during the
/// first pass, the next `Again` card afterwards, the end otherwise.
/// A skipped pass is stepped over.
#[must_use]
pub fn next_valid_index(
    manifest: &ReviewManifest,
    outcomes: &OutcomeMap,
    cursor: usize,
    skipped: SkippedPasses,
) -> usize {
    let next = match review_stage(manifest, outcomes) {
        ReviewStage::FirstPass if !skipped.ungraded => {
            next_ungraded_index(manifest, outcomes, cursor)
        }
        ReviewStage::FirstPass | ReviewStage::AgainPass if !skipped.again => {
            next_again_index(manifest, outcomes, cursor)
        }
        _ => None,
    };
    next.unwrap_or(manifest.len())
}

//
// ─── COMPLETION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    NothingDue,
    InProgress {
        reviewed: usize,
        total: usize,
    },
    NeedsAnotherPass {
        ungraded: usize,
        again: usize,
        resume_at: usize,
    },
    Complete,
}

impl CompletionStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NothingDue | Self::Complete)
    }
}

#[must_use]
pub fn completion_status(
    manifest: &ReviewManifest,
    outcomes: &OutcomeMap,
    cursor: usize,
    skipped: SkippedPasses,
) -> CompletionStatus {
    let total = manifest.len();
    if total == 0 {
        return CompletionStatus::NothingDue;
    }
    if cursor < total {
        return CompletionStatus::InProgress {
            reviewed: count_graded(manifest, outcomes),
            total,
        };
    }
    match first_open_index(manifest, outcomes, skipped) {
        None => CompletionStatus::Complete,
        Some(resume_at) => CompletionStatus::NeedsAnotherPass {
            ungraded: if skipped.ungraded { 0 } else { count_ungraded(manifest, outcomes) },
            again: if skipped.again { 0 } else { count_again(manifest, outcomes) },
            resume_at,
        },
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Observable summary of a review store, published on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSnapshot {
    pub initialized: bool,
    pub cursor: usize,
    pub total: usize,
    pub graded: usize,
    pub again: usize,
    pub stage: ReviewStage,
}

impl ReviewSnapshot {
    #[must_use]
    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            cursor: 0,
            total: 0,
            graded: 0,
            again: 0,
            stage: ReviewStage::FirstPass,
        }
    }

    #[must_use]
    pub fn capture(manifest: &ReviewManifest, outcomes: &OutcomeMap, cursor: usize) -> Self {
        Self {
            initialized: true,
            cursor,
            total: manifest.len(),
            graded: count_graded(manifest, outcomes),
            again: count_again(manifest, outcomes),
            stage: review_stage(manifest, outcomes),
        }
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.initialized && self.cursor == self.total
    }
}
