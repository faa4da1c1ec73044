use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CardId, ReviewGrade};

const SECONDS_PER_DAY: f64 = 86_400.0;

// FSRS power forgetting curve: R(t, S) = (1 + F * t / S) ^ C
const RETRIEVABILITY_F: f64 = 19.0 / 81.0;
const RETRIEVABILITY_C: f64 = -0.5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("FSRS scheduling failed: {0}")]
    FsrsError(String),
    #[error("desired retention must be in (0, 1], got {provided}")]
    InvalidRetention { provided: f32 },
    #[error("elapsed days must be non-negative and finite, got {provided}")]
    InvalidElapsedDays { provided: f64 },
}

//
// ─── FORGETTING CURVE ──────────────────────────────────────────────────────────
//

/// Probability of recalling a card `elapsed_days` after its last review.
///
/// Non-positive stability is treated as fully forgotten.
///
/// ```
/// # use review_core::scheduler::retrievability;
/// assert!((retrievability(0.0, 5.0) - 1.0).abs() < 1e-12);
/// // by construction, R is 0.9 once t == S
/// assert!((retrievability(5.0, 5.0) - 0.9).abs() < 1e-12);
/// ```
#[must_use]
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 || !stability.is_finite() {
        return 0.0;
    }
    (1.0 + RETRIEVABILITY_F * (elapsed_days / stability)).powf(RETRIEVABILITY_C)
}

/// Fractional days between the last review and `at`.
///
/// - Returns `0.0` for cards that were never reviewed.
/// - Returns a negative value if `at` is backdated; the scheduler rejects it.
#[must_use]
pub fn elapsed_days(last_review_at: Option<DateTime<Utc>>, at: DateTime<Utc>) -> f64 {
    match last_review_at {
        Some(last) => {
            let seconds = at.signed_duration_since(last).num_seconds();

            // NOTE: review intervals are bounded to human timescales, so the
            // i64 -> f64 conversion does not lose meaningful precision.
            #[allow(clippy::cast_precision_loss)]
            let seconds_f = seconds as f64;

            seconds_f / SECONDS_PER_DAY
        }
        None => 0.0,
    }
}

//
// ─── MEMORY STATE ──────────────────────────────────────────────────────────────
//

/// Serializable card memory state used by FSRS.
///
/// # Examples
///
/// ```
/// # use review_core::scheduler::MemoryState;
/// let state = MemoryState::new(5.0, 3.5);
/// assert_eq!(state.stability, 5.0);
/// assert_eq!(state.difficulty, 3.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
}

impl MemoryState {
    #[must_use]
    pub fn new(stability: f64, difficulty: f64) -> Self {
        Self {
            stability,
            difficulty,
        }
    }

    #[must_use]
    pub fn from_schedule(schedule: &Schedule) -> Self {
        Self {
            stability: schedule.stability,
            difficulty: schedule.difficulty,
        }
    }
}

//
// ─── SCHEDULE ──────────────────────────────────────────────────────────────────
//

/// Output of the FSRS algorithm for one grade.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub next_review: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: f64,
    pub scheduled_days: f64,
}

/// All possible next states for a card, one per grade.
///
/// # Examples
///
/// ```
/// # use review_core::scheduler::Scheduler;
/// # use review_core::model::{CardId, ReviewGrade};
/// let scheduler = Scheduler::new()?;
/// let states = scheduler.schedule_new_card(CardId::new("a"), chrono::Utc::now())?;
/// let good = states.select(ReviewGrade::Good);
/// assert!(good.scheduled_days >= 1.0);
/// # Ok::<(), review_core::scheduler::SchedulerError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ScheduledStates {
    pub card_id: CardId,
    pub again: Schedule,
    pub hard: Schedule,
    pub good: Schedule,
    pub easy: Schedule,
}

impl ScheduledStates {
    #[must_use]
    pub fn select(&self, grade: ReviewGrade) -> &Schedule {
        match grade {
            ReviewGrade::Again => &self.again,
            ReviewGrade::Hard => &self.hard,
            ReviewGrade::Good => &self.good,
            ReviewGrade::Easy => &self.easy,
        }
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// FSRS-based scheduler.
///
/// Wraps the `fsrs` crate with default parameters and a desired retention
/// (0.9 unless configured per deck).
pub struct Scheduler {
    fsrs: fsrs::FSRS,
    desired_retention: f32,
}

/// Result of applying a grade: chosen schedule, new memory state and the
/// recall probability at review time (`None` for a first review).
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReview {
    pub card_id: CardId,
    pub grade: ReviewGrade,
    pub schedule: Schedule,
    pub memory: MemoryState,
    pub retrievability: Option<f64>,
}

impl Scheduler {
    pub const DEFAULT_RETENTION: f32 = 0.9;

    /// Create scheduler with default parameters and 0.9 retention.
    ///
    /// # Errors
    ///
    /// Returns `FsrsError` if FSRS initialization fails.
    pub fn new() -> Result<Self, SchedulerError> {
        Self::try_with_retention(Self::DEFAULT_RETENTION)
    }

    /// Create scheduler with custom desired retention.
    ///
    /// # Errors
    ///
    /// - `InvalidRetention` if `desired_retention` is not in `(0, 1]`
    /// - `FsrsError` if FSRS initialization fails
    pub fn try_with_retention(desired_retention: f32) -> Result<Self, SchedulerError> {
        if !(0.0..=1.0).contains(&desired_retention) || desired_retention == 0.0 {
            return Err(SchedulerError::InvalidRetention {
                provided: desired_retention,
            });
        }

        let fsrs = fsrs::FSRS::new(Some(&[]))
            .map_err(|e| SchedulerError::FsrsError(e.to_string()))?;

        Ok(Self {
            fsrs,
            desired_retention,
        })
    }

    #[must_use]
    pub fn desired_retention(&self) -> f32 {
        self.desired_retention
    }

    /// Schedule a card that has never been reviewed.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::FsrsError` if FSRS scheduling fails.
    pub fn schedule_new_card(
        &self,
        card_id: CardId,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ScheduledStates, SchedulerError> {
        let next = self
            .fsrs
            .next_states(None, self.desired_retention, 0)
            .map_err(|e| SchedulerError::FsrsError(e.to_string()))?;

        Ok(ScheduledStates {
            card_id,
            again: to_schedule(&next.again, reviewed_at, 0.0),
            hard: to_schedule(&next.hard, reviewed_at, 0.0),
            good: to_schedule(&next.good, reviewed_at, 0.0),
            easy: to_schedule(&next.easy, reviewed_at, 0.0),
        })
    }

    /// Schedule a review for a card with an existing memory state.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidElapsedDays` for negative or non-finite
    /// elapsed time and `SchedulerError::FsrsError` if FSRS scheduling fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn schedule_review(
        &self,
        card_id: CardId,
        state: &MemoryState,
        elapsed_days: f64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<ScheduledStates, SchedulerError> {
        if !elapsed_days.is_finite() || elapsed_days < 0.0 {
            return Err(SchedulerError::InvalidElapsedDays {
                provided: elapsed_days,
            });
        }

        let fsrs_state = fsrs::MemoryState {
            stability: state.stability as f32,
            difficulty: state.difficulty as f32,
        };

        let next = self
            .fsrs
            .next_states(
                Some(fsrs_state),
                self.desired_retention,
                elapsed_days.round() as u32,
            )
            .map_err(|e| SchedulerError::FsrsError(e.to_string()))?;

        Ok(ScheduledStates {
            card_id,
            again: to_schedule(&next.again, reviewed_at, elapsed_days),
            hard: to_schedule(&next.hard, reviewed_at, elapsed_days),
            good: to_schedule(&next.good, reviewed_at, elapsed_days),
            easy: to_schedule(&next.easy, reviewed_at, elapsed_days),
        })
    }

    /// Apply a grade and return the chosen schedule plus the memory update.
    ///
    /// - For never-reviewed cards, pass `None` for `previous` (elapsed days ignored).
    /// - Otherwise pass the stored state and the days since its review.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidElapsedDays` if elapsed is negative or non-finite.
    /// Returns `SchedulerError::FsrsError` if FSRS scheduling fails.
    pub fn apply_review(
        &self,
        card_id: CardId,
        previous: Option<&MemoryState>,
        grade: ReviewGrade,
        reviewed_at: DateTime<Utc>,
        elapsed_days: f64,
    ) -> Result<AppliedReview, SchedulerError> {
        let (states, recall) = match previous {
            Some(state) => (
                self.schedule_review(card_id.clone(), state, elapsed_days, reviewed_at)?,
                Some(retrievability(elapsed_days, state.stability)),
            ),
            None => (self.schedule_new_card(card_id.clone(), reviewed_at)?, None),
        };

        let schedule = states.select(grade).clone();
        let memory = MemoryState::from_schedule(&schedule);

        Ok(AppliedReview {
            card_id,
            grade,
            schedule,
            memory,
            retrievability: recall,
        })
    }
}

/// Convert an FSRS `ItemState` into a `Schedule`, clamping the interval to at
/// least one day.
#[allow(clippy::cast_possible_truncation)]
fn to_schedule(item: &fsrs::ItemState, now: DateTime<Utc>, elapsed_days: f64) -> Schedule {
    let interval_days = item.interval.round().max(1.0);
    let next_review = now + Duration::days(interval_days as i64);

    Schedule {
        next_review,
        stability: f64::from(item.memory.stability),
        difficulty: f64::from(item.memory.difficulty),
        elapsed_days,
        scheduled_days: f64::from(interval_days),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
