use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::CardId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur during review operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("invalid review score: {0} (expected 1-4)")]
    InvalidScore(u8),
}

//
// ─── REVIEW GRADE ─────────────────────────────────────────────────────────────
//

/// Four-level ordinal grade a learner gives a card.
///
/// Scores run from 1 (`Again`) to 4 (`Easy`) and map directly onto the FSRS
/// rating scale. `Again` is the lowest grade and marks a card for another
/// look later in the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReviewGrade {
    /// Failed to recall the phrase.
    Again,
    /// Recalled with significant difficulty.
    Hard,
    /// Recalled correctly with appropriate effort.
    Good,
    /// Recalled instantly.
    Easy,
}

impl ReviewGrade {
    pub const ALL: [ReviewGrade; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

    /// Converts a 1-4 score to a `ReviewGrade`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidScore` if the value is not in the range 1-4.
    pub fn from_score(value: u8) -> Result<Self, ReviewError> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            _ => Err(ReviewError::InvalidScore(value)),
        }
    }

    /// The 1-4 score, identical to the FSRS rating.
    #[must_use]
    pub fn score(self) -> u8 {
        match self {
            ReviewGrade::Again => 1,
            ReviewGrade::Hard => 2,
            ReviewGrade::Good => 3,
            ReviewGrade::Easy => 4,
        }
    }

    /// True for the lowest grade.
    #[must_use]
    pub fn is_again(self) -> bool {
        matches!(self, ReviewGrade::Again)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReviewGrade::Again => "again",
            ReviewGrade::Hard => "hard",
            ReviewGrade::Good => "good",
            ReviewGrade::Easy => "easy",
        }
    }
}

impl From<ReviewGrade> for u8 {
    fn from(grade: ReviewGrade) -> Self {
        grade.score()
    }
}

impl TryFrom<u8> for ReviewGrade {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_score(value)
    }
}

//
// ─── REVIEW OUTCOME ───────────────────────────────────────────────────────────
//

/// One grading of a card during today's session.
///
/// Identified by `(language, day, card_id)`; the session key is carried by
/// whoever holds the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub card_id: CardId,
    pub grade: ReviewGrade,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewOutcome {
    #[must_use]
    pub fn new(card_id: CardId, grade: ReviewGrade, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            card_id,
            grade,
            reviewed_at,
        }
    }

    #[must_use]
    pub fn is_again(&self) -> bool {
        self.grade.is_again()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn score_conversion_works() {
        assert_eq!(ReviewGrade::from_score(1).unwrap(), ReviewGrade::Again);
        assert_eq!(ReviewGrade::from_score(4).unwrap(), ReviewGrade::Easy);
        let err = ReviewGrade::from_score(0).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidScore(0)));
        assert!(ReviewGrade::from_score(5).is_err());
    }

    #[test]
    fn score_round_trips_for_every_grade() {
        for grade in ReviewGrade::ALL {
            assert_eq!(ReviewGrade::from_score(grade.score()).unwrap(), grade);
        }
    }

    #[test]
    fn only_again_is_lowest() {
        assert!(ReviewGrade::Again.is_again());
        assert!(!ReviewGrade::Hard.is_again());
        assert!(ReviewGrade::Again < ReviewGrade::Hard);
    }

    #[test]
    fn outcome_creation_works() {
        let now = fixed_now();
        let outcome = ReviewOutcome::new(CardId::new("a"), ReviewGrade::Again, now);

        assert_eq!(outcome.card_id, CardId::new("a"));
        assert_eq!(outcome.reviewed_at, now);
        assert!(outcome.is_again());
    }
}
