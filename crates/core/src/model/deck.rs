use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::Language;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,

    #[error("daily review goal must be > 0")]
    InvalidDailyReviewGoal,

    #[error("desired retention must be in (0, 1]")]
    InvalidDesiredRetention,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Per-deck knobs for building the daily manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckSettings {
    daily_review_goal: u32,
    desired_retention: f32,
}

impl DeckSettings {
    pub const DEFAULT_DAILY_REVIEW_GOAL: u32 = 15;
    pub const DEFAULT_DESIRED_RETENTION: f32 = 0.9;

    /// Creates custom deck settings.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::InvalidDailyReviewGoal` for a zero goal and
    /// `DeckError::InvalidDesiredRetention` for a retention outside `(0, 1]`.
    pub fn new(daily_review_goal: u32, desired_retention: f32) -> Result<Self, DeckError> {
        if daily_review_goal == 0 {
            return Err(DeckError::InvalidDailyReviewGoal);
        }
        if !desired_retention.is_finite() || desired_retention <= 0.0 || desired_retention > 1.0 {
            return Err(DeckError::InvalidDesiredRetention);
        }
        Ok(Self {
            daily_review_goal,
            desired_retention,
        })
    }

    /// New cards introduced per day.
    #[must_use]
    pub fn daily_review_goal(&self) -> u32 {
        self.daily_review_goal
    }

    /// Cards whose recall probability falls below this are due.
    #[must_use]
    pub fn desired_retention(&self) -> f32 {
        self.desired_retention
    }
}

impl Default for DeckSettings {
    fn default() -> Self {
        Self {
            daily_review_goal: Self::DEFAULT_DAILY_REVIEW_GOAL,
            desired_retention: Self::DEFAULT_DESIRED_RETENTION,
        }
    }
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A learner's collection of phrase cards for one language.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    language: Language,
    name: String,
    settings: DeckSettings,
    created_at: DateTime<Utc>,
}

impl Deck {
    /// Creates a new Deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        language: Language,
        name: impl Into<String>,
        settings: DeckSettings,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DeckError::EmptyName);
        }

        Ok(Self {
            language,
            name: name.trim().to_owned(),
            settings,
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn settings(&self) -> &DeckSettings {
        &self.settings
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
