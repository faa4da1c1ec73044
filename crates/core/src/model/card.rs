use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CardId, Language};
use crate::scheduler::{MemoryState, elapsed_days, retrievability};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card prompt cannot be empty")]
    EmptyPrompt,

    #[error("card answer cannot be empty")]
    EmptyAnswer,

    #[error("invalid persisted card state: {0}")]
    InvalidPersistedState(String),
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// A phrase flashcard in one language deck.
///
/// A card without a memory state has never been reviewed and counts as new.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    id: CardId,
    language: Language,
    prompt: String,
    answer: String,
    created_at: DateTime<Utc>,
    last_review_at: Option<DateTime<Utc>>,
    memory: Option<MemoryState>,
}

impl Card {
    /// Create a brand-new card.
    ///
    /// # Errors
    ///
    /// Returns `CardError::EmptyPrompt` / `CardError::EmptyAnswer` for blank text.
    pub fn new(
        id: CardId,
        language: Language,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        let prompt = prompt.into().trim().to_owned();
        let answer = answer.into().trim().to_owned();
        if prompt.is_empty() {
            return Err(CardError::EmptyPrompt);
        }
        if answer.is_empty() {
            return Err(CardError::EmptyAnswer);
        }

        Ok(Self {
            id,
            language,
            prompt,
            answer,
            created_at,
            last_review_at: None,
            memory: None,
        })
    }

    /// Rehydrate a card from storage.
    ///
    /// # Errors
    ///
    /// Returns `CardError::InvalidPersistedState` when a memory state is present
    /// without a review timestamp (or vice versa), plus the text errors of `new`.
    pub fn from_persisted(
        id: CardId,
        language: Language,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        created_at: DateTime<Utc>,
        last_review_at: Option<DateTime<Utc>>,
        memory: Option<MemoryState>,
    ) -> Result<Self, CardError> {
        if last_review_at.is_some() != memory.is_some() {
            return Err(CardError::InvalidPersistedState(
                "memory state and last review must be set together".into(),
            ));
        }
        let mut card = Self::new(id, language, prompt, answer, created_at)?;
        card.last_review_at = last_review_at;
        card.memory = memory;
        Ok(card)
    }

    #[must_use]
    pub fn id(&self) -> &CardId {
        &self.id
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_review_at(&self) -> Option<DateTime<Utc>> {
        self.last_review_at
    }

    #[must_use]
    pub fn memory_state(&self) -> Option<&MemoryState> {
        self.memory.as_ref()
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.memory.is_none()
    }

    /// Probability of recall at `now`, or `None` for new cards.
    #[must_use]
    pub fn retrievability_at(&self, now: DateTime<Utc>) -> Option<f64> {
        let memory = self.memory.as_ref()?;
        let last = self.last_review_at?;
        Some(retrievability(
            elapsed_days(Some(last), now).max(0.0),
            memory.stability,
        ))
    }

    /// Replace the memory state after a review.
    pub fn apply_review(&mut self, memory: MemoryState, reviewed_at: DateTime<Utc>) {
        self.memory = Some(memory);
        self.last_review_at = Some(reviewed_at);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn lang() -> Language {
        "hin".parse().unwrap()
    }

    #[test]
    fn card_fails_if_prompt_empty() {
        let err = Card::new(CardId::new("a"), lang(), "  ", "ok", fixed_now()).unwrap_err();
        assert_eq!(err, CardError::EmptyPrompt);
    }

    #[test]
    fn card_fails_if_answer_empty() {
        let err = Card::new(CardId::new("a"), lang(), "namaste", " ", fixed_now()).unwrap_err();
        assert_eq!(err, CardError::EmptyAnswer);
    }

    #[test]
    fn new_card_has_no_retrievability() {
        let card = Card::new(CardId::new("a"), lang(), "namaste", "hello", fixed_now()).unwrap();
        assert!(card.is_new());
        assert_eq!(card.retrievability_at(fixed_now()), None);
    }

    #[test]
    fn retrievability_decays_after_review() {
        let now = fixed_now();
        let mut card = Card::new(CardId::new("a"), lang(), "namaste", "hello", now).unwrap();
        card.apply_review(MemoryState::new(3.0, 5.0), now);

        let same_day = card.retrievability_at(now).unwrap();
        let later = card.retrievability_at(now + Duration::days(10)).unwrap();
        assert!((same_day - 1.0).abs() < 1e-9);
        assert!(later < same_day);
    }

    #[test]
    fn persisted_state_must_be_consistent() {
        let err = Card::from_persisted(
            CardId::new("a"),
            lang(),
            "q",
            "a",
            fixed_now(),
            None,
            Some(MemoryState::new(1.0, 5.0)),
        )
        .unwrap_err();
        assert!(matches!(err, CardError::InvalidPersistedState(_)));
    }
}
