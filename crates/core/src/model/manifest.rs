use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::ids::CardId;

/// Ordered list of cards due in one review session.
///
/// Order decides the navigation sequence and nothing else. Duplicates are
/// dropped on construction (first occurrence wins) so that each card has
/// exactly one position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CardId>", into = "Vec<CardId>")]
pub struct ReviewManifest {
    cards: Vec<CardId>,
}

impl ReviewManifest {
    #[must_use]
    pub fn new(cards: impl IntoIterator<Item = CardId>) -> Self {
        let mut seen = HashSet::new();
        let cards = cards
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { cards }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CardId> {
        self.cards.get(index)
    }

    #[must_use]
    pub fn position(&self, card_id: &CardId) -> Option<usize> {
        self.cards.iter().position(|id| id == card_id)
    }

    #[must_use]
    pub fn contains(&self, card_id: &CardId) -> bool {
        self.cards.contains(card_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CardId> {
        self.cards.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CardId] {
        &self.cards
    }
}

impl From<Vec<CardId>> for ReviewManifest {
    fn from(cards: Vec<CardId>) -> Self {
        Self::new(cards)
    }
}

impl From<ReviewManifest> for Vec<CardId> {
    fn from(manifest: ReviewManifest) -> Self {
        manifest.cards
    }
}

impl FromIterator<CardId> for ReviewManifest {
    fn from_iter<I: IntoIterator<Item = CardId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a ReviewManifest {
    type Item = &'a CardId;
    type IntoIter = std::slice::Iter<'a, CardId>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}
