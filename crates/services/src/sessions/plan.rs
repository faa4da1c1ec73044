use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use std::cmp::Ordering;

use review_core::model::{Card, DeckSettings, ReviewManifest};

/// Selection result for one day's manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestPlan {
    pub manifest: ReviewManifest,
    pub due_selected: usize,
    pub new_selected: usize,
}

impl ManifestPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.manifest.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}

/// Picks the day's cards: every due card, then up to the deck's daily goal of
/// new cards.
///
/// A reviewed card is due when its recall probability at `now` has dropped
/// below the deck's desired retention. Due cards come most-forgotten first.
pub struct ManifestBuilder<'a> {
    settings: &'a DeckSettings,
    shuffle_new: bool,
}

impl<'a> ManifestBuilder<'a> {
    #[must_use]
    pub fn new(settings: &'a DeckSettings) -> Self {
        Self {
            settings,
            shuffle_new: false,
        }
    }

    /// Enable or disable shuffling among new cards before selection.
    #[must_use]
    pub fn with_shuffle_new(mut self, shuffle: bool) -> Self {
        self.shuffle_new = shuffle;
        self
    }

    pub fn build(self, cards: impl IntoIterator<Item = Card>, now: DateTime<Utc>) -> ManifestPlan {
        let threshold = f64::from(self.settings.desired_retention());
        let new_cap = usize::try_from(self.settings.daily_review_goal()).unwrap_or(usize::MAX);

        let mut due: Vec<(f64, Card)> = Vec::new();
        let mut new_candidates: Vec<Card> = Vec::new();
        for card in cards {
            match card.retrievability_at(now) {
                Some(recall) if recall < threshold => due.push((recall, card)),
                Some(_) => {}
                None => new_candidates.push(card),
            }
        }

        due.sort_by(|(ra, a), (rb, b)| {
            ra.partial_cmp(rb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id().cmp(b.id()))
        });

        if self.shuffle_new {
            let mut rng = rng();
            new_candidates.as_mut_slice().shuffle(&mut rng);
        } else {
            new_candidates.sort_by(|a, b| {
                a.created_at()
                    .cmp(&b.created_at())
                    .then_with(|| a.id().cmp(b.id()))
            });
        }
        new_candidates.truncate(new_cap);

        let due_selected = due.len();
        let new_selected = new_candidates.len();
        let manifest = due
            .into_iter()
            .map(|(_, card)| card.id().clone())
            .chain(new_candidates.iter().map(|card| card.id().clone()))
            .collect();

        ManifestPlan {
            manifest,
            due_selected,
            new_selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use review_core::model::{CardId, Language};
    use review_core::scheduler::MemoryState;
    use review_core::time::fixed_now;

    fn lang() -> Language {
        "hin".parse().unwrap()
    }

    fn new_card(id: &str, created_min: i64) -> Card {
        Card::new(
            CardId::new(id),
            lang(),
            "q",
            "a",
            fixed_now() + Duration::minutes(created_min),
        )
        .unwrap()
    }

    fn reviewed_card(id: &str, stability: f64, days_ago: i64) -> Card {
        let mut card = new_card(id, -100_000);
        card.apply_review(
            MemoryState::new(stability, 5.0),
            fixed_now() - Duration::days(days_ago),
        );
        card
    }

    fn ids(plan: &ManifestPlan) -> Vec<&str> {
        plan.manifest.iter().map(CardId::as_str).collect()
    }

    #[test]
    fn due_cards_come_first_most_forgotten_first() {
        let settings = DeckSettings::default();
        let cards = vec![
            new_card("n1", 0),
            reviewed_card("fresh", 30.0, 1),
            reviewed_card("slipping", 2.0, 5),
            reviewed_card("forgotten", 1.0, 30),
        ];

        let plan = ManifestBuilder::new(&settings).build(cards, fixed_now());

        assert_eq!(ids(&plan), ["forgotten", "slipping", "n1"]);
        assert_eq!(plan.due_selected, 2);
        assert_eq!(plan.new_selected, 1);
    }

    #[test]
    fn new_cards_are_capped_by_daily_goal_in_creation_order() {
        let settings = DeckSettings::new(2, 0.9).unwrap();
        let cards = vec![new_card("c", 3), new_card("a", 1), new_card("b", 2)];

        let plan = ManifestBuilder::new(&settings).build(cards, fixed_now());

        assert_eq!(ids(&plan), ["a", "b"]);
    }

    #[test]
    fn shuffled_new_cards_still_respect_cap() {
        let settings = DeckSettings::new(3, 0.9).unwrap();
        let cards: Vec<Card> = (0..10).map(|i| new_card(&format!("n{i}"), i)).collect();

        let plan = ManifestBuilder::new(&settings)
            .with_shuffle_new(true)
            .build(cards, fixed_now());

        assert_eq!(plan.total(), 3);
        assert_eq!(plan.new_selected, 3);
    }

    #[test]
    fn nothing_due_gives_empty_manifest() {
        let settings = DeckSettings::default();
        let plan =
            ManifestBuilder::new(&settings).build(vec![reviewed_card("a", 50.0, 1)], fixed_now());
        assert!(plan.is_empty());
    }
}
