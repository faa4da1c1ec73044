use std::fmt;
use std::path::Path;
use tracing::info;

use review_core::model::{Card, CardId, Deck, DeckSettings, Language};
use services::Clock;
use storage::repository::Storage;

/// A malformed line in a seed file (1-based line number).
#[derive(Debug, PartialEq, Eq)]
pub struct SeedLineError {
    pub line: usize,
    pub reason: &'static str,
}

impl fmt::Display for SeedLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for SeedLineError {}

/// Parse `prompt<TAB>answer` lines. Blank lines and `#` comments are skipped.
pub fn parse_tsv(contents: &str) -> Result<Vec<(String, String)>, SeedLineError> {
    let mut pairs = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let (prompt, answer) = line.split_once('\t').ok_or(SeedLineError {
            line: index + 1,
            reason: "expected prompt<TAB>answer",
        })?;
        if prompt.trim().is_empty() || answer.trim().is_empty() {
            return Err(SeedLineError {
                line: index + 1,
                reason: "prompt and answer must not be blank",
            });
        }
        pairs.push((prompt.trim().to_owned(), answer.trim().to_owned()));
    }
    Ok(pairs)
}

/// Create the deck if missing, then add one new card per seed line.
///
/// Returns how many cards were imported.
pub async fn import(
    storage: &Storage,
    clock: &Clock,
    language: Language,
    goal: Option<u32>,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let pairs = parse_tsv(&contents)?;

    let now = clock.now();
    match storage.decks.get_deck(language).await? {
        Some(deck) => {
            info!(%language, name = deck.name(), "using existing deck");
        }
        None => {
            let settings = match goal {
                Some(goal) => DeckSettings::new(goal, DeckSettings::default().desired_retention())?,
                None => DeckSettings::default(),
            };
            let deck = Deck::new(language, language.as_str(), settings, now)?;
            storage.decks.upsert_deck(&deck).await?;
            info!(%language, goal = deck.settings().daily_review_goal(), "deck created");
        }
    }

    for (prompt, answer) in &pairs {
        let card = Card::new(CardId::generate(), language, prompt.as_str(), answer.as_str(), now)?;
        storage.cards.upsert_card(&card).await?;
    }
    info!(%language, imported = pairs.len(), file = %path.display(), "cards imported");
    Ok(pairs.len())
}
