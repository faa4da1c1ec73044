mod card;
mod day;
mod deck;
mod ids;
mod manifest;
mod review;

pub use ids::{CardId, Language, ParseIdError};

pub use card::{Card, CardError};
pub use day::{DAY_START_HOUR, ParseDayError, ReviewDay, SessionKey, SessionKeyError};
pub use deck::{Deck, DeckError, DeckSettings};
pub use manifest::ReviewManifest;
pub use review::{ReviewError, ReviewGrade, ReviewOutcome};
