use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier for a phrase card.
///
/// Card ids come from the data layer and carry no meaning beyond identity;
/// the only requirement is that they are non-empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Creates a new `CardId` from any string-like value.
    ///
    /// Callers that accept untrusted input should go through `FromStr`,
    /// which rejects empty ids.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Three-letter language code identifying a deck (e.g. `hin`, `spa`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Language([u8; 3]);

impl Language {
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII lowercase letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId({})", self.0)
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Language({})", self.as_str())
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for CardId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "CardId",
                raw: s.to_string(),
            });
        }
        Ok(CardId::new(trimmed))
    }
}

impl FromStr for Language {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let bytes = lowered.as_bytes();
        match <[u8; 3]>::try_from(bytes) {
            Ok(code) if code.iter().all(u8::is_ascii_lowercase) => Ok(Language(code)),
            _ => Err(ParseIdError {
                kind: "Language",
                raw: s.to_string(),
            }),
        }
    }
}

impl Serialize for Language {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_display() {
        let id = CardId::new("a1b2");
        assert_eq!(id.to_string(), "a1b2");
    }

    #[test]
    fn test_card_id_from_str_trims() {
        let id: CardId = "  abc ".parse().unwrap();
        assert_eq!(id, CardId::new("abc"));
    }

    #[test]
    fn test_card_id_from_str_rejects_empty() {
        assert!("   ".parse::<CardId>().is_err());
    }

    #[test]
    fn test_generated_card_ids_differ() {
        assert_ne!(CardId::generate(), CardId::generate());
    }

    #[test]
    fn test_language_from_str_lowercases() {
        let lang: Language = "HIN".parse().unwrap();
        assert_eq!(lang.as_str(), "hin");
        assert_eq!(lang.to_string(), "hin");
    }

    #[test]
    fn test_language_from_str_invalid() {
        assert!("hi".parse::<Language>().is_err());
        assert!("hind".parse::<Language>().is_err());
        assert!("h1n".parse::<Language>().is_err());
        assert!("".parse::<Language>().is_err());
    }
}
