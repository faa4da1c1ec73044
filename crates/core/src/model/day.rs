use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{Language, ParseIdError};

/// Local hour at which a new review day begins.
///
/// Late-night study sessions count toward the previous day.
pub const DAY_START_HOUR: i64 = 4;

const DAY_FORMAT: &str = "%Y-%m-%d";

//
// ─── REVIEW DAY ────────────────────────────────────────────────────────────────
//

/// Calendar key for one day of reviews, rendered as `YYYY-MM-DD`.
///
/// A review day runs from 04:00 to 04:00 local time rather than midnight to
/// midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ReviewDay(NaiveDate);

impl ReviewDay {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Review day containing the given local timestamp.
    ///
    /// ```
    /// # use chrono::{FixedOffset, TimeZone};
    /// # use review_core::model::ReviewDay;
    /// let tz = FixedOffset::east_opt(0).unwrap();
    /// let late = tz.with_ymd_and_hms(2025, 1, 2, 3, 30, 0).unwrap();
    /// assert_eq!(ReviewDay::from_local(&late).to_string(), "2025-01-01");
    /// ```
    #[must_use]
    pub fn from_local<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        let shifted = at.naive_local() - Duration::hours(DAY_START_HOUR);
        Self(shifted.date())
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for ReviewDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

/// Error returned when a day string is not `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid review day {raw:?}, expected YYYY-MM-DD")]
pub struct ParseDayError {
    raw: String,
}

impl FromStr for ReviewDay {
    type Err = ParseDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
            .map(Self)
            .map_err(|_| ParseDayError { raw: s.to_string() })
    }
}

impl From<ReviewDay> for String {
    fn from(day: ReviewDay) -> Self {
        day.to_string()
    }
}

impl TryFrom<String> for ReviewDay {
    type Error = ParseDayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

//
// ─── SESSION KEY ───────────────────────────────────────────────────────────────
//

/// Identifies one review session: a language deck on one review day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub language: Language,
    pub day: ReviewDay,
}

impl SessionKey {
    #[must_use]
    pub fn new(language: Language, day: ReviewDay) -> Self {
        Self { language, day }
    }

    /// Parse a key from its raw parts.
    ///
    /// # Errors
    ///
    /// Returns `SessionKeyError` if either part is malformed.
    pub fn parse(language: &str, day: &str) -> Result<Self, SessionKeyError> {
        Ok(Self {
            language: language.parse()?,
            day: day.parse()?,
        })
    }

    /// Namespaced cache key: `[language, "review", day]`.
    #[must_use]
    pub fn cache_key(&self) -> [String; 3] {
        [
            self.language.to_string(),
            "review".to_string(),
            self.day.to_string(),
        ]
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SessionKeyError {
    #[error(transparent)]
    Language(#[from] ParseIdError),
    #[error(transparent)]
    Day(#[from] ParseDayError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 10, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn day_rolls_over_at_four_am() {
        assert_eq!(ReviewDay::from_local(&at(3, 59)).to_string(), "2025-03-09");
        assert_eq!(ReviewDay::from_local(&at(4, 0)).to_string(), "2025-03-10");
        assert_eq!(ReviewDay::from_local(&at(23, 59)).to_string(), "2025-03-10");
    }

    #[test]
    fn day_uses_local_wall_clock_not_utc() {
        // 02:00 in UTC+05:30 is still 20:30 the previous day in UTC.
        let local = at(2, 0);
        let utc = local.with_timezone(&chrono::Utc);
        assert_eq!(ReviewDay::from_local(&local).to_string(), "2025-03-09");
        assert_eq!(ReviewDay::from_local(&utc).to_string(), "2025-03-09");

        let local = at(9, 0);
        let utc = local.with_timezone(&chrono::Utc);
        assert_eq!(ReviewDay::from_local(&local).to_string(), "2025-03-10");
        // 03:30 UTC falls before the UTC day boundary.
        assert_eq!(ReviewDay::from_local(&utc).to_string(), "2025-03-09");
    }

    #[test]
    fn day_string_round_trips_and_rejects_garbage() {
        let day: ReviewDay = "2025-01-31".parse().unwrap();
        assert_eq!(day.to_string(), "2025-01-31");
        assert!("2025-02-30".parse::<ReviewDay>().is_err());
        assert!("31/01/2025".parse::<ReviewDay>().is_err());
    }

    #[test]
    fn session_key_cache_key_is_namespaced() {
        let key = SessionKey::parse("hin", "2025-01-01").unwrap();
        assert_eq!(key.cache_key(), ["hin", "review", "2025-01-01"].map(String::from));
        assert_eq!(key.to_string(), "hin/2025-01-01");
    }

    #[test]
    fn session_key_parse_reports_bad_part() {
        assert!(matches!(
            SessionKey::parse("hindi", "2025-01-01"),
            Err(SessionKeyError::Language(_))
        ));
        assert!(matches!(
            SessionKey::parse("hin", "yesterday"),
            Err(SessionKeyError::Day(_))
        ));
    }
}
