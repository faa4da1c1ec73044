use chrono::{DateTime, Utc};
use review_core::model::{
    Card, CardId, Deck, DeckSettings, Language, ReviewDay, ReviewGrade, ReviewManifest, SessionKey,
};
use review_core::scheduler::MemoryState;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{ReviewRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn language_from_str(raw: &str) -> Result<Language, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn day_from_str(raw: &str) -> Result<ReviewDay, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn card_id_from_str(raw: &str) -> Result<CardId, StorageError> {
    raw.parse().map_err(ser)
}

/// Grades are stored as their 1..=4 score, the same scale FSRS uses.
pub(crate) fn grade_to_i64(grade: ReviewGrade) -> i64 {
    i64::from(grade.score())
}

pub(crate) fn grade_from_i64(value: i64) -> Result<ReviewGrade, StorageError> {
    let score = u8::try_from(value)
        .map_err(|_| StorageError::Serialization(format!("invalid grade: {value}")))?;
    ReviewGrade::from_score(score).map_err(ser)
}

pub(crate) fn manifest_to_json(manifest: &ReviewManifest) -> Result<String, StorageError> {
    serde_json::to_string(manifest).map_err(ser)
}

pub(crate) fn manifest_from_json(raw: &str) -> Result<ReviewManifest, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_deck_row(row: &SqliteRow) -> Result<Deck, StorageError> {
    let goal_i64: i64 = row.try_get("daily_review_goal").map_err(ser)?;
    let goal = u32::try_from(goal_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid daily_review_goal: {goal_i64}")))?;

    // stored as REAL; the domain keeps retention as f32
    #[allow(clippy::cast_possible_truncation)]
    let retention = row.try_get::<f64, _>("desired_retention").map_err(ser)? as f32;

    let settings = DeckSettings::new(goal, retention).map_err(ser)?;
    let language: String = row.try_get("language").map_err(ser)?;

    Deck::new(
        language_from_str(&language)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        settings,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Card, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let language: String = row.try_get("language").map_err(ser)?;
    let last_review_at: Option<DateTime<Utc>> = row.try_get("last_review_at").map_err(ser)?;

    let memory = match (
        row.try_get::<Option<f64>, _>("stability").map_err(ser)?,
        row.try_get::<Option<f64>, _>("difficulty").map_err(ser)?,
    ) {
        (Some(stability), Some(difficulty)) => Some(MemoryState::new(stability, difficulty)),
        (None, None) => None,
        _ => {
            return Err(StorageError::Serialization(format!(
                "card {id}: stability and difficulty must be set together"
            )));
        }
    };

    Card::from_persisted(
        card_id_from_str(&id)?,
        language_from_str(&language)?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        row.try_get::<String, _>("answer").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        last_review_at,
        memory,
    )
    .map_err(ser)
}

pub(crate) fn map_review_row(row: &SqliteRow) -> Result<ReviewRecord, StorageError> {
    let language: String = row.try_get("language").map_err(ser)?;
    let day: String = row.try_get("day").map_err(ser)?;
    let card_id: String = row.try_get("card_id").map_err(ser)?;

    Ok(ReviewRecord {
        key: SessionKey::new(language_from_str(&language)?, day_from_str(&day)?),
        card_id: card_id_from_str(&card_id)?,
        grade: grade_from_i64(row.try_get::<i64, _>("grade").map_err(ser)?)?,
        reviewed_at: row.try_get("reviewed_at").map_err(ser)?,
        retrievability: row.try_get("retrievability").map_err(ser)?,
        stability: row.try_get("stability").map_err(ser)?,
        difficulty: row.try_get("difficulty").map_err(ser)?,
        prior_stability: row.try_get("prior_stability").map_err(ser)?,
        prior_difficulty: row.try_get("prior_difficulty").map_err(ser)?,
        prior_review_at: row.try_get("prior_review_at").map_err(ser)?,
    })
}
