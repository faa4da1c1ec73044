use review_core::model::{Deck, Language};

use super::SqliteRepository;
use super::mapping::{conn, map_deck_row};
use crate::repository::{DeckRepository, StorageError};

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO decks (language, name, created_at, daily_review_goal, desired_retention)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(language) DO UPDATE SET
                name = excluded.name,
                daily_review_goal = excluded.daily_review_goal,
                desired_retention = excluded.desired_retention
            ",
        )
        .bind(deck.language().to_string())
        .bind(deck.name())
        .bind(deck.created_at())
        .bind(i64::from(deck.settings().daily_review_goal()))
        .bind(f64::from(deck.settings().desired_retention()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_deck(&self, language: Language) -> Result<Option<Deck>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT language, name, created_at, daily_review_goal, desired_retention
            FROM decks WHERE language = ?1
            ",
        )
        .bind(language.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_deck_row).transpose()
    }
}
