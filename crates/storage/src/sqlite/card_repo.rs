use review_core::model::{Card, CardId, Language};

use super::SqliteRepository;
use super::mapping::{conn, map_card_row};
use crate::repository::{CardRepository, StorageError};

pub(super) const UPSERT_CARD_SQL: &str = r"
    INSERT INTO cards (
        id, language, prompt, answer, created_at, last_review_at, stability, difficulty
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(language, id) DO UPDATE SET
        -- keep created_at from the original insert; only update mutable fields
        prompt = excluded.prompt,
        answer = excluded.answer,
        last_review_at = excluded.last_review_at,
        stability = excluded.stability,
        difficulty = excluded.difficulty
";

const SELECT_CARD_COLUMNS: &str = r"
    SELECT id, language, prompt, answer, created_at, last_review_at, stability, difficulty
    FROM cards
";

pub(super) fn bind_card<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    card: &'q Card,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(card.id().as_str())
        .bind(card.language().to_string())
        .bind(card.prompt())
        .bind(card.answer())
        .bind(card.created_at())
        .bind(card.last_review_at())
        .bind(card.memory_state().map(|m| m.stability))
        .bind(card.memory_state().map(|m| m.difficulty))
}

#[async_trait::async_trait]
impl CardRepository for SqliteRepository {
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        bind_card(sqlx::query(UPSERT_CARD_SQL), card)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        Ok(())
    }

    async fn get_card(&self, language: Language, id: &CardId) -> Result<Card, StorageError> {
        let sql = format!("{SELECT_CARD_COLUMNS} WHERE language = ?1 AND id = ?2");
        let row = sqlx::query(&sql)
            .bind(language.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_card_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn list_cards(&self, language: Language) -> Result<Vec<Card>, StorageError> {
        let sql = format!("{SELECT_CARD_COLUMNS} WHERE language = ?1 ORDER BY created_at ASC, id ASC");
        let rows = sqlx::query(&sql)
            .bind(language.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut cards = Vec::with_capacity(rows.len());
        for row in rows {
            cards.push(map_card_row(&row)?);
        }
        Ok(cards)
    }
}
