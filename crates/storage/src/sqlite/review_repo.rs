use review_core::model::{Card, CardId, SessionKey};

use super::SqliteRepository;
use super::card_repo::{UPSERT_CARD_SQL, bind_card};
use super::mapping::{conn, grade_to_i64, map_review_row};
use crate::repository::{ReviewPersistence, ReviewRecord, ReviewRepository, StorageError};

const SELECT_REVIEW_COLUMNS: &str = r"
    SELECT
        language, day, card_id, grade, reviewed_at, retrievability,
        stability, difficulty, prior_stability, prior_difficulty, prior_review_at
    FROM reviews
";

#[async_trait::async_trait]
impl ReviewRepository for SqliteRepository {
    async fn get_review(
        &self,
        key: &SessionKey,
        card_id: &CardId,
    ) -> Result<Option<ReviewRecord>, StorageError> {
        let sql = format!("{SELECT_REVIEW_COLUMNS} WHERE language = ?1 AND day = ?2 AND card_id = ?3");
        let row = sqlx::query(&sql)
            .bind(key.language.as_str())
            .bind(key.day.to_string())
            .bind(card_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_review_row).transpose()
    }

    async fn reviews_for_day(&self, key: &SessionKey) -> Result<Vec<ReviewRecord>, StorageError> {
        let sql = format!(
            "{SELECT_REVIEW_COLUMNS} WHERE language = ?1 AND day = ?2 ORDER BY reviewed_at ASC, card_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(key.language.as_str())
            .bind(key.day.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_review_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ReviewPersistence for SqliteRepository {
    async fn apply_review(&self, card: &Card, record: ReviewRecord) -> Result<(), StorageError> {
        if record.card_id != *card.id() || record.key.language != card.language() {
            return Err(StorageError::Conflict);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;

        bind_card(sqlx::query(UPSERT_CARD_SQL), card)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO reviews (
                    language, day, card_id, grade, reviewed_at, retrievability,
                    stability, difficulty, prior_stability, prior_difficulty, prior_review_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(language, day, card_id) DO UPDATE SET
                    -- prior_* stay pinned to the state before the day's first review
                    grade = excluded.grade,
                    reviewed_at = excluded.reviewed_at,
                    retrievability = excluded.retrievability,
                    stability = excluded.stability,
                    difficulty = excluded.difficulty
            ",
        )
        .bind(record.key.language.as_str())
        .bind(record.key.day.to_string())
        .bind(record.card_id.as_str())
        .bind(grade_to_i64(record.grade))
        .bind(record.reviewed_at)
        .bind(record.retrievability)
        .bind(record.stability)
        .bind(record.difficulty)
        .bind(record.prior_stability)
        .bind(record.prior_difficulty)
        .bind(record.prior_review_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        Ok(())
    }
}
