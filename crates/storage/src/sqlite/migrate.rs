use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations that have not been applied yet.
///
/// Version 1 creates decks, cards, per-day manifests, per-day reviews and
/// their indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS decks (
                    language TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    daily_review_goal INTEGER NOT NULL CHECK (daily_review_goal > 0),
                    desired_retention REAL NOT NULL
                        CHECK (desired_retention > 0 AND desired_retention <= 1)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS cards (
                    id TEXT NOT NULL,
                    language TEXT NOT NULL,
                    prompt TEXT NOT NULL,
                    answer TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    last_review_at TEXT,
                    stability REAL,
                    difficulty REAL,
                    PRIMARY KEY (language, id),
                    FOREIGN KEY (language) REFERENCES decks(language) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS review_manifests (
                    language TEXT NOT NULL,
                    day TEXT NOT NULL,
                    card_ids TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (language, day)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS reviews (
                    language TEXT NOT NULL,
                    day TEXT NOT NULL,
                    card_id TEXT NOT NULL,
                    grade INTEGER NOT NULL CHECK (grade BETWEEN 1 AND 4),
                    reviewed_at TEXT NOT NULL,
                    retrievability REAL,
                    stability REAL NOT NULL,
                    difficulty REAL NOT NULL,
                    prior_stability REAL,
                    prior_difficulty REAL,
                    prior_review_at TEXT,
                    PRIMARY KEY (language, day, card_id),
                    FOREIGN KEY (language, card_id) REFERENCES cards(language, id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_cards_language_created
                    ON cards(language, created_at, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_reviews_session_reviewed_at
                    ON reviews (language, day, reviewed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
