use chrono::Utc;
use review_core::model::{ReviewManifest, SessionKey};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, manifest_from_json, manifest_to_json, ser};
use crate::repository::{ManifestRepository, StorageError};

#[async_trait::async_trait]
impl ManifestRepository for SqliteRepository {
    async fn get_manifest(&self, key: &SessionKey) -> Result<Option<ReviewManifest>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT card_ids FROM review_manifests
            WHERE language = ?1 AND day = ?2
            ",
        )
        .bind(key.language.as_str())
        .bind(key.day.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("card_ids").map_err(ser)?;
                manifest_from_json(&raw).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn insert_manifest_if_absent(
        &self,
        key: &SessionKey,
        manifest: &ReviewManifest,
    ) -> Result<ReviewManifest, StorageError> {
        sqlx::query(
            r"
            INSERT INTO review_manifests (language, day, card_ids, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(language, day) DO NOTHING
            ",
        )
        .bind(key.language.as_str())
        .bind(key.day.to_string())
        .bind(manifest_to_json(manifest)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        // whichever writer got there first owns the day's manifest
        self.get_manifest(key).await?.ok_or(StorageError::NotFound)
    }
}
