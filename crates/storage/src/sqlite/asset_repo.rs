use chrono::{DateTime, Utc};
use sqlx::Row;
use voca_core::model::{AssetCacheEntry, AssetKind};

use super::mapping::{asset_table, ser, u64_from_i64};
use super::{SqliteRepository, conn_err};
use crate::repository::{AssetCacheRepository, StorageError};

#[async_trait::async_trait]
impl AssetCacheRepository for SqliteRepository {
    async fn get_asset(
        &self,
        kind: AssetKind,
        key: &str,
    ) -> Result<Option<AssetCacheEntry>, StorageError> {
        let pool = self.pool().await?;
        let sql = format!(
            "SELECT key, payload, stored_at FROM {} WHERE key = ?1",
            asset_table(kind)
        );
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&pool)
            .await
            .map_err(conn_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(AssetCacheEntry::new(
            row.try_get::<String, _>("key").map_err(ser)?,
            row.try_get::<Vec<u8>, _>("payload").map_err(ser)?,
            row.try_get("stored_at").map_err(ser)?,
        )))
    }

    async fn put_asset(
        &self,
        kind: AssetKind,
        entry: &AssetCacheEntry,
    ) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let sql = format!(
            r"
            INSERT INTO {} (key, payload, stored_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at
            ",
            asset_table(kind)
        );
        sqlx::query(&sql)
            .bind(&entry.key)
            .bind(&entry.payload)
            .bind(entry.stored_at)
            .execute(&pool)
            .await
            .map_err(conn_err)?;
        Ok(())
    }

    async fn has_asset(&self, kind: AssetKind, key: &str) -> Result<bool, StorageError> {
        let pool = self.pool().await?;
        let sql = format!("SELECT 1 FROM {} WHERE key = ?1", asset_table(kind));
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&pool)
            .await
            .map_err(conn_err)?;
        Ok(row.is_some())
    }

    async fn delete_assets_before(
        &self,
        kind: AssetKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let pool = self.pool().await?;
        let sql = format!("DELETE FROM {} WHERE stored_at < ?1", asset_table(kind));
        let res = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&pool)
            .await
            .map_err(conn_err)?;
        Ok(res.rows_affected())
    }

    async fn clear_assets(&self, kind: AssetKind) -> Result<u64, StorageError> {
        let pool = self.pool().await?;
        let sql = format!("DELETE FROM {}", asset_table(kind));
        let res = sqlx::query(&sql).execute(&pool).await.map_err(conn_err)?;
        Ok(res.rows_affected())
    }

    async fn count_assets(&self, kind: AssetKind) -> Result<u64, StorageError> {
        let pool = self.pool().await?;
        let sql = format!("SELECT COUNT(*) AS n FROM {}", asset_table(kind));
        let row = sqlx::query(&sql).fetch_one(&pool).await.map_err(conn_err)?;
        u64_from_i64("count", row.try_get::<i64, _>("n").map_err(ser)?)
    }
}
