use sqlx::Row;
use voca_core::model::SessionCheckpoint;

use super::mapping::ser;
use super::{SqliteRepository, conn_err};
use crate::repository::{CheckpointRepository, StorageError};

#[async_trait::async_trait]
impl CheckpointRepository for SqliteRepository {
    async fn save_checkpoint(&self, checkpoint: &SessionCheckpoint) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(conn_err)?;

        sqlx::query("DELETE FROM session_checkpoint")
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;
        sqlx::query("INSERT INTO session_checkpoint (id, deck_name, saved_at) VALUES (1, ?1, ?2)")
            .bind(&checkpoint.deck_name)
            .bind(checkpoint.saved_at)
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }

    async fn checkpoint(&self) -> Result<Option<SessionCheckpoint>, StorageError> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT deck_name, saved_at FROM session_checkpoint WHERE id = 1")
            .fetch_optional(&pool)
            .await
            .map_err(conn_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(SessionCheckpoint::new(
            row.try_get::<String, _>("deck_name").map_err(ser)?,
            row.try_get("saved_at").map_err(ser)?,
        )))
    }

    async fn clear_checkpoint(&self) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM session_checkpoint")
            .execute(&pool)
            .await
            .map_err(conn_err)?;
        Ok(())
    }
}
