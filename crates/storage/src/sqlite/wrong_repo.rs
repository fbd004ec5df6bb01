use chrono::{DateTime, Utc};
use sqlx::Row;
use voca_core::model::{WordPair, WrongStat, fold_word};

use super::mapping::{ser, u32_from_i64, word_pair_from_row};
use super::{SqliteRepository, conn_err};
use crate::repository::{StorageError, WrongLogRepository, WrongStatRepository};

fn map_stat_row(row: &sqlx::sqlite::SqliteRow) -> Result<WrongStat, StorageError> {
    Ok(WrongStat::from_persisted(
        row.try_get::<String, _>("word").map_err(ser)?,
        u32_from_i64("wrong_count", row.try_get::<i64, _>("wrong_count").map_err(ser)?)?,
        row.try_get("last_wrong_at").map_err(ser)?,
    ))
}

#[async_trait::async_trait]
impl WrongLogRepository for SqliteRepository {
    async fn replace_wrong_log(
        &self,
        words: &[WordPair],
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(conn_err)?;

        sqlx::query("DELETE FROM wrong_log")
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        for pair in words {
            sqlx::query("INSERT INTO wrong_log (word, meaning, recorded_at) VALUES (?1, ?2, ?3)")
                .bind(pair.word())
                .bind(pair.meaning())
                .bind(recorded_at)
                .execute(&mut *tx)
                .await
                .map_err(conn_err)?;
        }

        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }

    async fn wrong_log(&self) -> Result<Vec<WordPair>, StorageError> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT word, meaning FROM wrong_log ORDER BY id ASC")
            .fetch_all(&pool)
            .await
            .map_err(conn_err)?;

        rows.iter().map(word_pair_from_row).collect()
    }

    async fn clear_wrong_log(&self) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM wrong_log")
            .execute(&pool)
            .await
            .map_err(conn_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl WrongStatRepository for SqliteRepository {
    async fn increment_wrong(
        &self,
        word: &str,
        at: DateTime<Utc>,
    ) -> Result<WrongStat, StorageError> {
        let word = fold_word(word);
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(conn_err)?;

        sqlx::query(
            r"
            INSERT INTO wrong_stats (word, wrong_count, last_wrong_at)
            VALUES (?1, 1, ?2)
            ON CONFLICT(word) DO UPDATE SET
                wrong_count = wrong_count + 1,
                last_wrong_at = excluded.last_wrong_at
            ",
        )
        .bind(&word)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(conn_err)?;

        let row = sqlx::query(
            "SELECT word, wrong_count, last_wrong_at FROM wrong_stats WHERE word = ?1",
        )
        .bind(&word)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn_err)?;

        tx.commit().await.map_err(conn_err)?;
        map_stat_row(&row)
    }

    async fn wrong_stat(&self, word: &str) -> Result<Option<WrongStat>, StorageError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT word, wrong_count, last_wrong_at FROM wrong_stats WHERE word = ?1",
        )
        .bind(fold_word(word))
        .fetch_optional(&pool)
        .await
        .map_err(conn_err)?;

        row.as_ref().map(map_stat_row).transpose()
    }

    async fn reset_wrong_stat(&self, word: &str) -> Result<bool, StorageError> {
        let pool = self.pool().await?;
        let res = sqlx::query("DELETE FROM wrong_stats WHERE word = ?1")
            .bind(fold_word(word))
            .execute(&pool)
            .await
            .map_err(conn_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn reset_all_wrong_stats(&self) -> Result<u64, StorageError> {
        let pool = self.pool().await?;
        let res = sqlx::query("DELETE FROM wrong_stats")
            .execute(&pool)
            .await
            .map_err(conn_err)?;
        Ok(res.rows_affected())
    }
}
