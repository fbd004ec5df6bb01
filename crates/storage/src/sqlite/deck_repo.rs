use sqlx::Row;
use voca_core::model::Deck;

use super::mapping::{position_to_i64, ser, word_pair_from_row};
use super::{SqliteRepository, conn_err};
use crate::repository::{DeckRepository, StorageError};

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn replace_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(conn_err)?;

        sqlx::query("DELETE FROM deck_words")
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;
        sqlx::query("DELETE FROM decks")
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        sqlx::query("INSERT INTO decks (id, name, created_at) VALUES (1, ?1, ?2)")
            .bind(deck.name())
            .bind(deck.created_at())
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        for (position, pair) in deck.words().iter().enumerate() {
            sqlx::query("INSERT INTO deck_words (position, word, meaning) VALUES (?1, ?2, ?3)")
                .bind(position_to_i64(position)?)
                .bind(pair.word())
                .bind(pair.meaning())
                .execute(&mut *tx)
                .await
                .map_err(conn_err)?;
        }

        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }

    async fn current_deck(&self) -> Result<Option<Deck>, StorageError> {
        let pool = self.pool().await?;
        // Read both tables from one snapshot.
        let mut tx = pool.begin().await.map_err(conn_err)?;

        let Some(row) = sqlx::query("SELECT name, created_at FROM decks WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn_err)?
        else {
            return Ok(None);
        };

        let rows = sqlx::query("SELECT word, meaning FROM deck_words ORDER BY position ASC")
            .fetch_all(&mut *tx)
            .await
            .map_err(conn_err)?;
        tx.commit().await.map_err(conn_err)?;

        let mut words = Vec::with_capacity(rows.len());
        for row in &rows {
            words.push(word_pair_from_row(row)?);
        }

        Deck::new(
            row.try_get::<String, _>("name").map_err(ser)?,
            words,
            row.try_get("created_at").map_err(ser)?,
        )
        .map(Some)
        .map_err(ser)
    }
}
