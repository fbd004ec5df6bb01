use std::sync::Arc;

use storage::repository::{DeckRepository, WrongLogRepository, WrongStatRepository};
use voca_core::csv::{parse_csv, to_csv};
use voca_core::model::{Deck, WrongStat};

use crate::Clock;
use crate::error::DeckServiceError;

/// Deck import/export and the learner's mistake records.
#[derive(Clone)]
pub struct DeckService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
    wrong_log: Arc<dyn WrongLogRepository>,
    wrong_stats: Arc<dyn WrongStatRepository>,
}

impl DeckService {
    #[must_use]
    pub fn new(
        clock: Clock,
        decks: Arc<dyn DeckRepository>,
        wrong_log: Arc<dyn WrongLogRepository>,
        wrong_stats: Arc<dyn WrongStatRepository>,
    ) -> Self {
        Self {
            clock,
            decks,
            wrong_log,
            wrong_stats,
        }
    }

    /// Parse `csv` into a deck named `name` and make it the stored deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Deck` when the name is blank or no line
    /// yields a word pair, and `DeckServiceError::Storage` if persistence fails.
    pub async fn import_csv(&self, name: &str, csv: &str) -> Result<Deck, DeckServiceError> {
        let deck = Deck::new(name, parse_csv(csv), self.clock.now())?;
        self.decks.replace_deck(&deck).await?;
        tracing::info!(deck = deck.name(), words = deck.len(), "deck imported");
        Ok(deck)
    }

    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn current_deck(&self) -> Result<Option<Deck>, DeckServiceError> {
        Ok(self.decks.current_deck().await?)
    }

    /// The stored deck as CSV.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::NoDeck` when nothing was imported.
    pub async fn export_csv(&self) -> Result<String, DeckServiceError> {
        let deck = self
            .decks
            .current_deck()
            .await?
            .ok_or(DeckServiceError::NoDeck)?;
        Ok(to_csv(deck.words()))
    }

    /// Persisted wrong log as CSV; empty when there is nothing to retry.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn wrong_log_csv(&self) -> Result<String, DeckServiceError> {
        Ok(to_csv(&self.wrong_log.wrong_log().await?))
    }

    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn clear_wrong_log(&self) -> Result<(), DeckServiceError> {
        Ok(self.wrong_log.clear_wrong_log().await?)
    }

    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn wrong_stat(&self, word: &str) -> Result<Option<WrongStat>, DeckServiceError> {
        Ok(self.wrong_stats.wrong_stat(word).await?)
    }

    /// Forget the wrong count for one word. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn reset_wrong_stat(&self, word: &str) -> Result<bool, DeckServiceError> {
        Ok(self.wrong_stats.reset_wrong_stat(word).await?)
    }

    /// Forget every wrong count. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn reset_all_wrong_stats(&self) -> Result<u64, DeckServiceError> {
        Ok(self.wrong_stats.reset_all_wrong_stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;
    use voca_core::model::DeckError;
    use voca_core::time::{fixed_clock, fixed_now};

    fn service(storage: &Storage) -> DeckService {
        DeckService::new(
            fixed_clock(),
            Arc::clone(&storage.decks),
            Arc::clone(&storage.wrong_log),
            Arc::clone(&storage.wrong_stats),
        )
    }

    #[tokio::test]
    async fn import_then_export_round_trips() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        let deck = service
            .import_csv("animals", "cat,고양이\n\nno separator\ndog,개, 강아지\n")
            .await
            .unwrap();
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.created_at(), fixed_now());
        assert_eq!(service.export_csv().await.unwrap(), "cat,고양이\ndog,개, 강아지");
    }

    #[tokio::test]
    async fn rejects_csv_without_pairs() {
        let storage = Storage::in_memory();
        let err = service(&storage)
            .import_csv("empty", "\n\njust words\n")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckServiceError::Deck(DeckError::NoWords)));
        assert!(matches!(
            service(&storage).export_csv().await.unwrap_err(),
            DeckServiceError::NoDeck
        ));
    }

    #[tokio::test]
    async fn resets_wrong_stats() {
        let storage = Storage::in_memory();
        let service = service(&storage);
        storage.wrong_stats.increment_wrong("cat", fixed_now()).await.unwrap();
        storage.wrong_stats.increment_wrong("dog", fixed_now()).await.unwrap();

        assert!(service.reset_wrong_stat("CAT").await.unwrap());
        assert!(service.wrong_stat("cat").await.unwrap().is_none());
        assert_eq!(service.reset_all_wrong_stats().await.unwrap(), 1);
    }
}
