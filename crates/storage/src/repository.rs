use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use voca_core::model::{
    AssetCacheEntry, AssetKind, Deck, SessionCheckpoint, WordPair, WrongStat, fold_word,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The single retained word deck.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Replace whatever deck is stored with `deck`. Readers see either the old
    /// deck or the new one, never a mix.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn replace_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch the stored deck, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn current_deck(&self) -> Result<Option<Deck>, StorageError>;
}

/// Words missed in the most recently finished session.
#[async_trait]
pub trait WrongLogRepository: Send + Sync {
    /// Replace the log with `words`, in order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be written.
    async fn replace_wrong_log(
        &self,
        words: &[WordPair],
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn wrong_log(&self) -> Result<Vec<WordPair>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be cleared.
    async fn clear_wrong_log(&self) -> Result<(), StorageError>;
}

/// Lifetime per-word wrong counts.
#[async_trait]
pub trait WrongStatRepository: Send + Sync {
    /// Add one miss for `word` (case-folded) and return the updated stat.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the increment cannot be persisted.
    async fn increment_wrong(
        &self,
        word: &str,
        at: DateTime<Utc>,
    ) -> Result<WrongStat, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn wrong_stat(&self, word: &str) -> Result<Option<WrongStat>, StorageError>;

    /// Wrong count for `word`, zero when no record exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn wrong_count(&self, word: &str) -> Result<u32, StorageError> {
        Ok(self
            .wrong_stat(word)
            .await?
            .map_or(0, |stat| stat.wrong_count()))
    }

    /// Drop the record for `word`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn reset_wrong_stat(&self, word: &str) -> Result<bool, StorageError>;

    /// Drop every record. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn reset_all_wrong_stats(&self) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the checkpoint cannot be written.
    async fn save_checkpoint(&self, checkpoint: &SessionCheckpoint) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn checkpoint(&self) -> Result<Option<SessionCheckpoint>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the checkpoint cannot be removed.
    async fn clear_checkpoint(&self) -> Result<(), StorageError>;
}

/// Binary asset partitions, one per `AssetKind`.
#[async_trait]
pub trait AssetCacheRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_asset(
        &self,
        kind: AssetKind,
        key: &str,
    ) -> Result<Option<AssetCacheEntry>, StorageError>;

    /// Insert or overwrite an entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    async fn put_asset(&self, kind: AssetKind, entry: &AssetCacheEntry)
    -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn has_asset(&self, kind: AssetKind, key: &str) -> Result<bool, StorageError>;

    /// Delete entries stored before `cutoff`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_assets_before(
        &self,
        kind: AssetKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn clear_assets(&self, kind: AssetKind) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn count_assets(&self, kind: AssetKind) -> Result<u64, StorageError>;
}

#[derive(Default)]
struct MemoryState {
    deck: Option<Deck>,
    wrong_log: Vec<WordPair>,
    wrong_stats: HashMap<String, WrongStat>,
    checkpoint: Option<SessionCheckpoint>,
    assets: HashMap<(AssetKind, String), AssetCacheEntry>,
}

/// In-memory implementation for tests and for running without a database file.
///
/// All partitions sit behind one lock, so every operation is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn replace_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        self.lock()?.deck = Some(deck.clone());
        Ok(())
    }

    async fn current_deck(&self) -> Result<Option<Deck>, StorageError> {
        Ok(self.lock()?.deck.clone())
    }
}

#[async_trait]
impl WrongLogRepository for InMemoryRepository {
    async fn replace_wrong_log(
        &self,
        words: &[WordPair],
        _recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.lock()?.wrong_log = words.to_vec();
        Ok(())
    }

    async fn wrong_log(&self) -> Result<Vec<WordPair>, StorageError> {
        Ok(self.lock()?.wrong_log.clone())
    }

    async fn clear_wrong_log(&self) -> Result<(), StorageError> {
        self.lock()?.wrong_log.clear();
        Ok(())
    }
}

#[async_trait]
impl WrongStatRepository for InMemoryRepository {
    async fn increment_wrong(
        &self,
        word: &str,
        at: DateTime<Utc>,
    ) -> Result<WrongStat, StorageError> {
        let key = fold_word(word);
        let mut guard = self.lock()?;
        let next = match guard.wrong_stats.get(&key) {
            Some(stat) => stat.incremented(at),
            None => WrongStat::first(&key, at),
        };
        guard.wrong_stats.insert(key, next.clone());
        Ok(next)
    }

    async fn wrong_stat(&self, word: &str) -> Result<Option<WrongStat>, StorageError> {
        Ok(self.lock()?.wrong_stats.get(&fold_word(word)).cloned())
    }

    async fn reset_wrong_stat(&self, word: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.wrong_stats.remove(&fold_word(word)).is_some())
    }

    async fn reset_all_wrong_stats(&self) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let removed = guard.wrong_stats.len() as u64;
        guard.wrong_stats.clear();
        Ok(removed)
    }
}

#[async_trait]
impl CheckpointRepository for InMemoryRepository {
    async fn save_checkpoint(&self, checkpoint: &SessionCheckpoint) -> Result<(), StorageError> {
        self.lock()?.checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    async fn checkpoint(&self) -> Result<Option<SessionCheckpoint>, StorageError> {
        Ok(self.lock()?.checkpoint.clone())
    }

    async fn clear_checkpoint(&self) -> Result<(), StorageError> {
        self.lock()?.checkpoint = None;
        Ok(())
    }
}

#[async_trait]
impl AssetCacheRepository for InMemoryRepository {
    async fn get_asset(
        &self,
        kind: AssetKind,
        key: &str,
    ) -> Result<Option<AssetCacheEntry>, StorageError> {
        Ok(self.lock()?.assets.get(&(kind, key.to_owned())).cloned())
    }

    async fn put_asset(
        &self,
        kind: AssetKind,
        entry: &AssetCacheEntry,
    ) -> Result<(), StorageError> {
        self.lock()?
            .assets
            .insert((kind, entry.key.clone()), entry.clone());
        Ok(())
    }

    async fn has_asset(&self, kind: AssetKind, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.assets.contains_key(&(kind, key.to_owned())))
    }

    async fn delete_assets_before(
        &self,
        kind: AssetKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.assets.len();
        guard
            .assets
            .retain(|(k, _), entry| *k != kind || entry.stored_at >= cutoff);
        Ok((before - guard.assets.len()) as u64)
    }

    async fn clear_assets(&self, kind: AssetKind) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.assets.len();
        guard.assets.retain(|(k, _), _| *k != kind);
        Ok((before - guard.assets.len()) as u64)
    }

    async fn count_assets(&self, kind: AssetKind) -> Result<u64, StorageError> {
        Ok(self.lock()?.assets.keys().filter(|(k, _)| *k == kind).count() as u64)
    }
}

/// Every partition behind trait objects, so the backend is picked once at
/// construction and callers never see which one it is.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn DeckRepository>,
    pub wrong_log: Arc<dyn WrongLogRepository>,
    pub wrong_stats: Arc<dyn WrongStatRepository>,
    pub checkpoints: Arc<dyn CheckpointRepository>,
    pub assets: Arc<dyn AssetCacheRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    pub(crate) fn from_repository<R>(repo: R) -> Self
    where
        R: DeckRepository
            + WrongLogRepository
            + WrongStatRepository
            + CheckpointRepository
            + AssetCacheRepository
            + Clone
            + 'static,
    {
        Self {
            decks: Arc::new(repo.clone()),
            wrong_log: Arc::new(repo.clone()),
            wrong_stats: Arc::new(repo.clone()),
            checkpoints: Arc::new(repo.clone()),
            assets: Arc::new(repo),
        }
    }
}
