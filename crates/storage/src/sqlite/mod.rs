use std::sync::{Arc, RwLock};
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{Storage, StorageError};

mod asset_repo;
mod checkpoint_repo;
mod deck_repo;
mod mapping;
mod migrate;
mod wrong_repo;

pub use migrate::SCHEMA_VERSION;

/// SQLite-backed store.
///
/// Holds the URL alongside the pool so a handle closed by [`close`](Self::close)
/// (or by anything else) is replaced with a fresh, migrated pool on next use.
#[derive(Clone)]
pub struct SqliteRepository {
    database_url: Arc<str>,
    pool: Arc<RwLock<SqlitePool>>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

async fn open_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL;")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000;")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = open_pool(database_url).await?;
        Ok(Self {
            database_url: Arc::from(database_url),
            pool: Arc::new(RwLock::new(pool)),
        })
    }

    /// Bring the schema up to [`SCHEMA_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        self.migrate_to(SCHEMA_VERSION).await
    }

    /// Apply migrations up to and including `version`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate_to(&self, version: i64) -> Result<(), SqliteInitError> {
        let pool = self.pool().await?;
        migrate::run_migrations(&pool, version).await
    }

    /// Highest applied schema version, zero for an empty database.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i64, StorageError> {
        let pool = self.pool().await?;
        migrate::current_version(&pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Close every connection. The next operation reopens transparently.
    pub async fn close(&self) {
        let pool = match self.pool.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        pool.close().await;
    }

    /// Live pool, reopened and re-migrated if the previous one was closed.
    pub(crate) async fn pool(&self) -> Result<SqlitePool, StorageError> {
        let current = self
            .pool
            .read()
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .clone();
        if !current.is_closed() {
            return Ok(current);
        }

        tracing::debug!(url = %self.database_url, "sqlite pool closed, reopening");
        let fresh = open_pool(&self.database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        migrate::run_migrations(&fresh, SCHEMA_VERSION)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut guard = self
            .pool
            .write()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.is_closed() {
            *guard = fresh.clone();
            Ok(fresh)
        } else {
            // Another caller reopened first; keep theirs.
            Ok(guard.clone())
        }
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self::from_repository(repo))
    }
}

pub(crate) fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}
