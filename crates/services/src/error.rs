//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use voca_core::model::{DeckError, KeyError};

/// Why a producer could not hand back an asset.
///
/// None of these reach callers of the pipeline; they are logged and the
/// acquire resolves to "no asset".
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProduceError {
    #[error("generation service is warming up")]
    WarmingUp { estimated_wait: Option<Duration> },
    #[error("generation service answered with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("generation request timed out")]
    Timeout,
    #[error("generation service returned no content")]
    Empty,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors talking to the remote archive.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteStoreError {
    #[error("archive answered with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("archive rejected the upload: {0}")]
    Rejected(String),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Hard failures from the asset pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssetError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DeckService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeckServiceError {
    #[error("no deck has been imported yet")]
    NoDeck,
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no words available for session")]
    Empty,
    #[error("no deck has been imported yet")]
    NoDeck,
    #[error("session is not finished yet")]
    NotFinished,
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
