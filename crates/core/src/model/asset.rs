use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::word::fold_word;

/// Longest audio key accepted by the speech proxy.
pub const AUDIO_KEY_MAX_LEN: usize = 100;

/// Longest image key; it doubles as a file name in the remote archive.
pub const IMAGE_KEY_MAX_LEN: usize = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    #[error("asset key cannot be empty")]
    Empty,

    #[error("asset key is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Kind of cached binary associated with a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Audio,
    Image,
}

impl AssetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::Image => "image",
        }
    }

    #[must_use]
    pub fn max_key_len(self) -> usize {
        match self {
            AssetKind::Audio => AUDIO_KEY_MAX_LEN,
            AssetKind::Image => IMAGE_KEY_MAX_LEN,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized cache key for one asset.
///
/// `word` is the case-folded word (the wrong-stat key); `cache_key` is what the
/// cache partition and remote store are keyed by. For audio both are the same;
/// image keys are restricted to `[a-z0-9-]` with everything else mapped to `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    kind: AssetKind,
    word: String,
    cache_key: String,
}

impl AssetKey {
    /// Normalizes `raw` for the given kind.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Empty` for blank input and `KeyError::TooLong` when
    /// the normalized key exceeds the kind's limit.
    pub fn new(kind: AssetKind, raw: &str) -> Result<Self, KeyError> {
        let word = fold_word(raw);
        if word.is_empty() {
            return Err(KeyError::Empty);
        }

        let cache_key = match kind {
            AssetKind::Audio => word.clone(),
            AssetKind::Image => sanitize_image_key(&word),
        };

        let len = cache_key.chars().count();
        let max = kind.max_key_len();
        if len > max {
            return Err(KeyError::TooLong { len, max });
        }

        Ok(Self {
            kind,
            word,
            cache_key,
        })
    }

    #[must_use]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.cache_key)
    }
}

fn sanitize_image_key(word: &str) -> String {
    word.chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A cached blob as stored in one asset partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCacheEntry {
    pub key: String,
    pub payload: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl AssetCacheEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, payload: Vec<u8>, stored_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            stored_at,
        }
    }
}
