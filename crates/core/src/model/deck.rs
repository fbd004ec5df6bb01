use chrono::{DateTime, Utc};
use thiserror::Error;

use super::word::WordPair;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,

    #[error("deck must contain at least one word pair")]
    NoWords,
}

/// The single locally retained word list.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    name: String,
    words: Vec<WordPair>,
    created_at: DateTime<Utc>,
}

impl Deck {
    /// Creates a deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` for a blank name and `DeckError::NoWords`
    /// when `words` is empty.
    pub fn new(
        name: impl Into<String>,
        words: Vec<WordPair>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DeckError::EmptyName);
        }
        if words.is_empty() {
            return Err(DeckError::NoWords);
        }

        Ok(Self {
            name: name.trim().to_owned(),
            words,
            created_at,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn words(&self) -> &[WordPair] {
        &self.words
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Position of the first pair equal to `pair`, comparing word and meaning.
    #[must_use]
    pub fn position_of(&self, pair: &WordPair) -> Option<usize> {
        self.words.iter().position(|w| w == pair)
    }

    #[must_use]
    pub fn into_words(self) -> Vec<WordPair> {
        self.words
    }
}
