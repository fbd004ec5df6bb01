use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordPairError {
    #[error("word cannot be empty")]
    EmptyWord,

    #[error("meaning cannot be empty")]
    EmptyMeaning,
}

/// A single prompt/answer pair.
///
/// `meaning` may list several accepted answers separated by commas; see
/// [`crate::answer::is_correct`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordPair {
    word: String,
    meaning: String,
}

impl WordPair {
    /// Creates a pair from trimmed word and meaning.
    ///
    /// # Errors
    ///
    /// Returns `WordPairError` if either side is empty after trimming.
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Result<Self, WordPairError> {
        let word = word.into();
        let meaning = meaning.into();
        let word = word.trim();
        let meaning = meaning.trim();
        if word.is_empty() {
            return Err(WordPairError::EmptyWord);
        }
        if meaning.is_empty() {
            return Err(WordPairError::EmptyMeaning);
        }
        Ok(Self {
            word: word.to_owned(),
            meaning: meaning.to_owned(),
        })
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    #[must_use]
    pub fn meaning(&self) -> &str {
        &self.meaning
    }

    /// Case-folded word, the key used for wrong-count stats.
    #[must_use]
    pub fn folded_word(&self) -> String {
        fold_word(&self.word)
    }
}

/// Lowercases and trims a word so stats and cache keys agree across decks.
#[must_use]
pub fn fold_word(word: &str) -> String {
    word.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_both_sides() {
        let pair = WordPair::new("  cat ", " 고양이\t").unwrap();
        assert_eq!(pair.word(), "cat");
        assert_eq!(pair.meaning(), "고양이");
    }

    #[test]
    fn rejects_blank_parts() {
        assert_eq!(WordPair::new(" ", "x").unwrap_err(), WordPairError::EmptyWord);
        assert_eq!(WordPair::new("x", "").unwrap_err(), WordPairError::EmptyMeaning);
    }

    #[test]
    fn fold_word_lowercases() {
        assert_eq!(fold_word(" Apple "), "apple");
    }
}
