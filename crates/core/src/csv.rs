//! Line-oriented `word,meaning` import/export.

use crate::model::WordPair;

/// Parses one pair per line. Blank lines, lines without a comma and lines
/// whose word or meaning is blank are skipped. Everything after the first
/// comma, including further commas, is the meaning.
#[must_use]
pub fn parse_csv(text: &str) -> Vec<WordPair> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (word, meaning) = line.split_once(',')?;
            WordPair::new(word, meaning).ok()
        })
        .collect()
}

/// Serializes pairs as `word,meaning` lines joined with `\n`.
#[must_use]
pub fn to_csv(words: &[WordPair]) -> String {
    words
        .iter()
        .map(|w| format!("{},{}", w.word(), w.meaning()))
        .collect::<Vec<_>>()
        .join("\n")
}
