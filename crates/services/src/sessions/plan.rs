use rand::Rng;
use rand::seq::SliceRandom;

use voca_core::model::{Deck, WordPair};

/// Upper bound on a short session.
pub const SHORT_SESSION_SIZE: usize = 20;

/// Which words of the deck a session covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Every word in deck order.
    #[default]
    All,
    /// A random sample of at most [`SHORT_SESSION_SIZE`] words.
    Short,
    /// Only the words from the persisted wrong log.
    WrongOnly,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::All => "all",
            SessionMode::Short => "short",
            SessionMode::WrongOnly => "wrong",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(SessionMode::All),
            "short" => Some(SessionMode::Short),
            "wrong" | "wrong-only" => Some(SessionMode::WrongOnly),
            _ => None,
        }
    }
}

/// Deck indices to start a session with.
///
/// `wrong_log` only matters for [`SessionMode::WrongOnly`]; entries are matched
/// back to the deck by word and meaning, so words no longer in the deck drop
/// out.
pub fn select_indices(
    mode: SessionMode,
    deck: &Deck,
    wrong_log: &[WordPair],
    rng: &mut impl Rng,
) -> Vec<usize> {
    match mode {
        SessionMode::All => (0..deck.len()).collect(),
        SessionMode::Short => {
            let mut indices: Vec<usize> = (0..deck.len()).collect();
            indices.shuffle(rng);
            indices.truncate(SHORT_SESSION_SIZE);
            indices
        }
        SessionMode::WrongOnly => {
            let mut seen = std::collections::HashSet::new();
            wrong_log
                .iter()
                .filter_map(|pair| deck.position_of(pair))
                .filter(|index| seen.insert(*index))
                .collect()
        }
    }
}
