//! Hint rendering for the quiz surface.
//!
//! The session engine only reports how many times the current question was
//! missed; callers pick a tier from that count and render it here.

use std::fmt;

use crate::answer::normalize_answer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    /// Tier 0: only the number of letters.
    LetterCount { len: usize },
    /// Tiers 1 and 2: leading letters, the rest masked.
    Prefix { revealed: String, hidden: usize },
    /// Tier 3 and up: the question is counted as unresolved.
    Unresolved,
}

impl Hint {
    /// Builds the hint for `correct` at `tier`.
    #[must_use]
    pub fn for_tier(correct: &str, tier: u32) -> Self {
        let letters: Vec<char> = normalize_answer(&correct.replace(',', "")).chars().collect();
        let len = letters.len();
        match tier {
            0 => Hint::LetterCount { len },
            1 | 2 => {
                let reveal = usize::try_from(tier).unwrap_or(usize::MAX).min(len);
                Hint::Prefix {
                    revealed: letters[..reveal].iter().collect(),
                    hidden: len - reveal,
                }
            }
            _ => Hint::Unresolved,
        }
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Hint::Unresolved)
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::LetterCount { len } => write!(f, "{} ({len} letters)", "_".repeat(*len)),
            Hint::Prefix { revealed, hidden } => write!(f, "{revealed}{}", "_".repeat(*hidden)),
            Hint::Unresolved => f.write_str("unresolved"),
        }
    }
}
