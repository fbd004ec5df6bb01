use chrono::{DateTime, Utc};

use super::word::fold_word;

/// Lifetime wrong-answer count for one case-folded word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongStat {
    word: String,
    wrong_count: u32,
    last_wrong_at: DateTime<Utc>,
}

impl WrongStat {
    /// First miss for `word`.
    #[must_use]
    pub fn first(word: &str, at: DateTime<Utc>) -> Self {
        Self {
            word: fold_word(word),
            wrong_count: 1,
            last_wrong_at: at,
        }
    }

    #[must_use]
    pub fn from_persisted(word: String, wrong_count: u32, last_wrong_at: DateTime<Utc>) -> Self {
        Self {
            word,
            wrong_count,
            last_wrong_at,
        }
    }

    /// Returns the stat after one more miss at `at`.
    #[must_use]
    pub fn incremented(&self, at: DateTime<Utc>) -> Self {
        Self {
            word: self.word.clone(),
            wrong_count: self.wrong_count.saturating_add(1),
            last_wrong_at: at,
        }
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    #[must_use]
    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    #[must_use]
    pub fn last_wrong_at(&self) -> DateTime<Utc> {
        self.last_wrong_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn increments_and_folds() {
        let stat = WrongStat::first(" Cat", fixed_now());
        assert_eq!(stat.word(), "cat");
        let later = fixed_now() + Duration::minutes(1);
        let next = stat.incremented(later);
        assert_eq!(next.wrong_count(), 2);
        assert_eq!(next.last_wrong_at(), later);
    }
}
