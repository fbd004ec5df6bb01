//! Answer normalization and matching.
//!
//! Both the submitted answer and each accepted meaning are compared after
//! removing whitespace and quote characters and lowercasing. A meaning field
//! such as `"cat, kitty"` accepts either listed alternative.

const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Strips whitespace and quote characters and case-folds.
#[must_use]
pub fn normalize_answer(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !QUOTES.contains(c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized, non-empty alternatives listed in a meaning field.
pub fn accepted_answers(meaning: &str) -> impl Iterator<Item = String> + '_ {
    meaning
        .split(',')
        .map(normalize_answer)
        .filter(|m| !m.is_empty())
}

/// True when `answer` equals any listed meaning, or the whole list verbatim.
#[must_use]
pub fn is_correct(answer: &str, meaning: &str) -> bool {
    let answer = normalize_answer(answer);
    if answer.is_empty() {
        return false;
    }
    if answer == normalize_answer(meaning) {
        return true;
    }
    accepted_answers(meaning).any(|m| m == answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_case_space_and_quotes() {
        assert!(is_correct("  Go Away ", "\"go away\""));
        assert!(is_correct("고 양 이", "고양이"));
    }

    #[test]
    fn any_listed_meaning_counts() {
        assert!(is_correct("kitty", "cat, kitty"));
        assert!(is_correct("cat", "\"cat, kitty\""));
        assert!(is_correct("cat,kitty", "cat, kitty"));
        assert!(!is_correct("kit", "cat, kitty"));
    }

    #[test]
    fn empty_answer_never_matches() {
        assert!(!is_correct("   ", "a"));
        assert!(!is_correct("", ","));
    }

    #[test]
    fn accepted_answers_skips_empty_segments() {
        let list: Vec<_> = accepted_answers("a,, B ,").collect();
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
    }
}
