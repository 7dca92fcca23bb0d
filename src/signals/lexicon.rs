// Unsafe-term lexicon applied to submitted text.
//
// Matching is case-insensitive and whole-word: the text is lowercased,
// every run of non-alphanumeric characters collapses to a single space,
// and each term (single word or phrase) must appear bounded by spaces.

use std::sync::OnceLock;

use regex_lite::Regex;

/// Terms that mark text as unsafe. Kept sorted; results follow this order.
pub const UNSAFE_TERMS: &[&str] = &[
    "abuse",
    "assault",
    "attack",
    "blackmail",
    "bomb",
    "bombing",
    "child abuse",
    "danger",
    "dead",
    "death",
    "explosion",
    "extortion",
    "extremist",
    "gun",
    "harm",
    "hate",
    "hostage",
    "kill",
    "molest",
    "murder",
    "pedophile",
    "porn",
    "protest",
    "racist",
    "radical",
    "rape",
    "riot",
    "shoot",
    "shooting",
    "suicide",
    "terrorism",
    "terrorist",
    "threat",
    "violence",
    "violent",
    "weapon",
    "weapons",
];

fn separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is valid"))
}

/// Normalize text for whole-word matching: lowercase, non-alphanumerics
/// collapsed to single spaces, padded with a space on both ends.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = separator().replace_all(&lowered, " ");
    format!(" {} ", collapsed.trim())
}

/// Return every lexicon term present in `text`, in lexicon order.
pub fn find_unsafe_terms(text: &str) -> Vec<String> {
    let haystack = normalize(text);
    UNSAFE_TERMS
        .iter()
        .filter(|term| haystack.contains(&format!(" {term} ")))
        .map(|term| term.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_is_sorted_and_unique() {
        let mut sorted = UNSAFE_TERMS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, UNSAFE_TERMS);
    }

    #[test]
    fn test_matches_case_insensitively() {
        assert_eq!(find_unsafe_terms("He has a WEAPON"), vec!["weapon"]);
    }

    #[test]
    fn test_whole_words_only() {
        // "skill" contains "kill", "gunther" contains "gun"
        assert!(find_unsafe_terms("great skill, says gunther").is_empty());
    }

    #[test]
    fn test_punctuation_does_not_hide_terms() {
        assert_eq!(find_unsafe_terms("bomb! (really)"), vec!["bomb"]);
        assert_eq!(find_unsafe_terms("gun,knife"), vec!["gun"]);
    }

    #[test]
    fn test_phrase_terms_match_across_whitespace() {
        let found = find_unsafe_terms("reports of child\n  abuse today");
        assert!(found.contains(&"child abuse".to_string()));
        assert!(found.contains(&"abuse".to_string()));
    }

    #[test]
    fn test_results_follow_lexicon_order_without_duplicates() {
        let found = find_unsafe_terms("weapon weapon bomb attack");
        assert_eq!(found, vec!["attack", "bomb", "weapon"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(find_unsafe_terms("").is_empty());
        assert!(find_unsafe_terms("   ").is_empty());
    }
}
