/// Word characters as a regex `\b` sees them.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A word boundary sits between a word and a non-word character (or an edge).
fn is_boundary(haystack: &str, byte_idx: usize) -> bool {
    let before = haystack[..byte_idx].chars().next_back().is_some_and(is_word_char);
    let after = haystack[byte_idx..].chars().next().is_some_and(is_word_char);
    before != after
}

/// True when `phrase` occurs in `haystack` with a word boundary on both ends.
///
/// Both inputs are expected to be lowercased already.
pub(super) fn contains_whole_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }

    let mut from = 0;
    while let Some(rel) = haystack[from..].find(phrase) {
        let start = from + rel;
        let end = start + phrase.len();
        if is_boundary(haystack, start) && is_boundary(haystack, end) {
            return true;
        }
        // Advance one character so overlapping occurrences are still tried.
        let step = haystack[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::contains_whole_phrase;

    #[test]
    fn matches_standalone_word() {
        assert!(contains_whole_phrase("i need a refund now", "refund"));
        assert!(contains_whole_phrase("refund", "refund"));
    }

    #[test]
    fn rejects_word_prefix_and_suffix() {
        assert!(!contains_whole_phrase("refunding my order", "refund"));
        assert!(!contains_whole_phrase("this is fine", "hi"));
        assert!(!contains_whole_phrase("prerefund", "refund"));
    }

    #[test]
    fn punctuation_counts_as_boundary() {
        assert!(contains_whole_phrase("what is your refund policy?", "refund"));
        assert!(contains_whole_phrase("hi!", "hi"));
        assert!(contains_whole_phrase("(pricing)", "pricing"));
    }

    #[test]
    fn multi_word_phrases_need_both_ends_bounded() {
        assert!(contains_whole_phrase("how much is it", "how much"));
        assert!(!contains_whole_phrase("how muchness", "how much"));
    }

    #[test]
    fn later_occurrence_can_match_after_failed_one() {
        assert!(contains_whole_phrase("refunds or a refund", "refund"));
    }

    #[test]
    fn underscore_is_a_word_character() {
        assert!(!contains_whole_phrase("api_key", "api"));
    }

    #[test]
    fn non_ascii_neighbours_are_boundaries() {
        assert!(contains_whole_phrase("¿refund¿", "refund"));
    }

    #[test]
    fn empty_phrase_never_matches() {
        assert!(!contains_whole_phrase("anything", ""));
    }
}
