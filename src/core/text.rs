//! Text normalisation shared by the encoder, the embedding cache, and the
//! candidate retriever so that cache keys and index queries are built from
//! identically canonicalised text.

/// Trim, lowercase, and collapse internal whitespace runs to single spaces.
///
/// This is the "encoder's own normalisation" referenced by the embedding
/// cache's key derivation and by every sub-query's query-text construction.
pub fn canonicalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `needle` occurs in `haystack` as a case-insensitive, word-boundary
/// substring match. Used for symptom-overlap, red-flag, and recommendation
/// matching, where "boundary" means neither side of the match is an ASCII
/// alphanumeric character.
pub fn contains_word_boundary(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    let hay_bytes = haystack_lower.as_bytes();
    let needle_bytes = needle_lower.as_bytes();

    let mut start = 0;
    while let Some(pos) = find_from(hay_bytes, needle_bytes, start) {
        let before_ok = pos == 0 || !is_alnum(hay_bytes[pos - 1]);
        let end = pos + needle_bytes.len();
        let after_ok = end >= hay_bytes.len() || !is_alnum(hay_bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        start = pos + 1;
    }
    false
}

fn is_alnum(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn find_from(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start >= haystack.len() || needle.is_empty() || needle.len() > haystack.len() - start {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_trims_lowercases_and_collapses() {
        assert_eq!(canonicalize("  Persistent   Fatigue\n"), "persistent fatigue");
    }

    #[test]
    fn word_boundary_match_finds_whole_word() {
        assert!(contains_word_boundary("chest pain radiating to arm", "chest pain"));
    }

    #[test]
    fn word_boundary_match_rejects_substring_of_larger_word() {
        assert!(!contains_word_boundary("feverish chills", "fever"));
        assert!(contains_word_boundary("a fever came on", "fever"));
    }

    #[test]
    fn word_boundary_match_is_case_insensitive() {
        assert!(contains_word_boundary("Severe Headache", "headache"));
    }

    #[test]
    fn empty_needle_never_matches() {
        assert!(!contains_word_boundary("anything", ""));
    }
}
