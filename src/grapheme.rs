//! The Unicode service required as an external collaborator (spec §6).
//!
//! The engine treats grapheme segmentation, case mapping and whitespace
//! classification as a capability it consumes, not one it implements from
//! scratch. The teacher crate only reaches for `unicode-normalization`
//! (NFC folding in `utils::normalize`); grapheme-cluster segmentation itself
//! is pulled in from `unicode-segmentation`, the crate `FelixEngl-tmt`'s
//! `tokenizer` member depends on for the same UAX #29 behavior.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// A grapheme cluster: one user-perceived character, the atomic unit for
/// trie keys and edit-distance steps (spec §3). Grapheme clusters are
/// typically 1-4 bytes but are not bounded in length (combining sequences,
/// ZWJ emoji), so this simply owns its bytes.
pub type Grapheme = String;

/// Start-of-sentence padding sentinel (spec §3): a single byte, 0x02.
pub const SOS: &str = "\u{02}";
/// Separates words within an n-gram chain stored in the trie (spec §3):
/// a single byte, 0x1E.
pub const NGRAM_SEP: &str = "\u{1E}";

/// True for any grapheme whose sole byte is `< 0x20` (spec §3): `SOS`,
/// `NGRAM_SEP`, and any other control byte are "special" and are excluded
/// from fuzzy traversal, but walked exactly during n-gram context descent.
pub fn is_special(grapheme: &str) -> bool {
    let bytes = grapheme.as_bytes();
    bytes.len() == 1 && bytes[0] < 0x20
}

/// Unicode segmentation, case mapping and whitespace classification, under
/// a configured locale. Implementations must agree with UAX #29 grapheme
/// segmentation under the session's primary locale (spec §6).
pub trait GraphemeService: Send + Sync {
    /// Segment `text` into an ordered sequence of grapheme cluster slices.
    fn segment_graphemes(&self, text: &str, locale: &str) -> Vec<Grapheme>;

    fn uppercase(&self, grapheme: &str, locale: &str) -> Grapheme;
    fn lowercase(&self, grapheme: &str, locale: &str) -> Grapheme;
    fn titlecase(&self, text: &str, locale: &str) -> String;

    fn is_whitespace(&self, code_point: char) -> bool;

    /// Convenience built from `uppercase`/`lowercase`: the opposite-case
    /// form of a grapheme (upper if it is lower, lower otherwise), used by
    /// the fuzzy search's case-insensitive equality branch (spec §4.4).
    fn opposite_case(&self, grapheme: &str, locale: &str) -> Grapheme {
        let lower = self.lowercase(grapheme, locale);
        if grapheme == lower {
            self.uppercase(grapheme, locale)
        } else {
            lower
        }
    }
}

/// Default `GraphemeService` backed by `unicode-segmentation` (clustering)
/// and `unicode-normalization` (NFC folding before case operations, the same
/// normalization step the teacher applies in `utils::normalize`).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeGraphemeService;

impl GraphemeService for UnicodeGraphemeService {
    fn segment_graphemes(&self, text: &str, _locale: &str) -> Vec<Grapheme> {
        let normalized: String = text.nfc().collect();
        normalized
            .graphemes(true)
            .map(|g| g.to_string())
            .collect()
    }

    fn uppercase(&self, grapheme: &str, _locale: &str) -> Grapheme {
        grapheme.to_uppercase()
    }

    fn lowercase(&self, grapheme: &str, _locale: &str) -> Grapheme {
        grapheme.to_lowercase()
    }

    fn titlecase(&self, text: &str, locale: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut at_word_start = true;
        for g in text.graphemes(true) {
            if self.is_whitespace(g.chars().next().unwrap_or(' ')) {
                at_word_start = true;
                out.push_str(g);
                continue;
            }
            if at_word_start {
                out.push_str(&self.uppercase(g, locale));
            } else {
                out.push_str(&self.lowercase(g, locale));
            }
            at_word_start = false;
        }
        out
    }

    fn is_whitespace(&self, code_point: char) -> bool {
        code_point.is_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_ascii_into_single_byte_clusters() {
        let svc = UnicodeGraphemeService;
        let g = svc.segment_graphemes("hello", "en-US");
        assert_eq!(g, vec!["h", "e", "l", "l", "o"]);
    }

    #[test]
    fn special_token_detection() {
        assert!(is_special(SOS));
        assert!(is_special(NGRAM_SEP));
        assert!(!is_special("a"));
        assert!(!is_special(""));
    }

    #[test]
    fn opposite_case_round_trips() {
        let svc = UnicodeGraphemeService;
        assert_eq!(svc.opposite_case("a", "en-US"), "A");
        assert_eq!(svc.opposite_case("A", "en-US"), "a");
    }

    #[test]
    fn titlecase_capitalizes_word_starts_only() {
        let svc = UnicodeGraphemeService;
        assert_eq!(svc.titlecase("hello world", "en-US"), "Hello World");
    }
}
