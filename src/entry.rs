//! Tagged entry values stored at trie nodes, and the small set of identifiers
//! used to address a dictionary and a kind of entry within it.
//!
//! Per DESIGN NOTES §9 ("represent as a sum type ... avoid dynamic dispatch
//! or visitor hierarchies") this is a plain record of optional sub-parts
//! rather than a trait-object hierarchy: a node's value for a dictionary may
//! carry any non-empty subset of word/n-gram/shortcut properties (spec §3).

use serde::{Deserialize, Serialize};

/// Identifies one dictionary within a session. `0` is reserved for the user
/// dictionary; values `>= 1` are base (language-pack) dictionaries.
pub type DictionaryId = u32;

pub const USER_DICTIONARY_ID: DictionaryId = 0;

/// The kind of entry stored at a node, used to key per-dictionary
/// bookkeeping (`total_scores`, `vocab_sizes`, `global_penalties`).
///
/// `Ngram(k)` carries the chain length `k >= 2` (the number of words joined
/// by `NGRAM_SEP` on the path from the root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKind {
    Word,
    Ngram(u8),
    Shortcut,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Word => write!(f, "word"),
            EntryKind::Ngram(k) => write!(f, "ngram({k})"),
            EntryKind::Shortcut => write!(f, "shortcut"),
        }
    }
}

/// Properties of a word entry (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordProps {
    /// The record index (1-based) within `[words]` at the time of last
    /// load/serialization. Reassigned on every emission.
    pub internal_id: u32,
    pub absolute_score: u32,
    pub is_possibly_offensive: bool,
    pub is_hidden_by_user: bool,
}

impl WordProps {
    pub fn new(internal_id: u32, absolute_score: u32) -> Self {
        Self {
            internal_id,
            absolute_score,
            is_possibly_offensive: false,
            is_hidden_by_user: false,
        }
    }
}

/// Properties of an n-gram entry (spec §3). The chain length is implied by
/// the node's depth in `NGRAM_SEP`-separated path segments, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NgramProps {
    pub absolute_score: u32,
}

/// Properties of a shortcut (abbreviation) entry (spec §3, §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutProps {
    pub expansion_text: String,
    pub absolute_score: u32,
    pub is_possibly_offensive: bool,
    pub is_hidden_by_user: bool,
}

/// The value stored at a trie node for one dictionary: any non-empty subset
/// of word/n-gram/shortcut properties. A node participates in a dictionary
/// iff an `EntryValue` exists for that `(node, dict_id)` pair (spec §3 inv. 1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryValue {
    pub word: Option<WordProps>,
    pub ngram: Option<NgramProps>,
    pub shortcut: Option<ShortcutProps>,
}

impl EntryValue {
    pub fn is_empty(&self) -> bool {
        self.word.is_none() && self.ngram.is_none() && self.shortcut.is_none()
    }

    /// Raw score for the given kind, or `None` if the value carries no
    /// properties of that kind.
    pub fn score_for(&self, kind: EntryKind) -> Option<u32> {
        match kind {
            EntryKind::Word => self.word.as_ref().map(|w| w.absolute_score),
            EntryKind::Ngram(_) => self.ngram.as_ref().map(|n| n.absolute_score),
            EntryKind::Shortcut => self.shortcut.as_ref().map(|s| s.absolute_score),
        }
    }

    pub fn set_score_for(&mut self, kind: EntryKind, score: u32) {
        match kind {
            EntryKind::Word => {
                if let Some(w) = self.word.as_mut() {
                    w.absolute_score = score;
                }
            }
            EntryKind::Ngram(_) => {
                if let Some(n) = self.ngram.as_mut() {
                    n.absolute_score = score;
                }
            }
            EntryKind::Shortcut => {
                if let Some(s) = self.shortcut.as_mut() {
                    s.absolute_score = score;
                }
            }
        }
    }

    pub fn is_possibly_offensive(&self) -> bool {
        self.word
            .as_ref()
            .map(|w| w.is_possibly_offensive)
            .or_else(|| self.shortcut.as_ref().map(|s| s.is_possibly_offensive))
            .unwrap_or(false)
    }

    pub fn is_hidden_by_user(&self) -> bool {
        self.word
            .as_ref()
            .map(|w| w.is_hidden_by_user)
            .or_else(|| self.shortcut.as_ref().map(|s| s.is_hidden_by_user))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_has_no_scores() {
        let v = EntryValue::default();
        assert!(v.is_empty());
        assert_eq!(v.score_for(EntryKind::Word), None);
    }

    #[test]
    fn score_for_respects_kind() {
        let mut v = EntryValue::default();
        v.word = Some(WordProps::new(1, 100));
        v.ngram = Some(NgramProps { absolute_score: 7 });
        assert_eq!(v.score_for(EntryKind::Word), Some(100));
        assert_eq!(v.score_for(EntryKind::Ngram(2)), Some(7));
        assert_eq!(v.score_for(EntryKind::Shortcut), None);
        assert!(!v.is_empty());
    }

    #[test]
    fn offensive_and_hidden_flags_read_through_word_or_shortcut() {
        let mut v = EntryValue::default();
        assert!(!v.is_possibly_offensive());
        v.word = Some(WordProps {
            internal_id: 1,
            absolute_score: 1,
            is_possibly_offensive: true,
            is_hidden_by_user: false,
        });
        assert!(v.is_possibly_offensive());
        assert!(!v.is_hidden_by_user());
    }
}
