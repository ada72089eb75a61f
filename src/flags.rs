//! Request flags bitset and result types (spec §6).
//!
//! Plain-data result records in the teacher's `Candidate`/`CandidateList`
//! style (`core/src/candidate.rs`: `#[derive(Serialize, Deserialize)]` on a
//! small scored record), adapted to the bit layout and result shapes spec §6
//! specifies instead of the teacher's pagination-oriented fields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftState {
    Unshifted,
    ShiftedManual,
    ShiftedAuto,
    CapsLock,
}

impl ShiftState {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => ShiftState::Unshifted,
            1 => ShiftState::ShiftedManual,
            2 => ShiftState::ShiftedAuto,
            _ => ShiftState::CapsLock,
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            ShiftState::Unshifted => 0,
            ShiftState::ShiftedManual => 1,
            ShiftState::ShiftedAuto => 2,
            ShiftState::CapsLock => 3,
        }
    }
}

/// Decoded view of the 31-bit request-flags integer (spec §6 table). Bit 31
/// is reserved and always read/written as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFlags {
    pub max_suggestion_count: u8,
    pub max_ngram_level: u8,
    pub input_shift_state_start: ShiftState,
    pub input_shift_state_current: ShiftState,
    pub allow_possibly_offensive: bool,
    pub override_hidden_flag: bool,
    pub is_private_session: bool,
}

impl Default for RequestFlags {
    fn default() -> Self {
        Self {
            max_suggestion_count: 10,
            max_ngram_level: 3,
            input_shift_state_start: ShiftState::Unshifted,
            input_shift_state_current: ShiftState::Unshifted,
            allow_possibly_offensive: false,
            override_hidden_flag: false,
            is_private_session: false,
        }
    }
}

impl RequestFlags {
    pub fn from_bits(bits: u32) -> Self {
        Self {
            max_suggestion_count: (bits & 0xFF) as u8,
            max_ngram_level: ((bits >> 8) & 0xF) as u8,
            input_shift_state_start: ShiftState::from_bits(bits >> 12),
            input_shift_state_current: ShiftState::from_bits(bits >> 14),
            allow_possibly_offensive: (bits >> 16) & 1 != 0,
            override_hidden_flag: (bits >> 17) & 1 != 0,
            is_private_session: (bits >> 18) & 1 != 0,
        }
    }

    pub fn to_bits(self) -> u32 {
        let mut bits = 0u32;
        bits |= self.max_suggestion_count as u32;
        bits |= (self.max_ngram_level as u32 & 0xF) << 8;
        bits |= self.input_shift_state_start.to_bits() << 12;
        bits |= self.input_shift_state_current.to_bits() << 14;
        bits |= (self.allow_possibly_offensive as u32) << 16;
        bits |= (self.override_hidden_flag as u32) << 17;
        bits |= (self.is_private_session as u32) << 18;
        bits
    }

    /// `0` means "unlimited"; the orchestrator should treat this as a large
    /// practical cap rather than a literal zero-sized top-k.
    pub fn effective_max_suggestion_count(&self) -> usize {
        if self.max_suggestion_count == 0 {
            255
        } else {
            self.max_suggestion_count as usize
        }
    }
}

/// Spell-result attribute bits (spec §6). Plain `u32` newtype with
/// associated consts: the crate has no other use for a general bitset type,
/// so a one-off struct is clearer than pulling in `bitflags` for five bits
/// (no example in the pack reaches for `bitflags` at this scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpellAttributes(pub u32);

impl SpellAttributes {
    pub const UNSPECIFIED: SpellAttributes = SpellAttributes(0x0);
    pub const IN_DICTIONARY: SpellAttributes = SpellAttributes(0x1);
    pub const LOOKS_LIKE_TYPO: SpellAttributes = SpellAttributes(0x2);
    pub const HAS_RECOMMENDED_SUGGESTIONS: SpellAttributes = SpellAttributes(0x4);
    pub const LOOKS_LIKE_GRAMMAR_ERROR: SpellAttributes = SpellAttributes(0x8);
    pub const DONT_SHOW_UI: SpellAttributes = SpellAttributes(0x10);

    pub fn contains(&self, other: SpellAttributes) -> bool {
        other.0 == 0 || (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: SpellAttributes) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for SpellAttributes {
    type Output = SpellAttributes;
    fn bitor(self, rhs: SpellAttributes) -> SpellAttributes {
        SpellAttributes(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellResult {
    pub attributes: u32,
    pub suggestions: Vec<String>,
}

impl SpellResult {
    pub fn unspecified() -> Self {
        Self {
            attributes: SpellAttributes::UNSPECIFIED.0,
            suggestions: Vec::new(),
        }
    }

    pub fn in_dictionary() -> Self {
        Self {
            attributes: SpellAttributes::IN_DICTIONARY.0,
            suggestions: Vec::new(),
        }
    }

    pub fn typo(suggestions: Vec<String>) -> Self {
        Self {
            attributes: SpellAttributes::LOOKS_LIKE_TYPO.0,
            suggestions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestCandidate {
    pub text: String,
    pub secondary_text: Option<String>,
    /// Always in `[0, 0.9]` (spec §6): the `(0.9, 1.0]` range is reserved
    /// for caller-side special entries and never emitted by the core.
    pub confidence: f64,
    pub is_eligible_for_auto_commit: bool,
    pub is_eligible_for_user_removal: bool,
}

pub type SuggestResult = Vec<SuggestCandidate>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_flags_round_trip_through_bits() {
        let flags = RequestFlags {
            max_suggestion_count: 5,
            max_ngram_level: 3,
            input_shift_state_start: ShiftState::ShiftedManual,
            input_shift_state_current: ShiftState::CapsLock,
            allow_possibly_offensive: true,
            override_hidden_flag: false,
            is_private_session: true,
        };
        let bits = flags.to_bits();
        assert_eq!(RequestFlags::from_bits(bits), flags);
    }

    #[test]
    fn zero_max_suggestion_count_means_unlimited() {
        let flags = RequestFlags {
            max_suggestion_count: 0,
            ..RequestFlags::default()
        };
        assert_eq!(flags.effective_max_suggestion_count(), 255);
    }

    #[test]
    fn spell_attributes_contains_respects_bits() {
        let attrs = SpellAttributes::IN_DICTIONARY;
        assert!(attrs.contains(SpellAttributes::IN_DICTIONARY));
        assert!(!attrs.contains(SpellAttributes::LOOKS_LIKE_TYPO));
    }
}
