//! Per-dictionary bookkeeping: score/vocabulary totals and deferred penalty
//! decay, keyed by entry kind (spec §3 inv. 3, §4.7).
//!
//! Counter shape follows the teacher's `SingleGram` (`core/src/single_gram.rs`)
//! total/count tracking, and the add-k smoothing arithmetic it feeds mirrors
//! `NGramModel::counts_to_unigram_logprob` (`core/src/ngram.rs`).

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::entry::{DictionaryId, EntryKind, USER_DICTIONARY_ID};
use crate::error::{EngineError, Result};
use crate::grapheme::NGRAM_SEP;
use crate::trie::{NodeId, Trie};

/// Chain length of the n-gram rooted at `node`: the number of
/// `NGRAM_SEP`-separated word segments on its path from the root (spec §3).
/// Meaningless for non-n-gram nodes; only called when `kind` is `Ngram(_)`.
fn ngram_chain_length(trie: &Trie, node: NodeId) -> u8 {
    let path = trie.path_to(node);
    (path.iter().filter(|g| g.as_str() == NGRAM_SEP).count() + 1) as u8
}

/// A single dictionary's identity, metadata and aggregate bookkeeping. The
/// trie node values themselves live in the shared `Trie`; this struct only
/// tracks the per-(dictionary, kind) aggregates spec §3 inv. 3 requires.
#[derive(Debug, Clone)]
pub struct Dictionary {
    pub id: DictionaryId,
    pub name: String,
    pub display_name: String,
    pub locales: Vec<String>,
    pub generated_by: String,
    pub authors: Vec<String>,
    pub license: String,
    /// Base (language-pack) dictionaries are read-only; only the user
    /// dictionary (id 0) accepts training writes.
    pub read_only: bool,
    total_scores: AHashMap<EntryKind, u64>,
    vocab_sizes: AHashMap<EntryKind, u32>,
    global_penalties: AHashMap<EntryKind, u32>,
}

impl Dictionary {
    pub fn new_user() -> Self {
        Self::empty(USER_DICTIONARY_ID, "user", false)
    }

    pub fn empty(id: DictionaryId, name: impl Into<String>, read_only: bool) -> Self {
        Self {
            id,
            name: name.into(),
            display_name: String::new(),
            locales: Vec::new(),
            generated_by: String::new(),
            authors: Vec::new(),
            license: String::new(),
            read_only,
            total_scores: AHashMap::new(),
            vocab_sizes: AHashMap::new(),
            global_penalties: AHashMap::new(),
        }
    }

    pub fn total_score(&self, kind: EntryKind) -> u64 {
        self.total_scores.get(&kind).copied().unwrap_or(0)
    }

    pub fn vocab_size(&self, kind: EntryKind) -> u32 {
        self.vocab_sizes.get(&kind).copied().unwrap_or(0)
    }

    pub fn global_penalty(&self, kind: EntryKind) -> u32 {
        self.global_penalties.get(&kind).copied().unwrap_or(0)
    }

    /// Add-k (k=1) smoothed frequency for a raw score of this kind in this
    /// dictionary (spec §4.5): `(score + k) / (total + k * vocab)`.
    pub fn smoothed_frequency(&self, kind: EntryKind, score: u32) -> f64 {
        const K: f64 = 1.0;
        let total = self.total_score(kind) as f64;
        let vocab = self.vocab_size(kind) as f64;
        (score as f64 + K) / (total + K * vocab)
    }

    fn require_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(EngineError::MutationOnReadOnly {
                dictionary_id: self.id,
            });
        }
        Ok(())
    }

    /// Register a freshly created entry: bumps `total_scores`/`vocab_sizes`.
    /// Callers must only do this once per (node, kind) creation.
    pub fn register_new_entry(&mut self, kind: EntryKind, initial_score: u32) -> Result<()> {
        self.require_writable()?;
        *self.total_scores.entry(kind).or_insert(0) += initial_score as u64;
        *self.vocab_sizes.entry(kind).or_insert(0) += 1;
        Ok(())
    }

    /// Apply a signed delta to an existing entry's contribution to
    /// `total_scores` (the entry's own `absolute_score` is mutated by the
    /// caller directly on the trie node; this only keeps the aggregate in
    /// sync). `delta` may be negative when a clamp at 0 absorbed part of a
    /// reduction.
    pub fn adjust_total_score(&mut self, kind: EntryKind, delta: i64) {
        let entry = self.total_scores.entry(kind).or_insert(0);
        *entry = (*entry as i64 + delta).max(0) as u64;
    }

    /// Accumulate a deferred global penalty for kind `T` (spec §4.7 step 1).
    pub fn accumulate_global_penalty(&mut self, kind: EntryKind, amount: u32) -> Result<()> {
        self.require_writable()?;
        *self.global_penalties.entry(kind).or_insert(0) += amount;
        Ok(())
    }

    /// Flush `global_penalties[kind]` to 0 without touching entry scores;
    /// used once the penalty has been applied to every entry by the caller.
    fn reset_global_penalty(&mut self, kind: EntryKind) {
        self.global_penalties.insert(kind, 0);
    }

    /// Walk every entry of kind `T` under `root`, clamp
    /// `score = max(0, score - penalty)`, and rebuild `total_scores`/
    /// `vocab_sizes[T]` from scratch (spec §4.7). `global_penalties[T]` is
    /// zero after this returns (spec §3 inv. 3, §8 property 5).
    pub fn recalculate_frequency_scores(&mut self, trie: &mut Trie, root: NodeId, kind: EntryKind) {
        let penalty = self.global_penalty(kind);
        let dict_id = self.id;
        let mut total: u64 = 0;
        let mut vocab: u32 = 0;

        let mut nodes = Vec::new();
        trie.for_each(root, &[], &mut |_path, node| nodes.push(node));

        for node in nodes {
            if let EntryKind::Ngram(k) = kind {
                if ngram_chain_length(trie, node) != k {
                    continue;
                }
            }
            if let Some(value) = trie.value_or_null(node, dict_id) {
                if let Some(score) = value.score_for(kind) {
                    let reduced = score.saturating_sub(penalty);
                    let value = trie.value_or_create(node, dict_id);
                    value.set_score_for(kind, reduced);
                    total += reduced as u64;
                    vocab += 1;
                }
            }
        }

        self.total_scores.insert(kind, total);
        self.vocab_sizes.insert(kind, vocab);
        self.reset_global_penalty(kind);
        debug!(
            dictionary_id = dict_id,
            kind = %kind,
            total_score = total,
            vocab_size = vocab,
            "recalculated frequency scores"
        );
    }

    /// Run `recalculate_frequency_scores` for every kind that currently has
    /// a nonzero penalty or any tracked vocabulary (spec §4.7: "a
    /// whole-dictionary variant processes all kinds in one pass").
    pub fn recalculate_all(&mut self, trie: &mut Trie, root: NodeId, max_ngram_level: u8) {
        self.recalculate_frequency_scores(trie, root, EntryKind::Word);
        self.recalculate_frequency_scores(trie, root, EntryKind::Shortcut);
        for k in 2..=max_ngram_level.max(2) {
            self.recalculate_frequency_scores(trie, root, EntryKind::Ngram(k));
        }
        trace!(dictionary_id = self.id, "recalculate_all complete");
    }
}
