//! Incremental training (spec §4.7): apply usage deltas to the user
//! dictionary only, deferring decay of every other entry to the next
//! `Dictionary::recalculate_frequency_scores` pass.
//!
//! The "learn bumps a counter, exposed through a small snapshot API" shape is
//! carried over from the teacher's `UserDict::learn`/`learn_with_count`/
//! `learn_bigram` (`core/src/userdict.rs`), retargeted at the shared trie's
//! `WordProps`/`NgramProps` instead of a `redb` table.

use crate::config::PredictionWeightsByKind;
use crate::dictionary::Dictionary;
use crate::entry::{EntryKind, NgramProps, WordProps};
use crate::error::Result;
use crate::grapheme::{Grapheme, GraphemeService, NGRAM_SEP, SOS};
use crate::trie::{NodeId, Trie};

/// Apply one training delta to `node`'s entry of `kind` in `dict`: create
/// the entry if absent (registering it with `dict`), otherwise bump its
/// `absolute_score` and keep `dict`'s totals in sync. Either way, accumulate
/// `usage_reduction_others` into `dict`'s global penalty for `kind` (spec
/// §4.7 step 1): every untrained entry of this kind decays by that amount at
/// the next recompute, while this entry's own score already absorbed the
/// same amount net-positive via `usage_bonus`.
fn apply_training_delta(
    trie: &mut Trie,
    dict: &mut Dictionary,
    node: NodeId,
    kind: EntryKind,
    usage_bonus: u32,
    usage_reduction_others: u32,
) -> Result<()> {
    let delta = usage_bonus + usage_reduction_others;
    let existed = trie
        .value_or_null(node, dict.id)
        .and_then(|v| v.score_for(kind))
        .is_some();

    let value = trie.value_or_create(node, dict.id);
    match kind {
        EntryKind::Word => match value.word.as_mut() {
            Some(w) => w.absolute_score += delta,
            None => value.word = Some(WordProps::new(0, delta)),
        },
        EntryKind::Ngram(_) => match value.ngram.as_mut() {
            Some(n) => n.absolute_score += delta,
            None => value.ngram = Some(NgramProps { absolute_score: delta }),
        },
        EntryKind::Shortcut => unreachable!("training never creates shortcut entries"),
    }

    if existed {
        dict.adjust_total_score(kind, delta as i64);
    } else {
        dict.register_new_entry(kind, delta)?;
    }
    dict.accumulate_global_penalty(kind, usage_reduction_others)?;
    Ok(())
}

fn ngram_path(window: &[String], graphemes: &dyn GraphemeService, locale: &str) -> Vec<Grapheme> {
    let mut path = Vec::new();
    for (idx, token) in window.iter().enumerate() {
        path.extend(graphemes.segment_graphemes(token, locale));
        if idx + 1 < window.len() {
            path.push(NGRAM_SEP.to_string());
        }
    }
    path
}

/// Train the user dictionary on one recently typed sentence (spec §4.7):
///
/// 1. Every word gets its own `Word` entry trained.
/// 2. The sentence is padded with `max_prev_words - 1` `SOS` sentinels.
/// 3. Every window of length `k` (`2..=max_prev_words`) over the padded
///    sequence trains an `Ngram(k)` entry at the path joining its tokens
///    with `NGRAM_SEP`.
///
/// `weights.words`/`weights.ngrams` supply the bonus/penalty/window-size
/// constants for word and n-gram entries respectively; `max_prev_words` is
/// read from `weights.words`.
pub fn train(
    trie: &mut Trie,
    dict: &mut Dictionary,
    words: &[String],
    weights: &PredictionWeightsByKind,
    graphemes: &dyn GraphemeService,
    locale: &str,
) -> Result<()> {
    let word_weights = &weights.words;
    let ngram_weights = &weights.ngrams;
    let max_prev_words = (word_weights.max_prev_words as usize).max(2);

    for word in words {
        let path = graphemes.segment_graphemes(word, locale);
        let node = trie.find_or_create(&path);
        apply_training_delta(
            trie,
            dict,
            node,
            EntryKind::Word,
            word_weights.usage_bonus,
            word_weights.usage_reduction_others,
        )?;
    }

    let mut padded: Vec<String> = Vec::with_capacity(max_prev_words - 1 + words.len());
    padded.extend(std::iter::repeat(SOS.to_string()).take(max_prev_words - 1));
    padded.extend(words.iter().cloned());

    for k in 2..=max_prev_words {
        if padded.len() < k {
            continue;
        }
        for start in 0..=(padded.len() - k) {
            let window = &padded[start..start + k];
            let path = ngram_path(window, graphemes, locale);
            let node = trie.find_or_create(&path);
            apply_training_delta(
                trie,
                dict,
                node,
                EntryKind::Ngram(k as u8),
                ngram_weights.usage_bonus,
                ngram_weights.usage_reduction_others,
            )?;
        }
    }

    Ok(())
}
