//! Prediction and spell-check orchestrator (spec §4.5, §4.6).
//!
//! The pipeline shape — resolve context, run the scored search, rank, then
//! shift case on the way out — mirrors the teacher's `Engine::input`
//! (`core/src/engine.rs`: cache check -> `segment_top_k` -> candidate
//! generation -> `apply_advanced_ranking` -> `sort_candidates`), re-targeted
//! at n-gram-scoped fuzzy search over the shared trie instead of syllable
//! segmentation over a lexicon.

use std::collections::HashSet;

use crate::config::{FrequencyPooling, KeyProximityChecker, PredictionWeights, PredictionWeightsByKind};
use crate::dictionary::Dictionary;
use crate::entry::{EntryKind, USER_DICTIONARY_ID};
use crate::flags::{RequestFlags, ShiftState, SpellResult, SuggestCandidate, SuggestResult};
use crate::fuzzy::{self, FuzzyHit, SearchType};
use crate::grapheme::{Grapheme, GraphemeService, NGRAM_SEP};
use crate::topk::{TopK, TopKEntry};
use crate::trie::{NodeId, Trie};

/// Relative weight of edit-distance similarity vs. log-frequency in the
/// confidence formula (spec §4.5): `w1` on similarity, `w2` on `log2(freq)`.
const CONFIDENCE_W1: f64 = 1.0;
const CONFIDENCE_W2: f64 = 0.1;

/// Minimum confidence for the top-ranked candidate to be marked eligible for
/// silent auto-commit. Not otherwise specified; chosen conservatively in the
/// middle of the core's `[0, 0.9]` output range.
const AUTO_COMMIT_THRESHOLD: f64 = 0.5;

/// Read-only session state a `suggest`/`spell` call needs. Borrowed for the
/// duration of one call; `session.rs` constructs this under its read lock.
pub struct PredictionContext<'a> {
    pub trie: &'a Trie,
    pub dictionaries: &'a [Dictionary],
    pub weights: &'a PredictionWeightsByKind,
    pub proximity: &'a KeyProximityChecker,
    pub graphemes: &'a dyn GraphemeService,
    pub locale: &'a str,
    pub frequency_pooling: FrequencyPooling,
}

fn confidence_log(cost: u32, frequency: f64) -> f64 {
    let similarity = -(cost as f64);
    (CONFIDENCE_W1 * similarity + CONFIDENCE_W2 * frequency.log2()) / (CONFIDENCE_W1 + CONFIDENCE_W2)
}

fn confidence_linear(confidence_log: f64) -> f64 {
    2f64.powf(confidence_log)
}

/// Mean (default) or pooled smoothed frequency across every dictionary that
/// carries a value of `kind` at `node` (spec §4.5, §9 Open Question).
fn merged_frequency(
    trie: &Trie,
    node: NodeId,
    kind: EntryKind,
    dictionaries: &[Dictionary],
    pooling: FrequencyPooling,
) -> Option<f64> {
    let mut freqs = Vec::new();
    let mut numerator_sum = 0.0;
    let mut denominator_sum = 0.0;

    for dict in dictionaries {
        let Some(value) = trie.value_or_null(node, dict.id) else {
            continue;
        };
        let Some(score) = value.score_for(kind) else {
            continue;
        };
        freqs.push(dict.smoothed_frequency(kind, score));
        numerator_sum += score as f64 + 1.0;
        denominator_sum += dict.total_score(kind) as f64 + dict.vocab_size(kind) as f64;
    }

    if freqs.is_empty() {
        return None;
    }
    Some(match pooling {
        FrequencyPooling::Mean => freqs.iter().sum::<f64>() / freqs.len() as f64,
        FrequencyPooling::Pooled => numerator_sum / denominator_sum,
    })
}

/// Offensive/hidden filters apply to word and shortcut kinds only; a node
/// whose only value at an n-gram-only entry carries neither flag (spec §4.5).
fn merged_flags(trie: &Trie, node: NodeId, dictionaries: &[Dictionary]) -> (bool, bool) {
    let mut offensive = false;
    let mut hidden = false;
    for dict in dictionaries {
        if let Some(value) = trie.value_or_null(node, dict.id) {
            offensive |= value.is_possibly_offensive();
            hidden |= value.is_hidden_by_user();
        }
    }
    (offensive, hidden)
}

#[allow(clippy::too_many_arguments)]
fn run_fuzzy(
    ctx: &PredictionContext,
    root: NodeId,
    query: &[Grapheme],
    search_type: SearchType,
    kind: EntryKind,
    weights: &PredictionWeights,
    topk: &mut TopK,
    flags: RequestFlags,
) {
    // Snapshot the current bound rather than sharing `topk` with `emit`:
    // `should_prune` and `emit` both need it, and only one closure may hold
    // a live `&mut` at a time. A stale bound only makes pruning less
    // aggressive, never incorrect.
    let was_full = topk.is_full();
    let min_confidence = topk.min_inserted_confidence();
    let mut should_prune = move |lower_bound: u32| {
        was_full && confidence_log(lower_bound, 1.0) <= min_confidence
    };

    let mut emit = |hit: FuzzyHit| {
        let (offensive, hidden) = merged_flags(ctx.trie, hit.node, ctx.dictionaries);
        if offensive && !flags.allow_possibly_offensive {
            return;
        }
        if hidden && !flags.override_hidden_flag {
            return;
        }
        let Some(frequency) = merged_frequency(ctx.trie, hit.node, kind, ctx.dictionaries, ctx.frequency_pooling) else {
            return;
        };
        topk.insert(TopKEntry {
            node: hit.node,
            text: hit.path.join(""),
            confidence_log: confidence_log(hit.cost, frequency),
            cost: hit.cost,
        });
    };

    fuzzy::search(
        ctx.trie,
        root,
        query,
        search_type,
        weights,
        ctx.proximity,
        ctx.graphemes,
        ctx.locale,
        &mut should_prune,
        &mut emit,
    );
}

fn inject_shortcuts(ctx: &PredictionContext, current_word: &[Grapheme], topk: &mut TopK, flags: RequestFlags) {
    let Some(node) = ctx.trie.find_or_null(current_word) else {
        return;
    };
    for dict in ctx.dictionaries {
        let Some(value) = ctx.trie.value_or_null(node, dict.id) else {
            continue;
        };
        let Some(shortcut) = &value.shortcut else {
            continue;
        };
        if shortcut.is_possibly_offensive && !flags.allow_possibly_offensive {
            continue;
        }
        if shortcut.is_hidden_by_user && !flags.override_hidden_flag {
            continue;
        }
        // 2^0 = 1.0 in the formula's own terms (spec §4.5); ranking uses the
        // log value directly, the `0.9` output clamp is applied on the way out.
        topk.insert(TopKEntry {
            node,
            text: shortcut.expansion_text.clone(),
            confidence_log: 0.0,
            cost: 0,
        });
    }
}

fn case_variants(ctx: &PredictionContext, word: &str) -> Vec<Vec<Grapheme>> {
    let as_typed = ctx.graphemes.segment_graphemes(word, ctx.locale);
    let lowered: Vec<Grapheme> = as_typed.iter().map(|g| ctx.graphemes.lowercase(g, ctx.locale)).collect();
    if lowered == as_typed {
        vec![as_typed]
    } else {
        vec![as_typed, lowered]
    }
}

fn descend_word(trie: &Trie, start: NodeId, word: &[Grapheme]) -> Option<NodeId> {
    let mut cur = start;
    for g in word {
        cur = trie.child(cur, g)?;
    }
    Some(cur)
}

/// Descend `sentence[m-n .. m-2]` through `NGRAM_SEP`-separated word nodes
/// (spec §4.5). Case-insensitive: each word is tried as-typed and lowercased,
/// so paths created under either casing are both reachable.
fn resolve_subngram_nodes(ctx: &PredictionContext, subngram_words: &[String]) -> Vec<NodeId> {
    let mut nodes = vec![ctx.trie.root()];
    for (i, word) in subngram_words.iter().enumerate() {
        let variants = case_variants(ctx, word);
        let mut next = Vec::new();
        for &node in &nodes {
            for variant in &variants {
                if let Some(child) = descend_word(ctx.trie, node, variant) {
                    next.push(child);
                }
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        if i + 1 < subngram_words.len() {
            next = next.into_iter().filter_map(|n| ctx.trie.child(n, NGRAM_SEP)).collect();
            if next.is_empty() {
                return Vec::new();
            }
        }
        nodes = next;
    }
    nodes
}

fn apply_case_shift(ctx: &PredictionContext, text: &str, flags: RequestFlags) -> String {
    match flags.input_shift_state_current {
        ShiftState::CapsLock => ctx
            .graphemes
            .segment_graphemes(text, ctx.locale)
            .iter()
            .map(|g| ctx.graphemes.uppercase(g, ctx.locale))
            .collect(),
        _ => {
            if flags.input_shift_state_start != ShiftState::Unshifted {
                ctx.graphemes.titlecase(text, ctx.locale)
            } else {
                text.to_string()
            }
        }
    }
}

fn is_known_to_user_dictionary(ctx: &PredictionContext, node: NodeId) -> bool {
    ctx.trie.value_or_null(node, USER_DICTIONARY_ID).is_some()
}

/// Rank `topk`'s entries, dedup by the post-case-shift text (first, i.e.
/// highest-confidence, occurrence wins), and build the output records.
fn rank_into_candidates(
    ctx: &PredictionContext,
    topk: TopK,
    flags: RequestFlags,
    max_suggestion_count: usize,
) -> SuggestResult {
    let ranked = topk.into_ranked(max_suggestion_count);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (idx, entry) in ranked.into_iter().enumerate() {
        let shifted = apply_case_shift(ctx, &entry.text, flags);
        if !seen.insert(shifted.clone()) {
            continue;
        }
        let confidence = confidence_linear(entry.confidence_log).min(0.9);
        out.push(SuggestCandidate {
            text: shifted,
            secondary_text: None,
            confidence,
            is_eligible_for_auto_commit: idx == 0 && confidence >= AUTO_COMMIT_THRESHOLD,
            is_eligible_for_user_removal: is_known_to_user_dictionary(ctx, entry.node),
        });
    }
    out
}

/// `suggest` per spec §4.5: `history` are the already-committed words,
/// `current_word` is the (possibly empty) word still being typed.
pub fn suggest(ctx: &PredictionContext, history: &[String], current_word: &str, flags: RequestFlags) -> SuggestResult {
    let max_suggestion_count = flags.effective_max_suggestion_count();
    let mut topk = TopK::new(max_suggestion_count);

    let m = history.len() + 1;
    let upper = (flags.max_ngram_level.max(1) as usize).min(m);

    let current_graphemes = ctx.graphemes.segment_graphemes(current_word, ctx.locale);
    let search_type = if current_graphemes.len() < 3 {
        SearchType::Proximity
    } else {
        SearchType::ProximityOrPrefix
    };

    for n in 1..=upper {
        if n == 1 {
            if current_word.is_empty() {
                continue;
            }
            run_fuzzy(
                ctx,
                ctx.trie.root(),
                &current_graphemes,
                search_type,
                EntryKind::Word,
                &ctx.weights.words,
                &mut topk,
                flags,
            );
            inject_shortcuts(ctx, &current_graphemes, &mut topk, flags);
        } else {
            let subngram = &history[history.len() - (n - 1)..];
            for node in resolve_subngram_nodes(ctx, subngram) {
                if let Some(sep_child) = ctx.trie.child(node, NGRAM_SEP) {
                    run_fuzzy(
                        ctx,
                        sep_child,
                        &current_graphemes,
                        search_type,
                        EntryKind::Ngram(n as u8),
                        &ctx.weights.ngrams,
                        &mut topk,
                        flags,
                    );
                }
            }
        }
    }

    rank_into_candidates(ctx, topk, flags, max_suggestion_count)
}

/// `spell` per spec §4.5/§6: reuses the same fuzzy machinery with
/// `ProximityWithoutSelf`; an exact terminal hit short-circuits to
/// `IN_DICTIONARY` regardless of flags.
pub fn spell(ctx: &PredictionContext, word: &str, flags: RequestFlags) -> SpellResult {
    if word.is_empty() {
        return SpellResult::unspecified();
    }

    let graphemes = ctx.graphemes.segment_graphemes(word, ctx.locale);
    if let Some(node) = ctx.trie.find_or_null(&graphemes) {
        let is_word = ctx
            .dictionaries
            .iter()
            .any(|d| ctx.trie.value_or_null(node, d.id).map(|v| v.word.is_some()).unwrap_or(false));
        if is_word {
            return SpellResult::in_dictionary();
        }
    }

    let max_suggestion_count = flags.effective_max_suggestion_count();
    let mut topk = TopK::new(max_suggestion_count);
    run_fuzzy(
        ctx,
        ctx.trie.root(),
        &graphemes,
        SearchType::ProximityWithoutSelf,
        EntryKind::Word,
        &ctx.weights.words,
        &mut topk,
        flags,
    );

    let ranked = topk.into_ranked(max_suggestion_count);
    let mut seen = HashSet::new();
    let mut suggestions = Vec::new();
    for entry in ranked {
        let shifted = apply_case_shift(ctx, &entry.text, flags);
        if seen.insert(shifted.clone()) {
            suggestions.push(shifted);
        }
    }
    SpellResult::typo(suggestions)
}
