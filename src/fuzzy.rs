//! Weighted Damerau–Levenshtein fuzzy search over the shared trie (spec
//! §4.4). There is no teacher counterpart to this algorithm: the teacher's
//! own `fuzzy.rs` was a phonetic alternation table (`FuzzyRule`/`FuzzyMap`,
//! see DESIGN.md), kept through the build as a sibling style reference for
//! penalty-table testing, not for the edit-distance recursion itself. The
//! per-call scratch (cost matrix rows + token buffer grown amortized, never
//! allocated inside the recursion body) follows DESIGN NOTES §9 directly.

use crate::config::{KeyProximityChecker, PredictionWeights};
use crate::grapheme::{is_special, Grapheme, GraphemeService};
use crate::trie::{NodeId, Trie};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Proximity,
    ProximityWithoutSelf,
    ProximityOrPrefix,
}

/// One emitted candidate. `path` is the grapheme sequence from the search
/// root to `node`; `cost` is the weighted edit distance (or, for a prefix
/// hit, the prefix-match cost plus an extension penalty proportional to
/// `extension_len`, the graphemes typed beyond the query).
#[derive(Debug, Clone)]
pub struct FuzzyHit {
    pub node: NodeId,
    pub path: Vec<Grapheme>,
    pub cost: u32,
    pub is_prefix: bool,
    pub extension_len: u32,
}

/// Per-call scratch: the query rows and the growable stack of token rows.
/// Rows are addressed by recursion depth and reused as the walk backtracks;
/// a row is only ever allocated the first time a given depth is reached.
struct Scratch {
    query: Vec<Grapheme>,
    query_opposite: Vec<Grapheme>,
    w: usize,
    token: Vec<Grapheme>,
    distances: Vec<Vec<u32>>,
    is_equal: Vec<Vec<bool>>,
    is_equal_ignoring_case: Vec<Vec<bool>>,
}

fn effective(pos: usize, start_of_str: u32, default: u32) -> u32 {
    if pos == 1 {
        start_of_str
    } else {
        default
    }
}

impl Scratch {
    fn new(query: Vec<Grapheme>, graphemes: &dyn GraphemeService, locale: &str) -> Self {
        let w = query.len();
        let query_opposite: Vec<Grapheme> = query
            .iter()
            .map(|g| graphemes.opposite_case(g, locale))
            .collect();

        let row0 = vec![0u32; w + 1];
        let mut eq0 = vec![false; w + 1];
        let mut eqci0 = vec![false; w + 1];
        eq0[0] = true;
        eqci0[0] = true;

        Self {
            query,
            query_opposite,
            w,
            token: vec![String::new()],
            distances: vec![row0],
            is_equal: vec![eq0],
            is_equal_ignoring_case: vec![eqci0],
        }
    }

    /// Fill row 0 (spec §4.4: `distances[0][j] = j * cost_insert_effective(j)`).
    fn init_row0(&mut self, weights: &PredictionWeights) {
        for j in 1..=self.w {
            let cost = effective(j, weights.cost_insert_start_of_str, weights.cost_insert);
            self.distances[0][j] = j as u32 * cost;
        }
    }

    /// Push a new token grapheme at depth `i = token.len() - 1` (after the
    /// push), computing row `i` from row `i - 1`. Column 0 of the new row
    /// follows spec's symmetric rule: `distances[i][0] = i * cost_insert_effective(i)`.
    fn push(&mut self, grapheme: &str, weights: &PredictionWeights, proximity: &KeyProximityChecker) {
        self.token.push(grapheme.to_string());
        let i = self.token.len() - 1;

        if self.distances.len() <= i {
            self.distances.push(vec![0u32; self.w + 1]);
            self.is_equal.push(vec![false; self.w + 1]);
            self.is_equal_ignoring_case.push(vec![false; self.w + 1]);
        }

        let insert_cost = effective(i, weights.cost_insert_start_of_str, weights.cost_insert);
        let delete_cost = effective(i, weights.cost_delete_start_of_str, weights.cost_delete);
        let sub_cost_default = effective(i, weights.cost_substitute_start_of_str, weights.cost_substitute);

        self.distances[i][0] = i as u32 * insert_cost;
        self.is_equal[i][0] = false;
        self.is_equal_ignoring_case[i][0] = false;

        for j in 1..=self.w {
            let t_i = self.token[i].clone();
            let q_j = self.query[j - 1].clone();
            let q_j_opp = self.query_opposite[j - 1].clone();

            let exact = t_i == q_j;
            let case_only = !exact && t_i == q_j_opp;

            let is_transpose = i > 1
                && j > 1
                && self.token[i - 1] == self.query[j - 1]
                && self.token[i] == self.query[j - 2];

            let substitution_cost = if exact {
                weights.cost_is_equal
            } else if case_only {
                weights.cost_is_equal_ignoring_case
            } else if is_transpose {
                weights.cost_transpose
            } else if proximity.is_proximate(&t_i, &q_j) {
                weights.cost_substitute_in_proximity
            } else {
                sub_cost_default
            };

            let from_insert = self.distances[i - 1][j] + insert_cost;
            let from_delete = self.distances[i][j - 1] + delete_cost;
            let from_sub = self.distances[i - 1][j - 1] + substitution_cost;
            self.distances[i][j] = from_insert.min(from_delete).min(from_sub);

            self.is_equal[i][j] = self.is_equal[i - 1][j - 1] && exact;
            self.is_equal_ignoring_case[i][j] =
                self.is_equal_ignoring_case[i - 1][j - 1] && (exact || case_only);
        }
    }

    fn pop(&mut self) {
        self.token.pop();
    }

    fn depth(&self) -> usize {
        self.token.len() - 1
    }

    fn candidate_cost(&self) -> u32 {
        self.distances[self.depth()][self.w]
    }

    fn lower_bound(&self) -> u32 {
        let i = self.depth();
        if i < self.w {
            self.distances[i][i]
        } else {
            self.candidate_cost()
        }
    }
}

/// Run a fuzzy search starting at `root` over `trie`'s word children
/// (special single-byte graphemes, e.g. `NGRAM_SEP`, are skipped here per
/// spec §3 — callers descend past them explicitly for n-gram context).
///
/// `query` is a grapheme sequence without the leading `""` sentinel (added
/// internally). `should_prune` folds in the confidence-domination prune
/// (spec §4.4 point 3's "second prune"): given a lower-bound edit cost,
/// return `true` to abandon the branch. `emit` receives every successful
/// candidate, in best-first order within each subtree.
#[allow(clippy::too_many_arguments)]
pub fn search(
    trie: &Trie,
    root: NodeId,
    query: &[Grapheme],
    search_type: SearchType,
    weights: &PredictionWeights,
    proximity: &KeyProximityChecker,
    graphemes: &dyn GraphemeService,
    locale: &str,
    should_prune: &mut dyn FnMut(u32) -> bool,
    emit: &mut dyn FnMut(FuzzyHit),
) {
    let mut scratch = Scratch::new(query.to_vec(), graphemes, locale);
    scratch.init_row0(weights);
    walk(trie, root, &mut scratch, search_type, weights, proximity, should_prune, emit);
}

#[allow(clippy::too_many_arguments)]
fn walk(
    trie: &Trie,
    node: NodeId,
    scratch: &mut Scratch,
    search_type: SearchType,
    weights: &PredictionWeights,
    proximity: &KeyProximityChecker,
    should_prune: &mut dyn FnMut(u32) -> bool,
    emit: &mut dyn FnMut(FuzzyHit),
) {
    let i = scratch.depth();
    let w = scratch.w;

    if i > 0 {
        let candidate_cost = scratch.candidate_cost();
        if candidate_cost <= weights.max_cost_sum {
            let is_self = i == w && scratch.token[1..] == scratch.query[..];
            let suppressed = matches!(search_type, SearchType::ProximityWithoutSelf) && is_self;
            if !suppressed {
                emit(FuzzyHit {
                    node,
                    path: scratch.token[1..].to_vec(),
                    cost: candidate_cost,
                    is_prefix: false,
                    extension_len: 0,
                });
            }
        }

        if matches!(search_type, SearchType::ProximityOrPrefix)
            && i > w
            && scratch.is_equal_ignoring_case[w][w]
        {
            let extension_len = (i - w) as u32;
            let prefix_cost = scratch.distances[w][w] + extension_len * weights.cost_insert;
            emit(FuzzyHit {
                node,
                path: scratch.token[1..].to_vec(),
                cost: prefix_cost,
                is_prefix: true,
                extension_len,
            });
        }
    }

    let lower_bound = scratch.lower_bound();
    if lower_bound >= weights.max_cost_sum {
        let prefix_still_feasible = matches!(search_type, SearchType::ProximityOrPrefix)
            && i >= w
            && scratch.is_equal_ignoring_case[w][w];
        if !prefix_still_feasible {
            return;
        }
    }
    if should_prune(lower_bound) {
        return;
    }

    let mut children = trie.children_sorted(node);
    children.retain(|(g, _)| !is_special(g));

    let mut scored: Vec<(String, NodeId, u32)> = children
        .into_iter()
        .map(|(g, child)| {
            scratch.push(&g, weights, proximity);
            let cost_so_far = scratch.candidate_cost().min(scratch.lower_bound());
            scratch.pop();
            (g, child, cost_so_far)
        })
        .collect();
    scored.sort_by_key(|(_, _, cost)| *cost);

    for (grapheme, child, _) in scored {
        scratch.push(&grapheme, weights, proximity);
        walk(trie, child, scratch, search_type, weights, proximity, should_prune, emit);
        scratch.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::WordProps;
    use crate::grapheme::UnicodeGraphemeService;

    fn insert(trie: &mut Trie, word: &str, score: u32) -> NodeId {
        let graphemes: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        let node = trie.find_or_create(&graphemes);
        let value = trie.value_or_create(node, 0);
        value.word = Some(WordProps::new(1, score));
        node
    }

    fn query(word: &str) -> Vec<Grapheme> {
        word.chars().map(|c| c.to_string()).collect()
    }

    fn default_run(trie: &Trie, q: &str, search_type: SearchType) -> Vec<FuzzyHit> {
        let weights = PredictionWeights::default();
        let proximity = KeyProximityChecker::default();
        let svc = UnicodeGraphemeService;
        let mut hits = Vec::new();
        search(
            trie,
            trie.root(),
            &query(q),
            search_type,
            &weights,
            &proximity,
            &svc,
            "en-US",
            &mut |_| false,
            &mut |hit| hits.push(hit),
        );
        hits
    }

    #[test]
    fn exact_match_has_zero_cost() {
        let mut trie = Trie::new();
        insert(&mut trie, "the", 1000);
        let hits = default_run(&trie, "the", SearchType::Proximity);
        assert!(hits.iter().any(|h| h.cost == 0 && h.path.join("") == "the"));
    }

    #[test]
    fn transpose_is_cheaper_than_two_substitutions() {
        let mut trie = Trie::new();
        insert(&mut trie, "the", 1000);
        insert(&mut trie, "tie", 10);
        let hits = default_run(&trie, "teh", SearchType::ProximityWithoutSelf);
        let the_cost = hits.iter().find(|h| h.path.join("") == "the").unwrap().cost;
        let tie_cost = hits.iter().find(|h| h.path.join("") == "tie").unwrap().cost;
        assert_eq!(the_cost, 1);
        assert!(tie_cost > the_cost);
    }

    #[test]
    fn without_self_excludes_exact_query() {
        let mut trie = Trie::new();
        insert(&mut trie, "the", 1000);
        let hits = default_run(&trie, "the", SearchType::ProximityWithoutSelf);
        assert!(!hits.iter().any(|h| h.path.join("") == "the" && h.cost == 0));
    }

    #[test]
    fn proximity_substitution_uses_reduced_cost() {
        let mut trie = Trie::new();
        insert(&mut trie, "hello", 500);
        let weights = PredictionWeights::default();
        let mut proximity = KeyProximityChecker::default();
        proximity.enabled = true;
        proximity.proximate.insert("h".to_string(), vec!["j".to_string()]);
        proximity.proximate.insert("j".to_string(), vec!["h".to_string()]);
        let svc = UnicodeGraphemeService;
        let mut hits = Vec::new();
        search(
            &trie,
            trie.root(),
            &query("jello"),
            SearchType::Proximity,
            &weights,
            &proximity,
            &svc,
            "en-US",
            &mut |_| false,
            &mut |hit| hits.push(hit),
        );
        let hit = hits.iter().find(|h| h.path.join("") == "hello").unwrap();
        assert_eq!(hit.cost, 1);
    }

    #[test]
    fn prefix_candidates_emitted_for_proximity_or_prefix() {
        let mut trie = Trie::new();
        insert(&mut trie, "hello", 500);
        insert(&mut trie, "help", 300);
        let hits = default_run(&trie, "hel", SearchType::ProximityOrPrefix);
        let prefixes: Vec<&FuzzyHit> = hits.iter().filter(|h| h.is_prefix).collect();
        assert!(prefixes.iter().any(|h| h.path.join("") == "hello"));
        assert!(prefixes.iter().any(|h| h.path.join("") == "help"));
        let help = prefixes.iter().find(|h| h.path.join("") == "help").unwrap();
        let hello = prefixes.iter().find(|h| h.path.join("") == "hello").unwrap();
        assert!(help.cost < hello.cost);
    }

    #[test]
    fn every_emitted_candidate_respects_max_cost_sum() {
        let mut trie = Trie::new();
        insert(&mut trie, "xyzxyz", 1);
        let weights = PredictionWeights::default();
        let hits = default_run(&trie, "abcabc", SearchType::Proximity);
        for h in &hits {
            assert!(h.cost <= weights.max_cost_sum);
        }
    }
}
