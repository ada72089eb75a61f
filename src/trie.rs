//! Arena-indexed trie shared by every dictionary in a session (spec §3, §4.1).
//!
//! The teacher's original `core/src/trie.rs` was a single-purpose syllable
//! trie built from owned `Box<TrieNode>` children with no per-dictionary
//! values (see DESIGN.md). Per DESIGN NOTES §9 ("prefer an arena + indices...
//! flattens the multi-map of `(node, dict_id) -> entry-value` into a
//! small-map of dict-ids on each node, and keeps recursion cache-friendly")
//! this is rewritten as a flat node arena addressed by index, generalized to
//! carry one `EntryValue` per dictionary id at each node. The flat-arena
//! shape itself is additionally grounded on the reference file
//! `other_examples/.../PHiBBeRR-PulseArc__crates-common-src-collections-trie.rs.rs`.

use ahash::AHashMap;

use crate::entry::{DictionaryId, EntryValue};

/// Index of a node within a `Trie`'s arena. `ROOT` is always node 0.
pub type NodeId = u32;

pub const ROOT: NodeId = 0;

#[derive(Debug, Default)]
struct Node {
    /// Grapheme -> child node id. Insertion order is irrelevant; iteration
    /// order for `for_each` is lexicographic by grapheme bytes, chosen as
    /// the "stable order" spec §4.1 asks implementers to document (tests in
    /// spec §8 assume this ordering).
    children: AHashMap<String, NodeId>,
    /// Per-dictionary entry value. A node participates in dictionary `d`
    /// iff `values` contains an entry for `d` (spec §3 inv. 1).
    values: AHashMap<DictionaryId, EntryValue>,
    /// Used only to reconstruct a word path; does not imply ownership
    /// (ownership flows parent -> child, spec §3).
    parent: Option<NodeId>,
    /// The grapheme that labels the edge from `parent` to this node. `None`
    /// only for the root.
    incoming: Option<String>,
}

/// The shared character trie. Nodes are created on demand by
/// [`Trie::find_or_create`] and never deleted (spec §3 lifecycle): there is
/// no in-place node deletion, only whole-session teardown.
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<Node>,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up `path` from the root without creating anything. Returns
    /// `None` if any prefix segment is missing.
    pub fn find_or_null(&self, path: &[impl AsRef<str>]) -> Option<NodeId> {
        let mut cur = ROOT;
        for g in path {
            let node = &self.nodes[cur as usize];
            cur = *node.children.get(g.as_ref())?;
        }
        Some(cur)
    }

    /// Look up `path` from the root, creating missing nodes along the way.
    /// The only mutating trie operation used at training time (spec §4.1);
    /// callers must hold the write lock (spec §5).
    pub fn find_or_create(&mut self, path: &[impl AsRef<str>]) -> NodeId {
        let mut cur = ROOT;
        for g in path {
            let g = g.as_ref();
            let existing = self.nodes[cur as usize].children.get(g).copied();
            cur = match existing {
                Some(child) => child,
                None => {
                    let new_id = self.nodes.len() as NodeId;
                    self.nodes.push(Node {
                        parent: Some(cur),
                        incoming: Some(g.to_string()),
                        ..Node::default()
                    });
                    self.nodes[cur as usize]
                        .children
                        .insert(g.to_string(), new_id);
                    new_id
                }
            };
        }
        cur
    }

    pub fn child(&self, node: NodeId, grapheme: &str) -> Option<NodeId> {
        self.nodes[node as usize].children.get(grapheme).copied()
    }

    /// Children of `node` in deterministic (lexicographic) order.
    pub fn children_sorted(&self, node: NodeId) -> Vec<(String, NodeId)> {
        let mut out: Vec<(String, NodeId)> = self.nodes[node as usize]
            .children
            .iter()
            .map(|(g, id)| (g.clone(), *id))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn value_or_null(&self, node: NodeId, dict: DictionaryId) -> Option<&EntryValue> {
        self.nodes[node as usize].values.get(&dict)
    }

    pub fn value_or_create(&mut self, node: NodeId, dict: DictionaryId) -> &mut EntryValue {
        self.nodes[node as usize].values.entry(dict).or_default()
    }

    /// Remove a dictionary's value at `node` if it has become empty. Used
    /// after training/serialization cleanups; never removes the node itself.
    pub fn prune_empty_value(&mut self, node: NodeId, dict: DictionaryId) {
        let node_ref = &mut self.nodes[node as usize];
        if let Some(v) = node_ref.values.get(&dict) {
            if v.is_empty() {
                node_ref.values.remove(&dict);
            }
        }
    }

    pub fn values(&self, node: NodeId) -> impl Iterator<Item = (&DictionaryId, &EntryValue)> {
        self.nodes[node as usize].values.iter()
    }

    /// Reconstruct the grapheme path from the root to `node` by walking
    /// parent pointers (spec §3: parent back-reference is used only for
    /// word reconstruction).
    pub fn path_to(&self, node: NodeId) -> Vec<String> {
        let mut segs = Vec::new();
        let mut cur = node;
        while let Some(incoming) = &self.nodes[cur as usize].incoming {
            segs.push(incoming.clone());
            cur = self.nodes[cur as usize].parent.unwrap();
        }
        segs.reverse();
        segs
    }

    /// Pre-order traversal starting at `start`, descending into every child
    /// whose key is not in `termination_tokens` (spec §4.1). `action`
    /// receives the grapheme path accumulated since `start` (not including
    /// graphemes leading to `start` itself) and the node id.
    pub fn for_each<F>(&self, start: NodeId, termination_tokens: &[&str], action: &mut F)
    where
        F: FnMut(&[String], NodeId),
    {
        let mut path = Vec::new();
        self.walk(start, termination_tokens, &mut path, action);
    }

    fn walk<F>(&self, node: NodeId, termination: &[&str], path: &mut Vec<String>, action: &mut F)
    where
        F: FnMut(&[String], NodeId),
    {
        action(path, node);
        for (grapheme, child) in self.children_sorted(node) {
            if termination.contains(&grapheme.as_str()) {
                continue;
            }
            path.push(grapheme);
            self.walk(child, termination, path, action);
            path.pop();
        }
    }
}
