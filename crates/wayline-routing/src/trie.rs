//! Segment-keyed path trie
//!
//! Holds the path-constrained routes that cannot live in the exact
//! literal index: subtree prefixes and wildcard patterns. Nodes live in
//! a linear arena and reference each other by index, and routes are
//! referenced by their slot in the compiled-route arena, so the
//! structure stays free of owning pointers between routes.

use std::collections::HashMap;
use wayline_core::route::PathSegment;

const NULL_NODE: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct TrieNode {
    /// Literal segment transitions
    children: HashMap<String, u32>,
    /// Single-segment wildcard transition
    wildcard: u32,
    /// Wildcard patterns that terminate exactly at this node
    terminal: Vec<usize>,
    /// Tail-wildcard patterns anchored at this node
    tail: Vec<usize>,
    /// Subtree prefixes anchored at this node
    subtree: Vec<usize>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            wildcard: NULL_NODE,
            terminal: Vec::new(),
            tail: Vec::new(),
            subtree: Vec::new(),
        }
    }
}

/// Candidate route slots found by a walk. Each list preserves the
/// insertion (compile-sorted) order.
#[derive(Debug, Default)]
pub(crate) struct WalkResult<'t> {
    /// Wildcard patterns consuming the whole path
    pub exact: &'t [usize],
    /// Deepest tail-wildcard anchor passed on the walk
    pub tail: &'t [usize],
    /// Deepest subtree anchor passed on the walk
    pub subtree: &'t [usize],
}

impl WalkResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.tail.is_empty() && self.subtree.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct PathTrie {
    nodes: Vec<TrieNode>,
}

impl PathTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new()],
        }
    }

    fn child(&mut self, node: u32, segment: &str) -> u32 {
        if let Some(&next) = self.nodes[node as usize].children.get(segment) {
            return next;
        }
        let next = self.nodes.len() as u32;
        self.nodes.push(TrieNode::new());
        self.nodes[node as usize]
            .children
            .insert(segment.to_string(), next);
        next
    }

    fn wildcard_child(&mut self, node: u32) -> u32 {
        if self.nodes[node as usize].wildcard != NULL_NODE {
            return self.nodes[node as usize].wildcard;
        }
        let next = self.nodes.len() as u32;
        self.nodes.push(TrieNode::new());
        self.nodes[node as usize].wildcard = next;
        next
    }

    /// Insert an exact pattern with wildcards. `slot` is the route's
    /// index in the compiled-route arena.
    pub fn insert_pattern(&mut self, segments: &[PathSegment], slot: usize) {
        let mut cur = 0u32;
        for seg in segments {
            match seg {
                PathSegment::Literal(lit) => cur = self.child(cur, lit),
                PathSegment::Wildcard(_) => cur = self.wildcard_child(cur),
                PathSegment::Tail(_) => {
                    self.nodes[cur as usize].tail.push(slot);
                    return;
                }
            }
        }
        self.nodes[cur as usize].terminal.push(slot);
    }

    /// Insert a subtree prefix. The prefix contains only literal
    /// segments.
    pub fn insert_subtree(&mut self, segments: &[&str], slot: usize) {
        let mut cur = 0u32;
        for seg in segments {
            cur = self.child(cur, seg);
        }
        self.nodes[cur as usize].subtree.push(slot);
    }

    /// Walk the request path. Literal transitions are preferred over
    /// wildcard transitions; the walk does not backtrack.
    pub fn walk<'t>(&'t self, segments: &[&str]) -> WalkResult<'t> {
        let mut result = WalkResult::default();
        let mut cur = 0u32;
        self.note(cur, &mut result);

        for seg in segments {
            let node = &self.nodes[cur as usize];
            let next = match node.children.get(*seg) {
                Some(&next) => next,
                None if node.wildcard != NULL_NODE => node.wildcard,
                None => return result,
            };
            cur = next;
            self.note(cur, &mut result);
        }

        result.exact = &self.nodes[cur as usize].terminal;
        result
    }

    fn note<'t>(&'t self, node: u32, result: &mut WalkResult<'t>) {
        let node = &self.nodes[node as usize];
        if !node.tail.is_empty() {
            result.tail = &node.tail;
        }
        if !node.subtree.is_empty() {
            result.subtree = &node.subtree;
        }
    }

    #[cfg(test)]
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
