//! Step tree
//!
//! Reconstructs the parent/child/sibling topology of nested steps from the
//! flat, nesting-level-annotated sequence the host runner supplies. A single
//! left-to-right pass over the records recovers the full tree from nesting
//! deltas alone: an auxiliary index remembers the most recent node seen at
//! each level, the parent of a record at level N is whatever that index holds
//! at N-1, and a previous sibling is linked only when the walk is not
//! descending into a level for the first time.
//!
//! Nodes live in an arena indexed by [`NodeId`]: the `children` list models
//! exclusive ownership, while `parent` and the sibling links are back-
//! references for traversal only.

use std::collections::HashMap;

use crate::directive::{self, Directive};
use crate::engine::StepOutcome;
use crate::error::StepError;

/// One step as supplied by the host runner. Never mutated by the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Raw step text
    pub text: String,
    /// Declared nesting depth; 0 is directly under the scenario root
    pub level: usize,
    /// Source position, if the host tracks one
    pub line: Option<usize>,
}

impl StepRecord {
    pub fn new(text: impl Into<String>, level: usize) -> Self {
        Self {
            text: text.into(),
            level,
            line: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// Arena index of a node in a [`StepTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The synthetic root of every tree
pub const ROOT: NodeId = NodeId(0);

/// The tree-execution unit for one step
#[derive(Debug)]
pub struct StepNode {
    /// Source record; `None` only for the synthetic root
    pub record: Option<StepRecord>,
    /// Nesting level after rebasing by the graft's starting nesting
    pub level: usize,
    /// Control-flow classification, parsed once at build time
    pub directive: Directive,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Terminal execution result; set once, never overwritten
    pub outcome: Option<StepOutcome>,
}

impl StepNode {
    pub fn text(&self) -> &str {
        self.record.as_ref().map(|r| r.text.as_str()).unwrap_or("")
    }
}

/// The per-level index threaded through grafts: most recent node seen at each
/// (rebased) nesting level, plus the previous record's level. Levels are
/// signed so the synthetic root can sit one below level 0.
#[derive(Debug)]
pub struct NestingIndex {
    map: HashMap<i64, NodeId>,
    last_level: i64,
}

impl NestingIndex {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            last_level: i64::MIN,
        }
    }
}

impl Default for NestingIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// A rooted tree of step nodes for one scenario run
#[derive(Debug)]
pub struct StepTree {
    nodes: Vec<StepNode>,
}

impl StepTree {
    /// An empty tree holding only the synthetic root.
    pub fn new() -> Self {
        Self {
            nodes: vec![StepNode {
                record: None,
                level: 0,
                directive: Directive::none(),
                parent: None,
                children: Vec::new(),
                prev_sibling: None,
                next_sibling: None,
                outcome: None,
            }],
        }
    }

    /// Build a tree from a scenario's record sequence. Classifies each step's
    /// directive up front; an unresolved directive fails the build.
    pub fn build(records: &[StepRecord]) -> Result<StepTree, StepError> {
        let mut tree = StepTree::new();
        let mut index = NestingIndex::new();
        tree.graft(records, 0, ROOT, &mut index)?;
        Ok(tree)
    }

    /// Graft a record sequence under `anchor`, rebasing each record's level
    /// by `starting_nesting`. The caller-owned `index` carries per-level
    /// state across grafts, so sub-sequences can be spliced into a larger
    /// tree the same way the scenario's own records are.
    pub fn graft(
        &mut self,
        records: &[StepRecord],
        starting_nesting: usize,
        anchor: NodeId,
        index: &mut NestingIndex,
    ) -> Result<(), StepError> {
        index.map.insert(starting_nesting as i64 - 1, anchor);

        for record in records {
            let directive = directive::classify(&record.text).map_err(|e| match record.line {
                Some(line) => e.with_line(line),
                None => e,
            })?;

            let level = record.level + starting_nesting;
            let id = self.push(record.clone(), level, directive);
            let lv = level as i64;

            // No contiguity enforced: after a level jump the parent is simply
            // whatever was last seen one level up, or nothing at all.
            if let Some(&parent) = index.map.get(&(lv - 1)) {
                self.attach_child(parent, id);
            }

            // Descending into a level for the first time starts a fresh
            // sibling chain; same-or-shallower levels continue one.
            if lv <= index.last_level {
                if let Some(&prev) = index.map.get(&lv) {
                    self.link_siblings(prev, id);
                }
            }

            index.map.insert(lv, id);
            index.last_level = lv;
        }
        Ok(())
    }

    fn push(&mut self, record: StepRecord, level: usize, directive: Directive) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StepNode {
            record: Some(record),
            level,
            directive,
            parent: None,
            children: Vec::new(),
            prev_sibling: None,
            next_sibling: None,
            outcome: None,
        });
        id
    }

    fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn link_siblings(&mut self, prev: NodeId, next: NodeId) {
        self.nodes[prev.0].next_sibling = Some(next);
        self.nodes[next.0].prev_sibling = Some(prev);
    }

    pub fn node(&self, id: NodeId) -> &StepNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut StepNode {
        &mut self.nodes[id.0]
    }

    /// Number of step nodes, excluding the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All step nodes in record (document) order, root excluded.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (1..self.nodes.len()).map(NodeId)
    }
}

impl Default for StepTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(levels: &[usize]) -> Vec<StepRecord> {
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| StepRecord::new(format!("step {}", i), level))
            .collect()
    }

    fn child_texts(tree: &StepTree, id: NodeId) -> Vec<String> {
        tree.node(id)
            .children
            .iter()
            .map(|&c| tree.node(c).text().to_string())
            .collect()
    }

    #[test]
    fn test_build_flat_sequence() {
        let tree = StepTree::build(&records(&[0, 0, 0])).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(child_texts(&tree, ROOT), vec!["step 0", "step 1", "step 2"]);
        // Sibling chain across the root's children
        let first = tree.node(ROOT).children[0];
        let second = tree.node(first).next_sibling.unwrap();
        assert_eq!(tree.node(second).text(), "step 1");
        assert_eq!(tree.node(second).prev_sibling, Some(first));
    }

    #[test]
    fn test_build_nested_topology() {
        // Levels [0,1,1,2,1,0]: one level-0 subtree with three level-1
        // children (the fourth record nests under the second), then a new
        // top-level node.
        let tree = StepTree::build(&records(&[0, 1, 1, 2, 1, 0])).unwrap();
        let roots = &tree.node(ROOT).children;
        assert_eq!(roots.len(), 2);

        let first_root = roots[0];
        assert_eq!(
            child_texts(&tree, first_root),
            vec!["step 1", "step 2", "step 4"]
        );

        let level1_first = tree.node(first_root).children[0];
        let level1_second = tree.node(level1_first).next_sibling.unwrap();
        assert_eq!(tree.node(level1_second).text(), "step 2");
        assert_eq!(child_texts(&tree, level1_second), vec!["step 3"]);

        // The second top-level node is a sibling of the first, not a child
        let second_root = roots[1];
        assert_eq!(tree.node(second_root).text(), "step 5");
        assert_eq!(tree.node(second_root).prev_sibling, Some(first_root));
        assert!(tree.node(second_root).children.is_empty());
    }

    #[test]
    fn test_first_descent_starts_fresh_sibling_chain() {
        let tree = StepTree::build(&records(&[0, 1, 0, 1])).unwrap();
        let roots = &tree.node(ROOT).children;
        let first_child = tree.node(roots[0]).children[0];
        let second_child = tree.node(roots[1]).children[0];
        // Each descent from level 0 into level 1 opens a fresh sibling
        // chain, so the two level-1 nodes are not linked to each other
        assert_eq!(tree.node(first_child).next_sibling, None);
        assert_eq!(tree.node(second_child).prev_sibling, None);
    }

    #[test]
    fn test_level_jump_attaches_to_last_seen_ancestor() {
        // Levels [0, 2]: level 2 has no level-1 ancestor yet, so the node
        // attaches nowhere; preserved as-is rather than "fixed".
        let tree = StepTree::build(&records(&[0, 2])).unwrap();
        let orphan = NodeId(2);
        assert_eq!(tree.node(orphan).parent, None);

        // Levels [0, 1, 2, 0, 2]: the final level-2 record attaches to the
        // stale level-1 node from the earlier branch.
        let tree = StepTree::build(&records(&[0, 1, 2, 0, 2])).unwrap();
        let stale_level1 = NodeId(2);
        let late = NodeId(5);
        assert_eq!(tree.node(late).parent, Some(stale_level1));
    }

    #[test]
    fn test_graft_rebases_levels() {
        let mut tree = StepTree::new();
        let mut index = NestingIndex::new();
        tree.graft(&records(&[0, 1]), 0, ROOT, &mut index).unwrap();
        let anchor = tree.node(ROOT).children[0];

        // Splice a sub-sequence beneath the first node at nesting 1
        let sub = vec![StepRecord::new("sub 0", 0), StepRecord::new("sub 1", 1)];
        tree.graft(&sub, 1, anchor, &mut index).unwrap();

        let sub_root = *tree.node(anchor).children.last().unwrap();
        assert_eq!(tree.node(sub_root).text(), "sub 0");
        assert_eq!(tree.node(sub_root).level, 1);
        assert_eq!(child_texts(&tree, sub_root), vec!["sub 1"]);
        assert_eq!(tree.node(tree.node(sub_root).children[0]).level, 2);
    }

    #[test]
    fn test_build_classifies_directives() {
        let recs = vec![
            StepRecord::new("do something", 0),
            StepRecord::new("ALWAYS RUN", 0),
        ];
        let tree = StepTree::build(&recs).unwrap();
        assert_eq!(
            tree.node(NodeId(2)).directive.flag,
            crate::directive::DirectiveFlag::AlwaysRun
        );
    }

    #[test]
    fn test_build_fails_fast_on_unresolved_directive() {
        let recs = vec![StepRecord::new("ALWAYS RUN AND EXPLODE", 0).with_line(12)];
        let err = StepTree::build(&recs).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.line, Some(12));
    }

    #[test]
    fn test_empty_records() {
        let tree = StepTree::build(&[]).unwrap();
        assert!(tree.is_empty());
        assert!(tree.node(ROOT).children.is_empty());
    }
}
