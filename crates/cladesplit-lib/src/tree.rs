//! Arena-backed phylogenetic tree
//!
//! Nodes are stored in a flat vector and addressed by [`NodeId`]. The
//! topology is immutable once built, so subtree tip counts, pre-order
//! positions and subtree sizes are aggregated once in a single post-order
//! pass and every later query is O(1).
//!
//! Because the pre-order is computed once, the descendants of any node are a
//! contiguous slice of it: [`Tree::descendants_of`] never re-walks the tree.

use crate::error::{Error, Result};
use ahash::AHashMap;

/// Index of a node in the tree arena
pub type NodeId = usize;

/// Flat description of one node, as produced by the input loaders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Unique node identifier
    pub id: String,
    /// Identifier of the parent node (`None` for the root)
    pub parent: Option<String>,
    /// Aligned sequence of the node
    pub sequence: Vec<u8>,
    /// Number of mutations on the branch leading into this node
    pub mutations: u64,
}

impl NodeSpec {
    /// Convenience constructor
    pub fn new(id: &str, parent: Option<&str>, sequence: &[u8], mutations: u64) -> Self {
        Self {
            id: id.to_string(),
            parent: parent.map(str::to_string),
            sequence: sequence.to_vec(),
            mutations,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    sequence: Vec<u8>,
    mutations: u64,
}

/// Rooted tree owning all of its nodes
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    index: AHashMap<String, NodeId>,
    tips: Vec<NodeId>,
    preorder: Vec<NodeId>,
    preorder_pos: Vec<usize>,
    subtree_sizes: Vec<usize>,
    tip_counts: Vec<usize>,
}

impl Tree {
    /// Build a rooted tree from a flat node list with parent links
    ///
    /// Children keep the order in which they appear in `specs`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedTree`] if the list is empty, an identifier is
    /// duplicated, a parent identifier is absent, there is not exactly one
    /// root, or some nodes are unreachable from the root (a cycle).
    pub fn build(specs: Vec<NodeSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::MalformedTree("tree has no nodes".to_string()));
        }

        let n = specs.len();
        let mut index = AHashMap::with_capacity(n);
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(Error::MalformedTree(format!("duplicate node identifier '{}'", spec.id)));
            }
        }

        let mut nodes = Vec::with_capacity(n);
        let mut roots = Vec::new();
        for (i, spec) in specs.into_iter().enumerate() {
            let parent = match &spec.parent {
                None => {
                    roots.push(i);
                    None
                }
                Some(parent_id) => Some(*index.get(parent_id).ok_or_else(|| {
                    Error::MalformedTree(format!(
                        "node '{}' references missing parent '{}'",
                        spec.id, parent_id
                    ))
                })?),
            };
            nodes.push(Node {
                id: spec.id,
                parent,
                children: Vec::new(),
                sequence: spec.sequence,
                mutations: spec.mutations,
            });
        }

        for i in 0..n {
            if let Some(p) = nodes[i].parent {
                nodes[p].children.push(i);
            }
        }

        let root = match roots.as_slice() {
            [] => {
                return Err(Error::MalformedTree(
                    "no root found: every node has a parent, so the parent links form a cycle".to_string(),
                ))
            }
            [root] => *root,
            [first, second, ..] => {
                return Err(Error::MalformedTree(format!(
                    "found {} roots ('{}', '{}', ...)",
                    roots.len(),
                    nodes[*first].id,
                    nodes[*second].id
                )))
            }
        };
        nodes[root].mutations = 0;

        // The part reachable from the root cannot contain a cycle, so this terminates.
        let mut preorder = Vec::with_capacity(n);
        let mut stack = vec![root];
        while let Some(v) = stack.pop() {
            preorder.push(v);
            stack.extend(nodes[v].children.iter().rev());
        }

        let mut preorder_pos = vec![usize::MAX; n];
        for (pos, &v) in preorder.iter().enumerate() {
            preorder_pos[v] = pos;
        }
        if preorder.len() != n {
            let stray = preorder_pos
                .iter()
                .position(|&pos| pos == usize::MAX)
                .map(|v| nodes[v].id.clone())
                .unwrap_or_default();
            return Err(Error::MalformedTree(format!(
                "{} nodes are unreachable from root '{}' (cycle through '{}')",
                n - preorder.len(),
                nodes[root].id,
                stray
            )));
        }

        let mut subtree_sizes = vec![1usize; n];
        let mut tip_counts = vec![0usize; n];
        for &v in preorder.iter().rev() {
            if nodes[v].children.is_empty() {
                tip_counts[v] = 1;
            }
            if let Some(p) = nodes[v].parent {
                tip_counts[p] += tip_counts[v];
                subtree_sizes[p] += subtree_sizes[v];
            }
        }

        let tips = preorder
            .iter()
            .copied()
            .filter(|&v| nodes[v].children.is_empty())
            .collect();

        Ok(Self {
            nodes,
            root,
            index,
            tips,
            preorder,
            preorder_pos,
            subtree_sizes,
            tip_counts,
        })
    }

    /// Root node
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of tips
    #[inline]
    pub fn num_tips(&self) -> usize {
        self.tips.len()
    }

    /// All tips, in pre-order
    #[inline]
    pub fn tips(&self) -> &[NodeId] {
        &self.tips
    }

    /// All nodes, in pre-order
    #[inline]
    pub fn preorder(&self) -> &[NodeId] {
        &self.preorder
    }

    /// Identifier of a node
    #[inline]
    pub fn id(&self, node: NodeId) -> &str {
        &self.nodes[node].id
    }

    /// Look up a node by identifier
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    /// Parent of a node (`None` for the root)
    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    /// Children of a node, in input order
    #[inline]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    /// Aligned sequence of a node
    #[inline]
    pub fn sequence(&self, node: NodeId) -> &[u8] {
        &self.nodes[node].sequence
    }

    /// Mutations on the branch leading into a node (0 for the root)
    #[inline]
    pub fn mutations(&self, node: NodeId) -> u64 {
        self.nodes[node].mutations
    }

    /// True if the node has no children
    #[inline]
    pub fn is_tip(&self, node: NodeId) -> bool {
        self.nodes[node].children.is_empty()
    }

    /// Number of tips in the subtree rooted at `node` (1 for a tip)
    #[inline]
    pub fn subtree_tip_count(&self, node: NodeId) -> usize {
        self.tip_counts[node]
    }

    /// Nodes from `node` (inclusive) up to and including the root
    pub fn ancestors_of(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors { tree: self, next: Some(node) }
    }

    /// All nodes in the subtree rooted at `node`, in pre-order, `node` first
    #[inline]
    pub fn descendants_of(&self, node: NodeId) -> &[NodeId] {
        let start = self.preorder_pos[node];
        &self.preorder[start..start + self.subtree_sizes[node]]
    }

    /// True if `ancestor` lies on the path from `node` to the root (reflexive)
    #[inline]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let start = self.preorder_pos[ancestor];
        let pos = self.preorder_pos[node];
        pos >= start && pos < start + self.subtree_sizes[ancestor]
    }

    /// Length of the aligned sequences, taken from the root
    pub fn sequence_length(&self) -> usize {
        self.nodes[self.root].sequence.len()
    }
}

/// Lazy walk from a node up to the root
///
/// Cloning the iterator restarts the walk from the current position.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// R -> (A -> T1, B)
    pub(crate) fn small_tree() -> Tree {
        Tree::build(vec![
            NodeSpec::new("R", None, b"AAAA", 0),
            NodeSpec::new("A", Some("R"), b"AAAT", 1),
            NodeSpec::new("B", Some("R"), b"ATAA", 1),
            NodeSpec::new("T1", Some("A"), b"AATT", 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_small_tree() {
        let tree = small_tree();
        assert_eq!(tree.num_nodes(), 4);
        assert_eq!(tree.num_tips(), 2);
        assert_eq!(tree.id(tree.root()), "R");

        let r = tree.find("R").unwrap();
        let a = tree.find("A").unwrap();
        let b = tree.find("B").unwrap();
        let t1 = tree.find("T1").unwrap();

        assert_eq!(tree.children(r), &[a, b]);
        assert_eq!(tree.parent(t1), Some(a));
        assert!(tree.is_tip(t1));
        assert!(tree.is_tip(b));
        assert!(!tree.is_tip(a));
        assert_eq!(tree.tips(), &[t1, b]);
        assert_eq!(tree.sequence_length(), 4);
    }

    #[test]
    fn test_subtree_tip_counts() {
        let tree = small_tree();
        assert_eq!(tree.subtree_tip_count(tree.find("R").unwrap()), 2);
        assert_eq!(tree.subtree_tip_count(tree.find("A").unwrap()), 1);
        assert_eq!(tree.subtree_tip_count(tree.find("B").unwrap()), 1);
        assert_eq!(tree.subtree_tip_count(tree.find("T1").unwrap()), 1);
    }

    #[test]
    fn test_ancestors_order_and_restart() {
        let tree = small_tree();
        let t1 = tree.find("T1").unwrap();
        let walk = tree.ancestors_of(t1);
        let ids: Vec<&str> = walk.clone().map(|v| tree.id(v)).collect();
        assert_eq!(ids, vec!["T1", "A", "R"]);
        assert_eq!(walk.count(), 3);

        let root_walk: Vec<NodeId> = tree.ancestors_of(tree.root()).collect();
        assert_eq!(root_walk, vec![tree.root()]);
    }

    #[test]
    fn test_descendants() {
        let tree = small_tree();
        let a = tree.find("A").unwrap();
        let t1 = tree.find("T1").unwrap();
        assert_eq!(tree.descendants_of(a), &[a, t1]);
        assert_eq!(tree.descendants_of(t1), &[t1]);
        assert_eq!(tree.descendants_of(tree.root()).len(), 4);
        assert!(tree.is_ancestor(a, t1));
        assert!(tree.is_ancestor(t1, t1));
        assert!(!tree.is_ancestor(t1, a));
        assert!(!tree.is_ancestor(tree.find("B").unwrap(), t1));
    }

    #[test]
    fn test_root_mutations_forced_to_zero() {
        let tree = Tree::build(vec![
            NodeSpec::new("R", None, b"AC", 7),
            NodeSpec::new("T", Some("R"), b"AG", 1),
        ])
        .unwrap();
        assert_eq!(tree.mutations(tree.root()), 0);
        assert_eq!(tree.mutations(tree.find("T").unwrap()), 1);
    }

    #[test]
    fn test_single_node_tree() {
        let tree = Tree::build(vec![NodeSpec::new("only", None, b"ACGT", 0)]).unwrap();
        assert_eq!(tree.num_tips(), 1);
        assert_eq!(tree.subtree_tip_count(tree.root()), 1);
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(matches!(Tree::build(Vec::new()), Err(Error::MalformedTree(_))));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let result = Tree::build(vec![
            NodeSpec::new("R1", None, b"A", 0),
            NodeSpec::new("R2", None, b"A", 0),
        ]);
        assert!(matches!(result, Err(Error::MalformedTree(_))));
    }

    #[test]
    fn test_dangling_parent_rejected() {
        let result = Tree::build(vec![
            NodeSpec::new("R", None, b"A", 0),
            NodeSpec::new("T", Some("missing"), b"A", 0),
        ]);
        assert!(matches!(result, Err(Error::MalformedTree(msg)) if msg.contains("missing")));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let result = Tree::build(vec![
            NodeSpec::new("R", None, b"A", 0),
            NodeSpec::new("R", Some("R"), b"A", 0),
        ]);
        assert!(matches!(result, Err(Error::MalformedTree(_))));
    }

    #[test]
    fn test_cycle_rejected() {
        // X and Y point at each other and hang off no root
        let result = Tree::build(vec![
            NodeSpec::new("R", None, b"A", 0),
            NodeSpec::new("T", Some("R"), b"A", 0),
            NodeSpec::new("X", Some("Y"), b"A", 0),
            NodeSpec::new("Y", Some("X"), b"A", 0),
        ]);
        assert!(matches!(result, Err(Error::MalformedTree(msg)) if msg.contains("unreachable")));

        let result = Tree::build(vec![
            NodeSpec::new("X", Some("Y"), b"A", 0),
            NodeSpec::new("Y", Some("X"), b"A", 0),
        ]);
        assert!(matches!(result, Err(Error::MalformedTree(_))));
    }
}
