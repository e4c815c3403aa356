//! Clade-based train/test partitioning
//!
//! Test data is drawn from whole subtrees rather than random leaves:
//!
//! 1. Draw an unlabelled tip uniformly at random
//! 2. Walk towards the root until `mutations_back` mutations have accumulated;
//!    the node reached is the candidate clade root
//! 3. Reject the candidate if the clade holds more than `max_clade_proportion`
//!    of all tips, or if it would swallow an already labelled clade
//! 4. Otherwise label the whole subtree as test
//!
//! The loop stops once the test proportion is reached. Consecutive rejections
//! are bounded by `max_retries`; running out of retries is fatal.

use crate::config::SplitConfiguration;
use crate::error::{Error, Result};
use crate::tree::{NodeId, Tree};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Train/test label of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Not yet assigned
    Unset,
    /// Training data (or training context for internal nodes)
    Train,
    /// Inside a held-out test clade
    Test,
}

impl Label {
    /// Lowercase name used in the labelled tree export
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Unset => "unset",
            Label::Train => "train",
            Label::Test => "test",
        }
    }
}

/// Result of partitioning a tree: one label per node plus the test clades
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    labels: Vec<Label>,
    clade_roots: Vec<NodeId>,
    clade_of: Vec<Option<usize>>,
    num_tips: usize,
    num_test_tips: usize,
}

impl Partition {
    /// Label of a node
    #[inline]
    pub fn label(&self, node: NodeId) -> Label {
        self.labels[node]
    }

    /// All labels, indexed by node
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Clade roots in the order they were accepted
    pub fn clade_roots(&self) -> &[NodeId] {
        &self.clade_roots
    }

    /// Number of test clades
    pub fn num_clades(&self) -> usize {
        self.clade_roots.len()
    }

    /// Index of the test clade containing `node`
    #[inline]
    pub fn clade_of(&self, node: NodeId) -> Option<usize> {
        self.clade_of[node]
    }

    /// Root of the test clade containing `node`
    #[inline]
    pub fn clade_root_of(&self, node: NodeId) -> Option<NodeId> {
        self.clade_of[node].map(|c| self.clade_roots[c])
    }

    /// Number of tips labelled test
    pub fn num_test_tips(&self) -> usize {
        self.num_test_tips
    }

    /// Number of tips labelled train
    pub fn num_train_tips(&self) -> usize {
        self.num_tips - self.num_test_tips
    }

    /// Proportion of tips labelled test
    pub fn test_fraction(&self) -> f64 {
        fraction(self.num_test_tips, self.num_tips)
    }

    /// Train tips, in pre-order
    pub fn train_tips(&self, tree: &Tree) -> Vec<NodeId> {
        tree.tips()
            .iter()
            .copied()
            .filter(|&t| self.labels[t] == Label::Train)
            .collect()
    }

    /// Test tips grouped by clade (clade order, pre-order within each clade)
    pub fn test_tips_by_clade(&self, tree: &Tree) -> Vec<Vec<NodeId>> {
        self.clade_roots
            .iter()
            .map(|&root| {
                tree.descendants_of(root)
                    .iter()
                    .copied()
                    .filter(|&v| tree.is_tip(v))
                    .collect()
            })
            .collect()
    }
}

#[inline]
fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Pool of unlabelled tips supporting O(1) uniform draws and removals
struct TipPool {
    tips: Vec<NodeId>,
    position: Vec<usize>,
}

impl TipPool {
    fn new(tree: &Tree) -> Self {
        let tips = tree.tips().to_vec();
        let mut position = vec![usize::MAX; tree.num_nodes()];
        for (i, &t) in tips.iter().enumerate() {
            position[t] = i;
        }
        Self { tips, position }
    }

    fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> NodeId {
        // u64 range keeps draws identical across pointer widths
        let i = rng.gen_range(0..self.tips.len() as u64) as usize;
        self.tips[i]
    }

    fn remove(&mut self, tip: NodeId) {
        let i = self.position[tip];
        if i == usize::MAX {
            return;
        }
        self.tips.swap_remove(i);
        if let Some(&moved) = self.tips.get(i) {
            self.position[moved] = i;
        }
        self.position[tip] = usize::MAX;
    }
}

/// Selects held-out test clades on a tree
#[derive(Debug, Clone)]
pub struct CladePartitioner<'a> {
    tree: &'a Tree,
    test_proportion: f64,
    mutations_back: u64,
    max_clade_proportion: f64,
    max_retries: usize,
}

impl<'a> CladePartitioner<'a> {
    /// Create a partitioner for `tree` using the split parameters of `config`
    pub fn new(tree: &'a Tree, config: &SplitConfiguration) -> Self {
        Self {
            tree,
            test_proportion: config.test_proportion,
            mutations_back: config.mutations_back,
            max_clade_proportion: config.max_clade_proportion,
            max_retries: config.max_retries,
        }
    }

    /// Walk from `tip` towards the root and return the candidate clade root
    ///
    /// The accumulated count starts at 0 on `tip`; each step adds the
    /// mutations of the branch just left behind. The first node whose
    /// accumulated count reaches `mutations_back` is returned, or the root if
    /// the threshold is never reached.
    pub fn find_clade_root(&self, tip: NodeId) -> NodeId {
        let mut accumulated = 0u64;
        let mut clade_root = tip;
        for node in self.tree.ancestors_of(tip) {
            clade_root = node;
            if accumulated >= self.mutations_back {
                break;
            }
            accumulated = accumulated.saturating_add(self.tree.mutations(node));
        }
        clade_root
    }

    /// Label the tree, consuming draws from `rng`
    ///
    /// # Errors
    /// Returns [`Error::PartitionInfeasible`] if `max_retries` consecutive
    /// candidates are rejected, or if no clade can fit under
    /// `max_clade_proportion` at all.
    pub fn partition<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Partition> {
        let tree = self.tree;
        let n = tree.num_nodes();
        let total_tips = tree.num_tips();

        let mut labels = vec![Label::Unset; n];
        let mut clade_of = vec![None; n];
        let mut clade_roots = Vec::new();
        // Test tips inside each subtree; only ancestor chains of accepted clades are touched
        let mut test_tips_below = vec![0usize; n];
        let mut pool = TipPool::new(tree);
        let mut num_test_tips = 0usize;
        let mut rejections = 0usize;

        if self.test_proportion > 0.0 && fraction(1, total_tips) > self.max_clade_proportion {
            return Err(Error::PartitionInfeasible {
                achieved: 0.0,
                target: self.test_proportion,
                attempts: 0,
            });
        }

        while fraction(num_test_tips, total_tips) < self.test_proportion {
            if pool.is_empty() {
                return Err(Error::PartitionInfeasible {
                    achieved: fraction(num_test_tips, total_tips),
                    target: self.test_proportion,
                    attempts: rejections,
                });
            }

            let seed_tip = pool.draw(rng);
            let clade_root = self.find_clade_root(seed_tip);
            let clade_tips = tree.subtree_tip_count(clade_root);

            let rejected = if fraction(clade_tips, total_tips) > self.max_clade_proportion {
                debug!(
                    "Rejected clade at '{}' from seed '{}': {} tips exceeds cap",
                    tree.id(clade_root),
                    tree.id(seed_tip),
                    clade_tips
                );
                true
            } else if labels[clade_root] == Label::Test || test_tips_below[clade_root] > 0 {
                debug!(
                    "Rejected clade at '{}' from seed '{}': overlaps an existing clade",
                    tree.id(clade_root),
                    tree.id(seed_tip)
                );
                true
            } else {
                false
            };

            if rejected {
                rejections += 1;
                if rejections >= self.max_retries {
                    return Err(Error::PartitionInfeasible {
                        achieved: fraction(num_test_tips, total_tips),
                        target: self.test_proportion,
                        attempts: rejections,
                    });
                }
                continue;
            }
            rejections = 0;

            let clade = clade_roots.len();
            clade_roots.push(clade_root);
            for &v in tree.descendants_of(clade_root) {
                labels[v] = Label::Test;
                clade_of[v] = Some(clade);
                if tree.is_tip(v) {
                    pool.remove(v);
                }
            }
            for a in tree.ancestors_of(clade_root) {
                test_tips_below[a] += clade_tips;
            }
            num_test_tips += clade_tips;

            debug!(
                "Accepted clade {} at '{}' from seed '{}' ({} tips)",
                clade,
                tree.id(clade_root),
                tree.id(seed_tip),
                clade_tips
            );
        }

        for label in labels.iter_mut() {
            if *label == Label::Unset {
                *label = Label::Train;
            }
        }

        info!(
            "Partitioned {} tips: {} test in {} clades ({:.1}%), {} train",
            total_tips,
            num_test_tips,
            clade_roots.len(),
            100.0 * fraction(num_test_tips, total_tips),
            total_tips - num_test_tips
        );

        Ok(Partition {
            labels,
            clade_roots,
            clade_of,
            num_tips: total_tips,
            num_test_tips,
        })
    }
}
