//! Forward (start-to-tip) trajectory extraction
//!
//! Train tips start at the tree root; test tips start at the root of their
//! clade so no test trajectory contains ancestry visible to training.
//! Distances are recomputed from sequences rather than taken from the stored
//! branch mutation counts.

use crate::error::Result;
use crate::hamming::node_distance;
use crate::partition::{Label, Partition};
use crate::record::{Category, TrajectoryEntry, TrajectoryRecord};
use crate::tree::{NodeId, Tree};
use rayon::prelude::*;

/// Builds forward trajectories from a partitioned tree
pub struct TrajectoryBuilder<'a> {
    tree: &'a Tree,
    partition: &'a Partition,
}

impl<'a> TrajectoryBuilder<'a> {
    /// Create a builder over a labelled tree
    pub fn new(tree: &'a Tree, partition: &'a Partition) -> Self {
        Self { tree, partition }
    }

    /// Node a tip's trajectory starts at
    pub fn start_of(&self, tip: NodeId) -> NodeId {
        match self.partition.label(tip) {
            Label::Test => self.partition.clade_root_of(tip).unwrap_or(self.tree.root()),
            _ => self.tree.root(),
        }
    }

    /// Build the trajectory of one tip
    ///
    /// Intermediate nodes that add no distance since the previously emitted
    /// node are skipped; the start and the tip are always emitted.
    ///
    /// # Errors
    /// Returns [`crate::Error::SequenceLengthMismatch`] if consecutive
    /// sequences on the path differ in length.
    pub fn build(&self, tip: NodeId) -> Result<TrajectoryRecord> {
        let start = self.start_of(tip);
        let mut path = Vec::new();
        for node in self.tree.ancestors_of(tip) {
            path.push(node);
            if node == start {
                break;
            }
        }
        path.reverse();

        let last = path.len() - 1;
        let mut entries = Vec::with_capacity(path.len());
        entries.push(TrajectoryEntry { node: path[0], distance: 0 });
        let mut cumulative = 0u64;
        for i in 1..path.len() {
            cumulative += node_distance(self.tree, path[i - 1], path[i])?;
            let previous = entries.last().map_or(0, |e: &TrajectoryEntry| e.distance);
            if cumulative == previous && i != last {
                continue;
            }
            entries.push(TrajectoryEntry { node: path[i], distance: cumulative });
        }

        let category = match self.partition.label(tip) {
            Label::Test => Category::ForwardsTest,
            _ => Category::ForwardsTrain,
        };
        Ok(TrajectoryRecord { tip, category, entries })
    }

    /// Build the trajectories of every tip, in tree tip order
    pub fn build_all(&self) -> Result<Vec<TrajectoryRecord>> {
        self.tree.tips().par_iter().map(|&tip| self.build(tip)).collect()
    }
}
