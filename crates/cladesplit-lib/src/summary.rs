//! Dataset summary statistics
//!
//! Counters and distance statistics for one dataset, serialised as one entry
//! of a JSON object keyed by dataset name so several runs can share a file.

use crate::error::{Error, Result};
use crate::hamming::node_distance;
use crate::partition::Partition;
use crate::record::{Category, PairRecord, TrajectoryRecord};
use crate::shard::ShardManifest;
use crate::tree::Tree;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Min / max / mean of a set of distances (mean rounded to 2 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    /// Smallest value
    pub min: u64,
    /// Largest value
    pub max: u64,
    /// Arithmetic mean, rounded to 2 decimals
    pub mean: f64,
}

impl DistanceStats {
    /// Statistics of `values`, or `None` if there are none
    pub fn from_values<I: IntoIterator<Item = u64>>(values: I) -> Option<Self> {
        let mut count = 0u64;
        let mut sum = 0u128;
        let mut min = u64::MAX;
        let mut max = 0u64;
        for v in values {
            count += 1;
            sum += v as u128;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return None;
        }
        let mean = sum as f64 / count as f64;
        Some(Self { min, max, mean: (mean * 100.0).round() / 100.0 })
    }
}

/// Summary of one processed dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Source URL of the dataset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Number of tips
    pub num_tips: usize,
    /// Number of nodes (tips and internal)
    pub num_nodes: usize,
    /// Aligned sequence length
    pub sequence_length: usize,
    /// Tips labelled train
    pub train_tips: usize,
    /// Tips labelled test
    pub test_tips: usize,
    /// Number of test clades
    pub test_clades: usize,
    /// Tip distance at the end of each forward trajectory
    pub hamming_from_root: Option<DistanceStats>,
    /// Number of emitted nodes per forward trajectory
    pub path_depth: Option<DistanceStats>,
    /// Number of parent/child branches
    pub total_branches: usize,
    /// Branches whose endpoints have identical sequences
    pub zero_distance_branches: usize,
    /// Hamming distance across each branch
    pub per_branch_hamming: Option<DistanceStats>,
    /// Forward train records
    pub forwards_train: usize,
    /// Forward test records
    pub forwards_test: usize,
    /// Pairwise train records
    pub pairwise_train_pairs: usize,
    /// Pairwise test records
    pub pairwise_test_pairs: usize,
    /// Distances of the train pairs
    pub pairwise_train_hamming: Option<DistanceStats>,
    /// Distances of the test pairs
    pub pairwise_test_hamming: Option<DistanceStats>,
    /// Number of shards per category
    pub shards: BTreeMap<String, usize>,
}

impl DatasetSummary {
    /// Aggregate counters and statistics from the built records
    ///
    /// # Errors
    /// Returns [`crate::Error::SequenceLengthMismatch`] if a branch cannot be measured.
    pub fn collect(
        tree: &Tree,
        partition: &Partition,
        trajectories: &[TrajectoryRecord],
        train_pairs: &[PairRecord],
        test_pairs: &[PairRecord],
    ) -> Result<Self> {
        let branch_distances: Vec<u64> = tree
            .preorder()
            .par_iter()
            .filter_map(|&node| tree.parent(node).map(|parent| node_distance(tree, parent, node)))
            .collect::<Result<_>>()?;

        let forwards_test = trajectories
            .iter()
            .filter(|r| r.category == Category::ForwardsTest)
            .count();

        Ok(Self {
            url: None,
            num_tips: tree.num_tips(),
            num_nodes: tree.num_nodes(),
            sequence_length: tree.sequence_length(),
            train_tips: partition.num_train_tips(),
            test_tips: partition.num_test_tips(),
            test_clades: partition.num_clades(),
            hamming_from_root: DistanceStats::from_values(trajectories.iter().map(|r| r.tip_distance())),
            path_depth: DistanceStats::from_values(trajectories.iter().map(|r| r.depth() as u64)),
            total_branches: branch_distances.len(),
            zero_distance_branches: branch_distances.iter().filter(|&&d| d == 0).count(),
            per_branch_hamming: DistanceStats::from_values(branch_distances.iter().copied()),
            forwards_train: trajectories.len() - forwards_test,
            forwards_test,
            pairwise_train_pairs: train_pairs.len(),
            pairwise_test_pairs: test_pairs.len(),
            pairwise_train_hamming: DistanceStats::from_values(train_pairs.iter().map(|p| p.distance)),
            pairwise_test_hamming: DistanceStats::from_values(test_pairs.iter().map(|p| p.distance)),
            shards: BTreeMap::new(),
        })
    }

    /// Record the number of shards planned for each category
    pub fn record_shards(&mut self, manifests: &[ShardManifest]) {
        for manifest in manifests {
            *self.shards.entry(manifest.category.to_string()).or_insert(0) += 1;
        }
    }

    /// Insert this summary under `dataset` in the JSON object at `path`
    ///
    /// Other datasets already present in the file are kept.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSummary`] if the file exists but is not a JSON
    /// object; the file is left untouched.
    pub fn merge_into<P: AsRef<Path>>(&self, path: P, dataset: &str) -> Result<()> {
        let path = path.as_ref();
        let mut all = if path.exists() {
            match serde_json::from_str::<Value>(&std::fs::read_to_string(path)?)? {
                Value::Object(map) => map,
                _ => return Err(Error::InvalidSummary(path.display().to_string())),
            }
        } else {
            Map::new()
        };
        all.insert(dataset.to_string(), serde_json::to_value(self)?);
        std::fs::write(path, serde_json::to_string_pretty(&Value::Object(all))?)?;
        Ok(())
    }
}
