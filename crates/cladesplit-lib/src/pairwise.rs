//! Pairwise (tip-to-tip) record sampling
//!
//! Train pairs are drawn from all pairs of train tips. Test pairs are drawn
//! uniformly from the union of within-clade pairs, so a pair never crosses a
//! clade boundary and large clades are not under-represented relative to
//! small ones.
//!
//! Pairs are addressed by a global index into the concatenation of every
//! group's `n(n-1)/2` combinations. Sampling picks distinct indices without
//! replacement; the sorted indices are then decoded in a single sweep.

use crate::error::{Error, Result};
use crate::hamming::node_distance;
use crate::partition::Partition;
use crate::record::{Category, PairRecord};
use crate::tree::{NodeId, Tree};
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

#[inline]
fn pairs_in(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

/// All unordered pairs within each of a set of groups
#[derive(Debug, Clone)]
pub struct PairSpace {
    groups: Vec<Vec<NodeId>>,
    offsets: Vec<u64>,
    total: u64,
}

impl PairSpace {
    /// Build the pair space; groups with fewer than two members are dropped
    pub fn new(groups: Vec<Vec<NodeId>>) -> Self {
        let groups: Vec<Vec<NodeId>> = groups.into_iter().filter(|g| g.len() >= 2).collect();
        let mut offsets = Vec::with_capacity(groups.len());
        let mut total = 0u64;
        for group in &groups {
            offsets.push(total);
            total += pairs_in(group.len());
        }
        Self { groups, offsets, total }
    }

    /// Number of feasible pairs
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Every pair, group by group in combination order
    pub fn all_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::with_capacity(self.total as usize);
        for group in &self.groups {
            for (i, &a) in group.iter().enumerate() {
                for &b in &group[i + 1..] {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    /// Up to `limit` distinct pairs, uniformly without replacement
    ///
    /// When `limit` covers the whole space every pair is returned and no
    /// randomness is consumed.
    pub fn select<R: Rng + ?Sized>(&self, limit: usize, rng: &mut R) -> Vec<(NodeId, NodeId)> {
        if limit as u64 >= self.total {
            return self.all_pairs();
        }
        let mut indices: Vec<u64> = rand::seq::index::sample(rng, self.total as usize, limit)
            .into_iter()
            .map(|i| i as u64)
            .collect();
        indices.sort_unstable();
        self.decode_sorted(&indices)
    }

    /// Map ascending global pair indices to node pairs
    fn decode_sorted(&self, indices: &[u64]) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::with_capacity(indices.len());
        let mut group = 0usize;
        let mut row = 0usize;
        let mut row_start = self.offsets.first().copied().unwrap_or(0);

        for &index in indices {
            while index >= self.offsets[group] + pairs_in(self.groups[group].len()) {
                group += 1;
                row = 0;
                row_start = self.offsets[group];
            }
            let members = &self.groups[group];
            loop {
                let row_len = (members.len() - 1 - row) as u64;
                if index < row_start + row_len {
                    break;
                }
                row_start += row_len;
                row += 1;
            }
            let column = row + 1 + (index - row_start) as usize;
            pairs.push((members[row], members[column]));
        }
        pairs
    }
}

/// Samples train and test tip pairs from a partitioned tree
pub struct PairwiseSampler<'a> {
    tree: &'a Tree,
    partition: &'a Partition,
    train_limit: usize,
    test_limit: usize,
}

impl<'a> PairwiseSampler<'a> {
    /// Create a sampler with per-category pair limits
    pub fn new(tree: &'a Tree, partition: &'a Partition, train_limit: usize, test_limit: usize) -> Self {
        Self { tree, partition, train_limit, test_limit }
    }

    /// Sample pairs of distinct train tips
    ///
    /// # Errors
    /// [`Error::InsufficientTips`] if there are fewer than two train tips;
    /// [`Error::SequenceLengthMismatch`] if a pair cannot be compared.
    pub fn sample_train<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<PairRecord>> {
        let tips = self.partition.train_tips(self.tree);
        if tips.len() < 2 {
            return Err(Error::InsufficientTips { category: Category::PairwiseTrain, available: tips.len() });
        }
        let space = PairSpace::new(vec![tips]);
        let pairs = space.select(self.train_limit, rng);
        info!("Selected {} of {} train pairs", pairs.len(), space.total());
        self.measure(pairs, Category::PairwiseTrain)
    }

    /// Sample pairs of test tips that share a clade
    ///
    /// # Errors
    /// [`Error::InsufficientTips`] if there are fewer than two test tips;
    /// [`Error::SequenceLengthMismatch`] if a pair cannot be compared.
    pub fn sample_test<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<PairRecord>> {
        let available = self.partition.num_test_tips();
        if available < 2 {
            return Err(Error::InsufficientTips { category: Category::PairwiseTest, available });
        }
        let space = PairSpace::new(self.partition.test_tips_by_clade(self.tree));
        if space.total() == 0 {
            debug!("No test clade holds two tips; no test pairs");
        }
        let pairs = space.select(self.test_limit, rng);
        info!(
            "Selected {} of {} within-clade test pairs across {} clades",
            pairs.len(),
            space.total(),
            self.partition.num_clades()
        );
        self.measure(pairs, Category::PairwiseTest)
    }

    fn measure(&self, pairs: Vec<(NodeId, NodeId)>, category: Category) -> Result<Vec<PairRecord>> {
        pairs
            .into_par_iter()
            .map(|(first, second)| {
                let distance = node_distance(self.tree, first, second)?;
                Ok(PairRecord { first, second, category, distance })
            })
            .collect()
    }
}
