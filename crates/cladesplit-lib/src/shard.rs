//! Deterministic sharding of record files
//!
//! File names are sorted first so the plan depends only on the set of files,
//! then shuffled with a seeded ChaCha stream and cut into consecutive chunks.

use crate::record::Category;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Members of one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    /// Category the files belong to
    pub category: Category,
    /// Position of the shard within its category
    pub index: usize,
    /// Shard name, `{category}-{index:03}`
    pub name: String,
    /// File names, in shuffled order
    pub files: Vec<String>,
}

/// Name of the `index`-th shard of a category
pub fn shard_name(category: Category, index: usize) -> String {
    format!("{}-{:03}", category, index)
}

/// Plans fixed-capacity shards per category
#[derive(Debug, Clone, Copy)]
pub struct ShardPackager {
    seed: u64,
    capacity: usize,
}

impl ShardPackager {
    /// Create a packager; `capacity` is the maximum number of files per shard
    pub fn new(seed: u64, capacity: usize) -> Self {
        Self { seed, capacity: capacity.max(1) }
    }

    /// Shuffle and chunk the files of one category
    pub fn plan(&self, category: Category, mut files: Vec<String>) -> Vec<ShardManifest> {
        files.sort_unstable();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        files.shuffle(&mut rng);

        files
            .chunks(self.capacity)
            .enumerate()
            .map(|(index, chunk)| ShardManifest {
                category,
                index,
                name: shard_name(category, index),
                files: chunk.to_vec(),
            })
            .collect()
    }
}
