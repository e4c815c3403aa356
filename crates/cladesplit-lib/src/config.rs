//! Split configuration
//!
//! Parameters of the clade partitioner, the pair samplers and the shard
//! packager, plus resource limits for the parallel stages.

use crate::constants::{
    DEFAULT_MAX_CLADE_PROPORTION, DEFAULT_MAX_RETRIES, DEFAULT_MUTATIONS_BACK,
    DEFAULT_PAIRWISE_TEST_LIMIT, DEFAULT_PAIRWISE_TRAIN_LIMIT, DEFAULT_SEED,
    DEFAULT_SHARD_CAPACITY, DEFAULT_TEST_PROPORTION,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration parameters for splitting a tree and extracting records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfiguration {
    /// Target proportion of tips labelled test (0 disables the partitioner)
    pub test_proportion: f64,

    /// Mutations accumulated from a seed tip before a clade root is chosen
    pub mutations_back: u64,

    /// Largest allowed clade, as a proportion of all tips
    pub max_clade_proportion: f64,

    /// Seed of the deterministic random stream
    pub seed: u64,

    /// Maximum number of train pairs
    pub pairwise_train_limit: usize,

    /// Maximum number of test pairs
    pub pairwise_test_limit: usize,

    /// Consecutive rejected clade candidates tolerated before giving up
    pub max_retries: usize,

    /// Maximum number of files per shard
    pub shard_capacity: usize,

    /// Number of threads for parallel stages (0 = all available cores)
    pub num_threads: usize,
}

impl Default for SplitConfiguration {
    fn default() -> Self {
        Self {
            test_proportion: DEFAULT_TEST_PROPORTION,
            mutations_back: DEFAULT_MUTATIONS_BACK,
            max_clade_proportion: DEFAULT_MAX_CLADE_PROPORTION,
            seed: DEFAULT_SEED,
            pairwise_train_limit: DEFAULT_PAIRWISE_TRAIN_LIMIT,
            pairwise_test_limit: DEFAULT_PAIRWISE_TEST_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            shard_capacity: DEFAULT_SHARD_CAPACITY,
            num_threads: 0,
        }
    }
}

impl SplitConfiguration {
    /// Load a configuration from a JSON file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.test_proportion) {
            return Err(Error::InvalidConfig(format!(
                "test_proportion must be in [0.0, 1.0], got {}",
                self.test_proportion
            )));
        }
        if !(self.max_clade_proportion > 0.0 && self.max_clade_proportion <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_clade_proportion must be in (0.0, 1.0], got {}",
                self.max_clade_proportion
            )));
        }
        if self.max_retries == 0 {
            return Err(Error::InvalidConfig("max_retries must be at least 1".to_string()));
        }
        if self.shard_capacity == 0 {
            return Err(Error::InvalidConfig("shard_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Split Configuration:");
        tracing::info!("  test_proportion = {}", self.test_proportion);
        tracing::info!("  mutations_back = {}", self.mutations_back);
        tracing::info!("  max_clade_proportion = {}", self.max_clade_proportion);
        tracing::info!("  seed = {}", self.seed);
        tracing::debug!("  pairwise_train_limit = {}", self.pairwise_train_limit);
        tracing::debug!("  pairwise_test_limit = {}", self.pairwise_test_limit);
        tracing::debug!("  max_retries = {}", self.max_retries);
        tracing::debug!("  shard_capacity = {}", self.shard_capacity);
        if self.num_threads == 0 {
            tracing::info!("  num_threads = all available cores");
        } else {
            tracing::info!("  num_threads = {}", self.num_threads);
        }
    }
}
