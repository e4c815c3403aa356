// cladesplit: clade-based train/test splitting of phylogenetic trees
//
// Partitions a tree into train and test clades and extracts forward
// trajectories and tip pairs as FASTA records.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod config;
pub mod tree;
pub mod hamming;
pub mod partition;
pub mod record;
pub mod trajectory;
pub mod pairwise;
pub mod shard;
pub mod summary;
pub mod io;
pub mod pipeline;

// Re-export common types at crate root
pub use error::{Error, Result};
pub use config::SplitConfiguration;
pub use tree::{NodeId, NodeSpec, Tree};
pub use partition::{CladePartitioner, Label, Partition};
pub use record::{Category, FastaRecord, PairRecord, TrajectoryRecord};
pub use trajectory::TrajectoryBuilder;
pub use pairwise::PairwiseSampler;
pub use shard::{ShardManifest, ShardPackager};
pub use summary::DatasetSummary;
pub use pipeline::{Dataset, DatasetBuilder};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}
