//! Error types for cladesplit

use crate::record::Category;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the tree model, the partitioner and the record builders
#[derive(Error, Debug)]
pub enum Error {
    /// A structural tree invariant is violated (multiple roots, cycle, dangling parent)
    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    /// No valid clade was found within the retry budget
    #[error(
        "Partition infeasible: test proportion {achieved:.4} reached, target {target:.4}, \
         gave up after {attempts} consecutive rejected clades"
    )]
    PartitionInfeasible {
        /// Proportion of tips labelled test when the partitioner gave up
        achieved: f64,
        /// Requested test proportion
        target: f64,
        /// Consecutive rejected candidates
        attempts: usize,
    },

    /// Fewer than two tips are available for pair sampling
    #[error("Insufficient tips for {category} pairs: {available} available, at least 2 required")]
    InsufficientTips {
        /// Category that was requested
        category: Category,
        /// Number of candidate tips
        available: usize,
    },

    /// Two sequences that must be compared have different lengths
    #[error("Sequence length mismatch: {first} has length {first_len}, {second} has length {second_len}")]
    SequenceLengthMismatch {
        /// First node identifier
        first: String,
        /// Length of the first sequence
        first_len: usize,
        /// Second node identifier
        second: String,
        /// Length of the second sequence
        second_len: usize,
    },

    /// A configuration parameter is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An existing summary file does not hold a JSON object
    #[error("Invalid summary file {0}: expected a JSON object keyed by dataset")]
    InvalidSummary(String),

    /// The worker thread pool could not be created
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
