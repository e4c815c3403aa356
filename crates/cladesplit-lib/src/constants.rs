//! Constants and configuration defaults for cladesplit
//!
//! This module defines the default parameter values of the split and the
//! fixed output-format constants shared by the record writers.

/// Default seed for the deterministic random stream
pub const DEFAULT_SEED: u64 = 42;

/// Default target proportion of tips held out as test
pub const DEFAULT_TEST_PROPORTION: f64 = 0.1;

/// Default number of mutations to walk back from a seed tip
pub const DEFAULT_MUTATIONS_BACK: u64 = 5;

/// Default cap on a single clade, as a proportion of all tips
pub const DEFAULT_MAX_CLADE_PROPORTION: f64 = 0.01;

/// Default number of sampled train pairs
pub const DEFAULT_PAIRWISE_TRAIN_LIMIT: usize = 100_000;

/// Default number of sampled test pairs
pub const DEFAULT_PAIRWISE_TEST_LIMIT: usize = 50_000;

/// Consecutive rejected clade candidates before the partition is declared infeasible
pub const DEFAULT_MAX_RETRIES: usize = 1000;

/// Maximum number of files per shard
pub const DEFAULT_SHARD_CAPACITY: usize = 10_000;

/// Residues per line in emitted FASTA records
pub const FASTA_LINE_WIDTH: usize = 60;

/// Separator between the two tip names of a pairwise file
pub const PAIR_SEPARATOR: &str = "__";

/// Extension of every emitted record file
pub const RECORD_EXTENSION: &str = "fasta";

/// Prefix stripped from tip names when building file names
pub const STRIPPED_NAME_PREFIX: &str = "hCoV-19";

/// Characters removed from tip names when building file names
pub const UNSAFE_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Gap residue, ignored by the Hamming distance
pub const GAP: u8 = b'-';

/// Ambiguous residue, ignored by the Hamming distance
pub const AMBIGUOUS: u8 = b'N';

/// File name of the labelled branch table inside an output directory
pub const LABELED_TREE_FILENAME: &str = "tree_labeled.tsv";

/// Directory holding shard manifests inside an output directory
pub const SHARDS_DIRNAME: &str = "shards";

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Returns true if `residue` is skipped when comparing sequences
#[inline]
pub const fn is_ignored_residue(residue: u8) -> bool {
    matches!(residue.to_ascii_uppercase(), GAP | AMBIGUOUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_residues() {
        assert!(is_ignored_residue(b'-'));
        assert!(is_ignored_residue(b'N'));
        assert!(is_ignored_residue(b'n'));
        assert!(!is_ignored_residue(b'A'));
        assert!(!is_ignored_residue(b'T'));
        assert!(!is_ignored_residue(b'X'));
    }

    #[test]
    fn test_defaults_are_consistent() {
        assert!(DEFAULT_MAX_CLADE_PROPORTION <= 1.0);
        assert!(DEFAULT_TEST_PROPORTION > 0.0 && DEFAULT_TEST_PROPORTION <= 1.0);
        assert!(DEFAULT_SHARD_CAPACITY > 0);
        assert!(DEFAULT_MAX_RETRIES > 0);
    }
}
