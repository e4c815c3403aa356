//! Hamming distance between aligned sequences
//!
//! Residues are compared case-insensitively. Positions where either sequence
//! carries a gap (`-`) or an ambiguous base (`N`) are skipped.

use crate::constants::is_ignored_residue;
use crate::error::{Error, Result};
use crate::tree::{NodeId, Tree};

/// Count differing positions of two equal-length sequences
///
/// Returns `None` if the lengths differ.
#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> Option<u64> {
    if a.len() != b.len() {
        return None;
    }
    let distance = a
        .iter()
        .zip(b)
        .filter(|&(&x, &y)| {
            !is_ignored_residue(x) && !is_ignored_residue(y) && !x.eq_ignore_ascii_case(&y)
        })
        .count();
    Some(distance as u64)
}

/// Hamming distance between the sequences of two tree nodes
///
/// # Errors
/// Returns [`Error::SequenceLengthMismatch`] if the sequences differ in length.
pub fn node_distance(tree: &Tree, first: NodeId, second: NodeId) -> Result<u64> {
    let a = tree.sequence(first);
    let b = tree.sequence(second);
    hamming(a, b).ok_or_else(|| Error::SequenceLengthMismatch {
        first: tree.id(first).to_string(),
        first_len: a.len(),
        second: tree.id(second).to_string(),
        second_len: b.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeSpec;

    #[test]
    fn test_identical_sequences() {
        assert_eq!(hamming(b"ACGT", b"ACGT"), Some(0));
        assert_eq!(hamming(b"", b""), Some(0));
    }

    #[test]
    fn test_counts_differences() {
        assert_eq!(hamming(b"AAAA", b"AATT"), Some(2));
        assert_eq!(hamming(b"AAAT", b"ATAA"), Some(2));
        assert_eq!(hamming(b"ACGT", b"TGCA"), Some(4));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(hamming(b"acgt", b"ACGT"), Some(0));
        assert_eq!(hamming(b"acgt", b"ACGA"), Some(1));
    }

    #[test]
    fn test_gaps_and_ambiguous_skipped() {
        assert_eq!(hamming(b"A-GT", b"ACGA"), Some(1));
        assert_eq!(hamming(b"ANNT", b"ACGT"), Some(0));
        assert_eq!(hamming(b"ACGT", b"nn-T"), Some(0));
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(hamming(b"ACG", b"ACGT"), None);
    }

    #[test]
    fn test_node_distance_mismatch_is_error() {
        let tree = Tree::build(vec![
            NodeSpec::new("R", None, b"ACGT", 0),
            NodeSpec::new("T", Some("R"), b"ACG", 1),
        ])
        .unwrap();
        let err = node_distance(&tree, tree.root(), tree.find("T").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceLengthMismatch { first_len: 4, second_len: 3, .. }
        ));
    }
}
