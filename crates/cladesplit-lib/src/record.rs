//! Output records and their FASTA rendering
//!
//! Every record is written as one FASTA file whose headers carry the node
//! name and a cumulative Hamming distance: `>{name}|{distance}`.

use crate::constants::{
    FASTA_LINE_WIDTH, PAIR_SEPARATOR, RECORD_EXTENSION, STRIPPED_NAME_PREFIX, UNSAFE_FILENAME_CHARS,
};
use crate::tree::{NodeId, Tree};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output category of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Root-to-tip trajectory of a train tip
    ForwardsTrain,
    /// Clade-root-to-tip trajectory of a test tip
    ForwardsTest,
    /// Pair of train tips
    PairwiseTrain,
    /// Pair of test tips from the same clade
    PairwiseTest,
}

impl Category {
    /// All categories, in output order
    pub const ALL: [Category; 4] = [
        Category::ForwardsTrain,
        Category::ForwardsTest,
        Category::PairwiseTrain,
        Category::PairwiseTest,
    ];

    /// Directory and shard prefix of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ForwardsTrain => "forwards-train",
            Category::ForwardsTest => "forwards-test",
            Category::PairwiseTrain => "pairwise-train",
            Category::PairwiseTest => "pairwise-test",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Make a node name safe to use as a file name
pub fn sanitize_filename(name: &str) -> String {
    let name = name.strip_prefix(STRIPPED_NAME_PREFIX).unwrap_or(name);
    name.chars().filter(|c| !UNSAFE_FILENAME_CHARS.contains(c)).collect()
}

/// Append one FASTA entry, wrapping the sequence at [`FASTA_LINE_WIDTH`]
fn push_fasta_entry(out: &mut String, name: &str, distance: u64, sequence: &[u8]) {
    out.push('>');
    out.push_str(name);
    out.push('|');
    out.push_str(&distance.to_string());
    out.push('\n');
    for line in sequence.chunks(FASTA_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
}

/// A record that is materialised as one FASTA file
pub trait FastaRecord {
    /// Category directory the record belongs to
    fn category(&self) -> Category;

    /// File name inside the category directory
    fn file_name(&self, tree: &Tree) -> String;

    /// FASTA contents
    fn to_fasta(&self, tree: &Tree) -> String;
}

/// One emitted node of a trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrajectoryEntry {
    /// Node
    pub node: NodeId,
    /// Hamming distance accumulated from the trajectory start
    pub distance: u64,
}

/// Ordered path of sequences from a start node down to a tip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryRecord {
    /// Tip the trajectory ends at
    pub tip: NodeId,
    /// Forward train or forward test
    pub category: Category,
    /// Emitted nodes, start first; distances are non-decreasing from 0
    pub entries: Vec<TrajectoryEntry>,
}

impl TrajectoryRecord {
    /// First emitted node
    pub fn start(&self) -> NodeId {
        self.entries[0].node
    }

    /// Cumulative distance at the tip
    pub fn tip_distance(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.distance)
    }

    /// Number of emitted nodes
    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

impl FastaRecord for TrajectoryRecord {
    fn category(&self) -> Category {
        self.category
    }

    fn file_name(&self, tree: &Tree) -> String {
        format!("{}.{}", sanitize_filename(tree.id(self.tip)), RECORD_EXTENSION)
    }

    fn to_fasta(&self, tree: &Tree) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            push_fasta_entry(&mut out, tree.id(entry.node), entry.distance, tree.sequence(entry.node));
        }
        out
    }
}

/// Two tips and the Hamming distance between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairRecord {
    /// Listed first, at distance 0
    pub first: NodeId,
    /// Listed second, at the measured distance
    pub second: NodeId,
    /// Pairwise train or pairwise test
    pub category: Category,
    /// Hamming distance between the two sequences
    pub distance: u64,
}

impl FastaRecord for PairRecord {
    fn category(&self) -> Category {
        self.category
    }

    fn file_name(&self, tree: &Tree) -> String {
        format!(
            "{}{}{}.{}",
            sanitize_filename(tree.id(self.first)),
            PAIR_SEPARATOR,
            sanitize_filename(tree.id(self.second)),
            RECORD_EXTENSION
        )
    }

    fn to_fasta(&self, tree: &Tree) -> String {
        let mut out = String::new();
        push_fasta_entry(&mut out, tree.id(self.first), 0, tree.sequence(self.first));
        push_fasta_entry(&mut out, tree.id(self.second), self.distance, tree.sequence(self.second));
        out
    }
}
