//! Branch table and alignment parsing
//!
//! The tree arrives as a tab-separated branch table (one `parent`/`child`
//! row per branch, with an optional mutation column) and the node sequences
//! as a FASTA alignment holding both tips and reconstructed ancestors.

use crate::tree::NodeSpec;
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Context, Result};
use needletail::parse_fastx_file;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Columns accepted as the per-branch mutation count, in order of preference
const MUTATION_COLUMNS: &[&str] = &["mutations", "hamming"];

/// One row of the branch table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Parent node identifier
    pub parent: String,
    /// Child node identifier
    pub child: String,
    /// Mutations on the branch (0 when unknown)
    pub mutations: u64,
}

/// Parse a FASTA alignment (optionally gzipped) into identifier -> sequence
///
/// Identifiers are the first whitespace-separated word of each header and
/// residues are upper-cased.
pub fn parse_alignment<P: AsRef<Path>>(path: P) -> Result<AHashMap<String, Vec<u8>>> {
    let path = path.as_ref();
    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open alignment: {}", path.display()))?;

    let mut sequences = AHashMap::new();
    while let Some(record) = reader.next() {
        let record = record
            .with_context(|| format!("Failed to parse alignment record in {}", path.display()))?;
        let header = std::str::from_utf8(record.id())
            .with_context(|| format!("Non UTF-8 header in {}", path.display()))?;
        let id = header.split_whitespace().next().unwrap_or_default().to_string();
        let sequence = record.seq().to_ascii_uppercase();
        sequences.insert(id, sequence);
    }
    Ok(sequences)
}

fn parse_mutations(value: &str) -> Result<u64> {
    match value.trim() {
        "" | "?" => Ok(0),
        v => v.parse().with_context(|| format!("Invalid mutation count '{}'", v)),
    }
}

/// Parse the branch table
///
/// The header must name `parent` and `child` columns; a `mutations` (or
/// `hamming`) column is optional. Unknown counts (`?` or empty) become 0.
pub fn parse_branches<P: AsRef<Path>>(path: P) -> Result<Vec<Branch>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open branch table: {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => bail!("Branch table {} is empty", path.display()),
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let column = |name: &str| columns.iter().position(|&c| c == name);
    let (parent_col, child_col) = match (column("parent"), column("child")) {
        (Some(p), Some(c)) => (p, c),
        _ => bail!("Branch table {} needs 'parent' and 'child' columns", path.display()),
    };
    let mutation_col = MUTATION_COLUMNS.iter().find_map(|name| column(name));

    let mut branches = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |i: usize| {
            fields.get(i).map(|f| f.trim()).with_context(|| {
                format!("Line {} of {} has too few columns", line_no + 2, path.display())
            })
        };
        let mutations = match mutation_col {
            Some(i) => parse_mutations(fields.get(i).copied().unwrap_or(""))
                .with_context(|| format!("Line {} of {}", line_no + 2, path.display()))?,
            None => 0,
        };
        branches.push(Branch {
            parent: field(parent_col)?.to_string(),
            child: field(child_col)?.to_string(),
            mutations,
        });
    }
    Ok(branches)
}

/// Combine branches and sequences into the flat node list of a tree
///
/// Nodes appear in order of first mention; the root is the node that is
/// never a child. Every node must have a sequence.
pub fn nodes_from_branches(
    branches: &[Branch],
    sequences: &AHashMap<String, Vec<u8>>,
) -> Result<Vec<NodeSpec>> {
    let mut order: Vec<&str> = Vec::new();
    let mut seen: AHashSet<&str> = AHashSet::new();
    let mut incoming: AHashMap<&str, &Branch> = AHashMap::new();

    for branch in branches {
        if incoming.insert(branch.child.as_str(), branch).is_some() {
            bail!("Node '{}' is listed as a child more than once", branch.child);
        }
        for name in [branch.parent.as_str(), branch.child.as_str()] {
            if seen.insert(name) {
                order.push(name);
            }
        }
    }

    order
        .into_iter()
        .map(|name| {
            let sequence = sequences
                .get(name)
                .with_context(|| format!("No sequence for node '{}' in the alignment", name))?;
            let (parent, mutations) = match incoming.get(name) {
                Some(branch) => (Some(branch.parent.clone()), branch.mutations),
                None => (None, 0),
            };
            Ok(NodeSpec { id: name.to_string(), parent, sequence: sequence.clone(), mutations })
        })
        .collect()
}

/// Load the node list from a branch table and an alignment
pub fn load_nodes<P: AsRef<Path>, Q: AsRef<Path>>(branches: P, alignment: Q) -> Result<Vec<NodeSpec>> {
    let branches = parse_branches(branches)?;
    let sequences = parse_alignment(alignment)?;
    nodes_from_branches(&branches, &sequences)
}
