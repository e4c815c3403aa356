//! Reading the input tree and alignment, writing records and manifests

pub mod parse;
pub mod write;

pub use parse::{load_nodes, parse_alignment, parse_branches, Branch};
pub use write::{list_record_files, unique_file_names, write_labeled_tree, write_manifests, write_records};
