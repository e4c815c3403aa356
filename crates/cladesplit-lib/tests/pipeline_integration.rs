//! Integration tests for the dataset pipeline
//!
//! These tests run the whole flow: branch table and alignment on disk,
//! dataset build, and the written record tree.

use cladesplit_lib::io::{list_record_files, load_nodes};
use cladesplit_lib::{Category, DatasetBuilder, Label, ShardManifest, SplitConfiguration};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Root with four three-tip clades; each branch changes one site
fn write_inputs(dir: &Path) -> anyhow::Result<()> {
    let mut branches = fs::File::create(dir.join("branches.tsv"))?;
    let mut alignment = fs::File::create(dir.join("alignment.fasta"))?;
    writeln!(branches, "parent\tchild\thamming")?;
    writeln!(alignment, ">ROOT\nAAAAAAAA")?;

    for c in 0..4 {
        let mut clade_seq = b"AAAAAAAA".to_vec();
        clade_seq[c] = b'C';
        writeln!(branches, "ROOT\tNODE_{}\t1", c)?;
        writeln!(alignment, ">NODE_{}\n{}", c, String::from_utf8_lossy(&clade_seq))?;
        for t in 0..3 {
            let mut tip_seq = clade_seq.clone();
            tip_seq[4 + t] = b'G';
            writeln!(branches, "NODE_{}\thCoV-19/tip/{}{}\t1", c, c, t)?;
            writeln!(alignment, ">hCoV-19/tip/{}{} sampled\n{}", c, t, String::from_utf8_lossy(&tip_seq))?;
        }
    }
    Ok(())
}

fn config() -> SplitConfiguration {
    SplitConfiguration {
        test_proportion: 0.5,
        mutations_back: 1,
        max_clade_proportion: 0.25,
        seed: 7,
        shard_capacity: 4,
        num_threads: 2,
        ..SplitConfiguration::default()
    }
}

#[test]
fn test_end_to_end_dataset() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_inputs(dir.path())?;
    let nodes = load_nodes(dir.path().join("branches.tsv"), dir.path().join("alignment.fasta"))?;
    assert_eq!(nodes.len(), 17);

    let builder = DatasetBuilder::new(config())?;
    let mut dataset = builder.build(nodes)?;
    let tree = &dataset.tree;
    let partition = &dataset.partition;

    assert_eq!(tree.num_tips(), 12);
    assert_eq!(partition.num_clades(), 2);
    assert_eq!(partition.num_test_tips(), 6);

    for record in &dataset.trajectories {
        match partition.label(record.tip) {
            Label::Test => {
                assert_eq!(record.category, Category::ForwardsTest);
                assert_ne!(record.start(), tree.root());
                assert_eq!(record.tip_distance(), 1);
            }
            _ => {
                assert_eq!(record.category, Category::ForwardsTrain);
                assert_eq!(record.start(), tree.root());
                assert_eq!(record.tip_distance(), 2);
            }
        }
    }
    assert_eq!(dataset.train_pairs.len(), 15);
    assert_eq!(dataset.test_pairs.len(), 6);

    let out = dir.path().join("out");
    let manifests = builder.write(&mut dataset, &out)?;

    let train_files = list_record_files(out.join("forwards-train"))?;
    assert_eq!(train_files.len(), 6);
    assert!(train_files.iter().all(|f| f.starts_with("tip") && !f.contains('/')));
    assert_eq!(list_record_files(out.join("pairwise-train"))?.len(), 15);
    assert_eq!(list_record_files(out.join("pairwise-test"))?.len(), 6);

    // 6 + 6 + 15 + 6 files at capacity 4
    assert_eq!(manifests.len(), 2 + 2 + 4 + 2);
    assert_eq!(dataset.summary.shards["pairwise-train"], 4);

    let shard: ShardManifest =
        serde_json::from_str(&fs::read_to_string(out.join("shards").join("pairwise-train-003.json"))?)?;
    assert_eq!(shard.files.len(), 3);

    let labeled = fs::read_to_string(out.join("tree_labeled.tsv"))?;
    assert_eq!(labeled.lines().count(), 17);
    assert_eq!(labeled.lines().filter(|l| l.ends_with("\ttest")).count(), 8);
    Ok(())
}

#[test]
fn test_runs_are_reproducible() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_inputs(dir.path())?;
    let build = || -> anyhow::Result<_> {
        let nodes = load_nodes(dir.path().join("branches.tsv"), dir.path().join("alignment.fasta"))?;
        Ok(DatasetBuilder::new(config())?.build(nodes)?)
    };

    let first = build()?;
    let second = build()?;
    assert_eq!(first.partition, second.partition);
    assert_eq!(first.trajectories, second.trajectories);
    assert_eq!(first.train_pairs, second.train_pairs);
    assert_eq!(first.test_pairs, second.test_pairs);
    assert_eq!(first.summary, second.summary);
    Ok(())
}

#[test]
fn test_summary_file_accumulates_datasets() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_inputs(dir.path())?;
    let nodes = load_nodes(dir.path().join("branches.tsv"), dir.path().join("alignment.fasta"))?;
    let mut dataset = DatasetBuilder::new(config())?.build(nodes)?;

    let path = dir.path().join("summary.json");
    dataset.summary.merge_into(&path, "first")?;
    dataset.summary.url = Some("https://example.org/first.json".to_string());
    dataset.summary.merge_into(&path, "second")?;

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(value["first"]["num_tips"], 12);
    assert_eq!(value["second"]["test_clades"], 2);
    assert_eq!(value["second"]["per_branch_hamming"]["mean"], 1.0);
    Ok(())
}

#[test]
fn test_infeasible_split_is_reported() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_inputs(dir.path())?;
    let nodes = load_nodes(dir.path().join("branches.tsv"), dir.path().join("alignment.fasta"))?;
    let config = SplitConfiguration { max_clade_proportion: 0.2, max_retries: 50, ..config() };

    let result = DatasetBuilder::new(config)?.build(nodes);
    assert!(matches!(result, Err(cladesplit_lib::Error::PartitionInfeasible { .. })));
    Ok(())
}
