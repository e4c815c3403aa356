//! Materialising records, the labelled tree and shard manifests on disk

use crate::constants::RECORD_EXTENSION;
use crate::hamming::node_distance;
use crate::partition::Partition;
use crate::record::{Category, FastaRecord};
use crate::shard::ShardManifest;
use crate::tree::Tree;
use ahash::AHashSet;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve one file name per record, in record order
///
/// Names are unique within a category: a name already taken by an earlier
/// record gets the first free `_{n}` suffix before its extension.
pub fn unique_file_names<T: FastaRecord>(tree: &Tree, records: &[T]) -> Vec<String> {
    let mut taken: AHashSet<(Category, String)> = AHashSet::with_capacity(records.len());
    records
        .iter()
        .map(|record| {
            let category = record.category();
            let name = record.file_name(tree);
            if taken.insert((category, name.clone())) {
                return name;
            }
            let suffix = format!(".{}", RECORD_EXTENSION);
            let stem = name.strip_suffix(suffix.as_str()).unwrap_or(&name);
            let mut n = 1usize;
            loop {
                let candidate = format!("{}_{}{}", stem, n, suffix);
                if taken.insert((category, candidate.clone())) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Write each record as `{output_dir}/{category}/{file_name}`
///
/// File names come from [`unique_file_names`], so no two records share a
/// path. Returns the names written per category, in record order.
pub fn write_records<T, P>(tree: &Tree, records: &[T], output_dir: P) -> Result<BTreeMap<Category, Vec<String>>>
where
    T: FastaRecord + Sync,
    P: AsRef<Path>,
{
    let output_dir = output_dir.as_ref();
    let names = unique_file_names(tree, records);

    let mut written: BTreeMap<Category, Vec<String>> = BTreeMap::new();
    for (record, name) in records.iter().zip(&names) {
        written.entry(record.category()).or_default().push(name.clone());
    }
    for category in written.keys() {
        let dir = output_dir.join(category.as_str());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    records
        .par_iter()
        .zip(names.par_iter())
        .try_for_each(|(record, name)| {
            let path = output_dir.join(record.category().as_str()).join(name);
            fs::write(&path, record.to_fasta(tree))
                .with_context(|| format!("Failed to write {}", path.display()))
        })?;
    Ok(written)
}

/// Write the tree as a `parent, child, hamming, train_test` table in pre-order
pub fn write_labeled_tree<P: AsRef<Path>>(tree: &Tree, partition: &Partition, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "parent\tchild\thamming\ttrain_test")?;
    for &node in tree.preorder() {
        if let Some(parent) = tree.parent(node) {
            let distance = node_distance(tree, parent, node)?;
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                tree.id(parent),
                tree.id(node),
                distance,
                partition.label(node).as_str()
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Sorted names of the record files directly inside `dir`
pub fn list_record_files<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXTENSION);
        if is_record && entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Write one `{name}.json` manifest per shard into `dir`
pub fn write_manifests<P: AsRef<Path>>(manifests: &[ShardManifest], dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;

    manifests
        .iter()
        .map(|manifest| {
            let path = dir.join(format!("{}.json", manifest.name));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut out, manifest)?;
            out.flush()?;
            debug!("Wrote shard {} with {} files", manifest.name, manifest.files.len());
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitConfiguration;
    use crate::partition::CladePartitioner;
    use crate::record::{PairRecord, TrajectoryEntry, TrajectoryRecord};
    use crate::shard::ShardPackager;
    use crate::trajectory::TrajectoryBuilder;
    use crate::tree::tests::small_tree;
    use crate::tree::NodeSpec;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::TempDir;

    fn partitioned() -> (Tree, Partition) {
        let tree = small_tree();
        let config = SplitConfiguration {
            test_proportion: 0.5,
            mutations_back: 1,
            max_clade_proportion: 0.5,
            ..SplitConfiguration::default()
        };
        let partition = CladePartitioner::new(&tree, &config)
            .partition(&mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();
        (tree, partition)
    }

    #[test]
    fn test_write_trajectories() -> Result<()> {
        let (tree, partition) = partitioned();
        let records = TrajectoryBuilder::new(&tree, &partition).build_all()?;
        let dir = TempDir::new()?;

        let names = write_records(&tree, &records, dir.path())?;
        assert_eq!(names[&Category::ForwardsTest], vec!["T1.fasta".to_string()]);
        assert_eq!(names[&Category::ForwardsTrain], vec!["B.fasta".to_string()]);

        let t1 = fs::read_to_string(dir.path().join("forwards-test").join("T1.fasta"))?;
        assert_eq!(t1, ">A|0\nAAAT\n>T1|1\nAATT\n");
        let b = fs::read_to_string(dir.path().join("forwards-train").join("B.fasta"))?;
        assert_eq!(b, ">R|0\nAAAA\n>B|1\nATAA\n");
        Ok(())
    }

    #[test]
    fn test_write_pair() -> Result<()> {
        let (tree, _) = partitioned();
        let pair = PairRecord {
            first: tree.find("T1").unwrap(),
            second: tree.find("B").unwrap(),
            category: Category::PairwiseTrain,
            distance: 3,
        };
        let dir = TempDir::new()?;
        write_records(&tree, &[pair], dir.path())?;

        let names = list_record_files(dir.path().join("pairwise-train"))?;
        assert_eq!(names, vec!["T1__B.fasta".to_string()]);
        Ok(())
    }

    /// Tips `x/{i}` and `x{i}` sanitise to the same file name
    fn colliding_records(count: usize) -> (Tree, Vec<TrajectoryRecord>) {
        let mut specs = vec![NodeSpec::new("R", None, b"AAAA", 0)];
        for i in 0..count {
            specs.push(NodeSpec::new(&format!("x/{}", i), Some("R"), b"CAAA", 1));
            specs.push(NodeSpec::new(&format!("x{}", i), Some("R"), b"GAAA", 1));
        }
        let tree = Tree::build(specs).unwrap();
        let records = tree
            .tips()
            .iter()
            .map(|&tip| TrajectoryRecord {
                tip,
                category: Category::ForwardsTrain,
                entries: vec![TrajectoryEntry { node: tip, distance: 0 }],
            })
            .collect();
        (tree, records)
    }

    #[test]
    fn test_colliding_names_are_resolved_in_record_order() {
        let (tree, records) = colliding_records(2);
        assert_eq!(
            unique_file_names(&tree, &records),
            vec!["x0.fasta", "x0_1.fasta", "x1.fasta", "x1_1.fasta"]
        );
    }

    #[test]
    fn test_colliding_writes_are_reproducible() -> Result<()> {
        let (tree, records) = colliding_records(100);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build()?;
        let mut outputs = Vec::new();
        for _ in 0..5 {
            let dir = TempDir::new()?;
            let names = pool.install(|| write_records(&tree, &records, dir.path()))?;
            let files = list_record_files(dir.path().join("forwards-train"))?;
            assert_eq!(files.len(), records.len());
            assert_eq!(names[&Category::ForwardsTrain].len(), records.len());

            let contents: Vec<String> = files
                .iter()
                .map(|f| fs::read_to_string(dir.path().join("forwards-train").join(f)))
                .collect::<std::io::Result<_>>()?;
            outputs.push(contents);
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));

        let dir = TempDir::new()?;
        write_records(&tree, &records, dir.path())?;
        let first = fs::read_to_string(dir.path().join("forwards-train").join("x7.fasta"))?;
        let second = fs::read_to_string(dir.path().join("forwards-train").join("x7_1.fasta"))?;
        assert_eq!(first, ">x/7|0\nCAAA\n");
        assert_eq!(second, ">x7|0\nGAAA\n");
        Ok(())
    }

    #[test]
    fn test_labeled_tree() -> Result<()> {
        let (tree, partition) = partitioned();
        let dir = TempDir::new()?;
        let path = dir.path().join("tree_labeled.tsv");
        write_labeled_tree(&tree, &partition, &path)?;

        let contents = fs::read_to_string(&path)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "parent\tchild\thamming\ttrain_test",
                "R\tA\t1\ttest",
                "A\tT1\t1\ttest",
                "R\tB\t1\ttrain",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_list_ignores_other_files() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("b.fasta"), ">b|0\nA\n")?;
        fs::write(dir.path().join("a.fasta"), ">a|0\nA\n")?;
        fs::write(dir.path().join("notes.txt"), "")?;
        fs::create_dir(dir.path().join("nested.fasta"))?;

        assert_eq!(list_record_files(dir.path())?, vec!["a.fasta".to_string(), "b.fasta".to_string()]);
        Ok(())
    }

    #[test]
    fn test_write_manifests() -> Result<()> {
        let files: Vec<String> = (0..5).map(|i| format!("{}.fasta", i)).collect();
        let manifests = ShardPackager::new(1, 2).plan(Category::ForwardsTest, files);
        let dir = TempDir::new()?;

        let paths = write_manifests(&manifests, dir.path().join("shards"))?;
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("forwards-test-002.json"));

        let loaded: ShardManifest = serde_json::from_str(&fs::read_to_string(&paths[0])?)?;
        assert_eq!(loaded, manifests[0]);
        Ok(())
    }
}
