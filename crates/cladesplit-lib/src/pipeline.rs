//! Dataset build orchestration
//!
//! Coordinates the steps that turn a tree into a training dataset:
//! 1. Build and validate the tree
//! 2. Partition tips into train and test clades
//! 3. Extract forward trajectories
//! 4. Sample train and test pairs
//! 5. Aggregate summary statistics
//!
//! A single seeded stream drives steps 2 and 4, consumed in that order, so
//! a dataset is fully determined by its inputs and configuration.

use crate::config::SplitConfiguration;
use crate::constants::{LABELED_TREE_FILENAME, SHARDS_DIRNAME};
use crate::error::{Error, Result};
use crate::io::{list_record_files, write_labeled_tree, write_manifests, write_records};
use crate::pairwise::PairwiseSampler;
use crate::partition::{CladePartitioner, Partition};
use crate::record::{Category, PairRecord, TrajectoryRecord};
use crate::shard::{ShardManifest, ShardPackager};
use crate::summary::DatasetSummary;
use crate::trajectory::TrajectoryBuilder;
use crate::tree::{NodeSpec, Tree};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Everything derived from one tree
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Validated tree
    pub tree: Tree,
    /// Train/test labelling
    pub partition: Partition,
    /// Forward trajectories of every tip, in tip order
    pub trajectories: Vec<TrajectoryRecord>,
    /// Sampled train pairs
    pub train_pairs: Vec<PairRecord>,
    /// Sampled within-clade test pairs
    pub test_pairs: Vec<PairRecord>,
    /// Counters and statistics
    pub summary: DatasetSummary,
}

/// Treat a category without enough tips as producing no pairs
fn or_no_pairs(result: Result<Vec<PairRecord>>) -> Result<Vec<PairRecord>> {
    match result {
        Err(Error::InsufficientTips { category, available }) => {
            warn!("Skipping {} pairs: only {} tips available", category, available);
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Builder for datasets
pub struct DatasetBuilder {
    config: SplitConfiguration,
    pool: rayon::ThreadPool,
}

impl DatasetBuilder {
    /// Create a builder; fails on an invalid configuration
    ///
    /// The worker pool is sized by `config.num_threads` (0 = all cores).
    pub fn new(config: SplitConfiguration) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()?;
        Ok(Self { config, pool })
    }

    /// Configuration in use
    pub fn config(&self) -> &SplitConfiguration {
        &self.config
    }

    /// Build the tree and partition it, without extracting records
    pub fn split(&self, nodes: Vec<NodeSpec>) -> Result<(Tree, Partition)> {
        let tree = Tree::build(nodes)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let partition = CladePartitioner::new(&tree, &self.config).partition(&mut rng)?;
        Ok((tree, partition))
    }

    /// Build a complete dataset from a flat node list
    pub fn build(&self, nodes: Vec<NodeSpec>) -> Result<Dataset> {
        self.pool.install(|| self.build_inner(nodes))
    }

    fn build_inner(&self, nodes: Vec<NodeSpec>) -> Result<Dataset> {
        self.config.print();
        info!("Building dataset");

        info!("Step 1: Building tree...");
        let tree = Tree::build(nodes)?;
        info!("  {} nodes, {} tips", tree.num_nodes(), tree.num_tips());

        info!("Step 2: Partitioning tips...");
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let partition = CladePartitioner::new(&tree, &self.config).partition(&mut rng)?;
        info!(
            "  {} test tips in {} clades, {} train tips",
            partition.num_test_tips(),
            partition.num_clades(),
            partition.num_train_tips()
        );

        info!("Step 3: Extracting trajectories...");
        let trajectories = TrajectoryBuilder::new(&tree, &partition).build_all()?;
        info!("  Built {} trajectories", trajectories.len());

        info!("Step 4: Sampling pairs...");
        let sampler = PairwiseSampler::new(
            &tree,
            &partition,
            self.config.pairwise_train_limit,
            self.config.pairwise_test_limit,
        );
        let train_pairs = or_no_pairs(sampler.sample_train(&mut rng))?;
        let test_pairs = or_no_pairs(sampler.sample_test(&mut rng))?;

        info!("Step 5: Summarising...");
        let summary =
            DatasetSummary::collect(&tree, &partition, &trajectories, &train_pairs, &test_pairs)?;
        info!("Dataset Build Complete");

        Ok(Dataset { tree, partition, trajectories, train_pairs, test_pairs, summary })
    }

    /// Write records, the labelled tree and shard manifests under `output_dir`
    ///
    /// Layout: one directory per category, `tree_labeled.tsv`, and
    /// `shards/{category}-{index}.json`. Shards cover exactly the files
    /// written by this call; anything else already in the category
    /// directories is left out. The shard counts are recorded in the dataset
    /// summary.
    pub fn write<P: AsRef<Path>>(&self, dataset: &mut Dataset, output_dir: P) -> anyhow::Result<Vec<ShardManifest>> {
        let output_dir = output_dir.as_ref();
        self.pool.install(|| -> anyhow::Result<Vec<ShardManifest>> {
            std::fs::create_dir_all(output_dir)?;
            let mut written: BTreeMap<Category, Vec<String>> = BTreeMap::new();
            for names in [
                write_records(&dataset.tree, &dataset.trajectories, output_dir)?,
                write_records(&dataset.tree, &dataset.train_pairs, output_dir)?,
                write_records(&dataset.tree, &dataset.test_pairs, output_dir)?,
            ] {
                for (category, files) in names {
                    written.entry(category).or_default().extend(files);
                }
            }
            write_labeled_tree(&dataset.tree, &dataset.partition, output_dir.join(LABELED_TREE_FILENAME))?;
            info!("Wrote records to {}", output_dir.display());

            let packager = ShardPackager::new(self.config.seed, self.config.shard_capacity);
            let mut manifests = Vec::new();
            for (category, files) in written {
                let count = files.len();
                let planned = packager.plan(category, files);
                info!("Packed {} {} files into {} shards", count, category, planned.len());
                manifests.extend(planned);
            }
            write_manifests(&manifests, output_dir.join(SHARDS_DIRNAME))?;
            dataset.summary.record_shards(&manifests);
            Ok(manifests)
        })
    }
}

/// Plan shards over the record files already present in `dir`
pub fn package_directory<P: AsRef<Path>>(
    packager: &ShardPackager,
    category: Category,
    dir: P,
) -> anyhow::Result<Vec<ShardManifest>> {
    let files = list_record_files(dir)?;
    let count = files.len();
    let manifests = packager.plan(category, files);
    info!("Packed {} {} files into {} shards", count, category, manifests.len());
    Ok(manifests)
}
