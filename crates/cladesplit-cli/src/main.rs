use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cladesplit_lib::io::{load_nodes, write_labeled_tree, write_manifests};
use cladesplit_lib::pipeline::package_directory;
use cladesplit_lib::{Category, DatasetBuilder, ShardPackager, SplitConfiguration};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "cladesplit")]
#[command(version = "0.1.0")]
#[command(about = "Clade-based train/test splitting of phylogenetic trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the commands that partition a tree
#[derive(Args)]
struct SplitArgs {
    /// Branch table (TSV with parent and child columns)
    #[arg(short, long)]
    branches: PathBuf,

    /// FASTA alignment of every node, tips and ancestors
    #[arg(short, long)]
    alignment: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target proportion of tips labelled test
    #[arg(long)]
    test_proportion: Option<f64>,

    /// Mutations to walk back from a seed tip before choosing a clade root
    #[arg(long)]
    mutations_back: Option<u64>,

    /// Largest allowed clade, as a proportion of all tips
    #[arg(long)]
    max_clade_proportion: Option<f64>,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of threads (0 = all available cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,
}

impl SplitArgs {
    fn configuration(&self) -> anyhow::Result<SplitConfiguration> {
        let mut config = match &self.config {
            Some(path) => SplitConfiguration::from_json_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => SplitConfiguration::default(),
        };
        if let Some(v) = self.test_proportion {
            config.test_proportion = v;
        }
        if let Some(v) = self.mutations_back {
            config.mutations_back = v;
        }
        if let Some(v) = self.max_clade_proportion {
            config.max_clade_proportion = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.threads {
            config.num_threads = v;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Partition a tree and write all records, shards and summary
    Run {
        #[command(flatten)]
        split: SplitArgs,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Maximum number of train pairs
        #[arg(long)]
        train_pairs: Option<usize>,

        /// Maximum number of test pairs
        #[arg(long)]
        test_pairs: Option<usize>,

        /// Maximum number of files per shard
        #[arg(long)]
        shard_capacity: Option<usize>,

        /// JSON file the dataset summary is merged into
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Key of this dataset in the summary file (default: output directory name)
        #[arg(long)]
        dataset: Option<String>,

        /// Source URL recorded in the summary
        #[arg(long)]
        url: Option<String>,
    },

    /// Partition a tree and write only the labelled branch table
    Split {
        #[command(flatten)]
        split: SplitArgs,

        /// Output TSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Plan shards over a directory of record files
    Package {
        /// Directory holding the record files of one category
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory the shard manifests are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Record category (forwards-train, forwards-test, pairwise-train, pairwise-test)
        #[arg(short, long)]
        category: Category,

        /// Shuffle seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Maximum number of files per shard
        #[arg(long, default_value = "10000")]
        shard_capacity: usize,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            split,
            output_dir,
            train_pairs,
            test_pairs,
            shard_capacity,
            summary,
            dataset,
            url,
        } => {
            let mut config = split.configuration()?;
            if let Some(v) = train_pairs {
                config.pairwise_train_limit = v;
            }
            if let Some(v) = test_pairs {
                config.pairwise_test_limit = v;
            }
            if let Some(v) = shard_capacity {
                config.shard_capacity = v;
            }
            run_command(&split, config, &output_dir, summary, dataset, url)?;
        }
        Commands::Split { split, output } => {
            split_command(&split, &output)?;
        }
        Commands::Package { input_dir, output_dir, category, seed, shard_capacity } => {
            package_command(&input_dir, &output_dir, category, seed, shard_capacity)?;
        }
    }

    Ok(())
}

/// Build the full dataset and write it to disk
fn run_command(
    split: &SplitArgs,
    config: SplitConfiguration,
    output_dir: &Path,
    summary: Option<PathBuf>,
    dataset: Option<String>,
    url: Option<String>,
) -> anyhow::Result<()> {
    info!("Loading tree from {}", split.branches.display());
    let nodes = load_nodes(&split.branches, &split.alignment)?;
    info!("  Loaded {} nodes", nodes.len());

    let builder = DatasetBuilder::new(config)?;
    let mut built = builder.build(nodes)?;
    let manifests = builder.write(&mut built, output_dir)?;
    info!("Planned {} shards", manifests.len());

    if let Some(path) = summary {
        let name = match dataset {
            Some(name) => name,
            None => output_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Cannot derive a dataset name from the output directory; pass --dataset")?,
        };
        built.summary.url = url;
        built.summary.merge_into(&path, &name)?;
        info!("Summary for '{}' written to {}", name, path.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&built.summary)?);
    }

    info!("Dataset written to {}", output_dir.display());
    Ok(())
}

/// Partition only, writing the labelled branch table
fn split_command(split: &SplitArgs, output: &Path) -> anyhow::Result<()> {
    let config = split.configuration()?;
    let nodes = load_nodes(&split.branches, &split.alignment)?;
    let builder = DatasetBuilder::new(config)?;
    let (tree, partition) = builder.split(nodes)?;

    write_labeled_tree(&tree, &partition, output)?;
    info!(
        "Labelled {} test tips in {} clades; wrote {}",
        partition.num_test_tips(),
        partition.num_clades(),
        output.display()
    );
    Ok(())
}

/// Shard the record files of one category
fn package_command(
    input_dir: &Path,
    output_dir: &Path,
    category: Category,
    seed: u64,
    shard_capacity: usize,
) -> anyhow::Result<()> {
    let packager = ShardPackager::new(seed, shard_capacity);
    let manifests = package_directory(&packager, category, input_dir)?;
    let paths = write_manifests(&manifests, output_dir)?;
    info!("Wrote {} manifests to {}", paths.len(), output_dir.display());
    Ok(())
}
