//! textds command line tool
//!
//! Inspects datasets prepared in the TensorFlow Datasets layout and prints
//! converted records.
//!
//! # Usage
//!
//! ```bash
//! # Show versions, splits and features
//! textds info wikipedia_toxicity_subtypes
//!
//! # Print the first 3 test records
//! textds head imdb_reviews --split test -n 3
//!
//! # Print (text, label) pairs
//! textds head wikipedia_toxicity_subtypes --classification --label-field toxicity
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textds_core::catalog::DatasetId;
use textds_core::{
    ClassificationFields, PrefetchPolicy, SourceConfig, TextClassificationDataset, TextDsConfig,
    TextIterDataset, TfdsProvider,
};

/// Inspect prepared text datasets
#[derive(Parser, Debug)]
#[command(name = "textds")]
#[command(about = "Inspect datasets prepared in the TensorFlow Datasets layout")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root directory of prepared datasets (overrides config and TFDS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the metadata of a prepared dataset
    Info {
        /// Dataset identifier, name[/config][:version]
        name: String,
    },
    /// Print the first records of a split
    Head {
        /// Dataset identifier, name[/config][:version]
        name: String,

        /// Split selection, e.g. "train" or "test[:10%]"
        #[arg(short, long, default_value = "train")]
        split: String,

        /// Number of records to print
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Read shard files in shuffled order
        #[arg(long)]
        shuffle: bool,

        /// Seed for shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Print (text, label) pairs instead of whole records
        #[arg(long)]
        classification: bool,

        /// Field holding the input text
        #[arg(long, default_value = "text")]
        text_field: String,

        /// Field holding the label
        #[arg(long, default_value = "toxicity")]
        label_field: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => TextDsConfig::from_file(path)?,
        None => TextDsConfig::default(),
    }
    .with_env_overrides();
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    config.validate()?;

    let provider = TfdsProvider::from_config(&config);
    tracing::debug!("data directory: {}", config.storage.data_dir.display());

    match args.command {
        Command::Info { name } => info(&provider, &name),
        Command::Head {
            name,
            split,
            count,
            shuffle,
            seed,
            classification,
            text_field,
            label_field,
        } => {
            let source = SourceConfig::new(name)
                .with_split(split)
                .with_shuffle_files(shuffle);
            let mut loader = config.loader.clone();
            loader.take = Some(count);
            loader.seed = seed.or(loader.seed);
            // Small reads gain nothing from a worker thread
            if count <= 1 {
                loader.prefetch = PrefetchPolicy::Disabled;
            }

            if classification {
                let fields = ClassificationFields::new(text_field, label_field);
                let mut dataset = TextClassificationDataset::new(&provider, &source, &loader, fields)?;
                for pair in &mut dataset {
                    let (text, label) = pair?;
                    println!("{label}\t{text}");
                }
            } else {
                let mut dataset = TextIterDataset::new(&provider, &source, &loader)?;
                for record in &mut dataset {
                    println!("{}", record?);
                }
            }
            Ok(())
        }
    }
}

fn info(provider: &TfdsProvider, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id: DatasetId = name.parse()?;
    let (dir, info, schema) = provider.read_metadata(&id)?;

    println!("{} {}", info.name, info.version);
    if let Some(config) = &info.config_name {
        println!("config:    {config}");
    }
    println!("directory: {}", dir.display());
    println!("format:    {}", info.file_format);
    if !info.description.is_empty() {
        println!("{}", info.description.trim());
    }

    println!();
    println!("splits:");
    for split in &info.splits {
        println!(
            "  {:<12} {:>10} examples {:>5} shards {:>12} bytes",
            split.name,
            split.num_examples(),
            split.num_shards(),
            split.num_bytes
        );
    }

    println!();
    println!("features:");
    for feature in schema.features() {
        println!("  {feature}");
    }
    Ok(())
}
