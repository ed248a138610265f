//! image2vec CLI - image fingerprinting and nearest-neighbor lookup

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use image2vec::PipelineConfig;

mod commands;

/// Fingerprint images and find their nearest stored neighbors.
#[derive(Parser)]
#[command(name = "image2vec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON pipeline configuration file
    #[arg(long, global = true, env = "IMAGE2VEC_CONFIG")]
    config: Option<PathBuf>,

    /// Collection to query (overrides the config file)
    #[arg(long, global = true, env = "IMAGE2VEC_COLLECTION")]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute pixel embeddings for one or more images
    Embed {
        /// Input images (PNG or JPEG)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Mood label (喜, 怒, 哀, 楽)
        #[arg(short, long)]
        emotion: Option<String>,

        /// Feature vector length (perfect square)
        #[arg(short, long)]
        dimensions: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rank stored records by distance to a (mean, variance) point
    Search {
        /// Directory holding <collection>.json or <collection>.csv
        #[arg(short, long, env = "IMAGE2VEC_STORE")]
        store: PathBuf,

        /// Query mean (x axis)
        #[arg(long, allow_hyphen_values = true)]
        mean: f64,

        /// Query variance (y axis)
        #[arg(long, allow_hyphen_values = true)]
        variance: f64,

        /// Number of ranked results
        #[arg(short)]
        n: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Embed an image and rank stored records against it
    Match {
        /// Input image (PNG or JPEG)
        image: PathBuf,

        /// Directory holding <collection>.json or <collection>.csv
        #[arg(short, long, env = "IMAGE2VEC_STORE")]
        store: PathBuf,

        /// Mood label (喜, 怒, 哀, 楽)
        #[arg(short, long)]
        emotion: Option<String>,

        /// Number of ranked results
        #[arg(short)]
        n: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show statistics for a stored collection
    Inspect {
        /// Directory holding <collection>.json or <collection>.csv
        #[arg(short, long, env = "IMAGE2VEC_STORE")]
        store: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(collection) = cli.collection {
        config.collection = collection;
    }

    match cli.command {
        Commands::Embed { images, emotion, dimensions, json } => {
            if let Some(dimensions) = dimensions {
                config.dimensions = dimensions;
            }
            commands::embed::run(config, &images, emotion.as_deref(), json, cli.verbose)
        }
        Commands::Search { store, mean, variance, n, json } => {
            commands::search::run(config, &store, mean, variance, n, json).await
        }
        Commands::Match { image, store, emotion, n, json } => {
            if let Some(n) = n {
                config.top_n = n;
            }
            commands::matching::run(config, &image, &store, emotion.as_deref(), json).await
        }
        Commands::Inspect { store } => commands::inspect::run(&config, &store),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Log directives used when `RUST_LOG` is unset. Progress messages are
/// logged at `info`, so they only show with `--verbose`.
fn default_directives(verbose: bool) -> &'static str {
    if verbose { "image2vec=debug,info" } else { "warn" }
}
