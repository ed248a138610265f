//! Embed command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image2vec::store::MemoryStore;
use image2vec::{Embedding, Pipeline, PipelineConfig, PlacedStats, load_image};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Serialize)]
struct EmbedRow {
    path: PathBuf,
    #[serde(flatten)]
    embedding: Embedding<PlacedStats>,
}

pub fn run(
    config: PipelineConfig,
    images: &[PathBuf],
    emotion: Option<&str>,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let emotion = super::parse_emotion(emotion);
    let pipeline = Pipeline::new(config, Arc::new(MemoryStore::new()));

    tracing::info!(
        images = images.len(),
        dimensions = pipeline.config().dimensions,
        "embedding images"
    );

    let rows: Vec<EmbedRow> = images
        .par_iter()
        .map(|path| -> Result<EmbedRow> {
            let image = load(path)?;
            Ok(EmbedRow {
                path: path.clone(),
                embedding: pipeline.image2vec(&image, &emotion),
            })
        })
        .collect::<Result<_>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<30} {:>10} {:>10} {:>8} {:>8}",
        "Image", "Mean", "Variance", "X", "Y"
    );
    println!("{:-<70}", "");
    for row in &rows {
        let stats = &row.embedding.stats;
        println!(
            "{:<30} {:>10.6} {:>10.6} {:>8.4} {:>8.4}",
            row.path.display(),
            stats.stats.mean,
            stats.stats.variance,
            stats.x,
            stats.y
        );
        if let Some(error) = &row.embedding.metadata.error {
            println!("  warning: {error}");
        }
        if verbose {
            let vector: Vec<String> = row.embedding.vector.iter().map(|v| format!("{v:.4}")).collect();
            println!("  vector: [{}]", vector.join(", "));
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<image2vec::ImageData> {
    load_image(path).with_context(|| format!("Failed to load image {}", path.display()))
}
