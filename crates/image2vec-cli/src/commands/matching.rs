//! Match command: embed, then search.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image2vec::{DirStore, Pipeline, PipelineConfig, load_image};

pub async fn run(
    config: PipelineConfig,
    image: &Path,
    store: &Path,
    emotion: Option<&str>,
    json: bool,
) -> Result<()> {
    let emotion = super::parse_emotion(emotion);
    let data = load_image(image).with_context(|| format!("Failed to load image {}", image.display()))?;

    tracing::info!(
        image = %image.display(),
        width = data.width(),
        height = data.height(),
        "image loaded"
    );

    let pipeline = Pipeline::new(config, Arc::new(DirStore::new(store)));
    let label = image.file_name().map_or_else(
        || image.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    let outcome = pipeline.process(label, &data, &emotion).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let stats = &outcome.embedding.stats;
    println!("Embedding:");
    println!("{:-<60}", "");
    println!("  Mean: {:.6}, Variance: {:.6}", stats.stats.mean, stats.stats.variance);
    println!(
        "  Normalized: ({:.4}, {:.4})",
        stats.stats.normalized_mean, stats.stats.normalized_variance
    );
    println!("  Emotion: {emotion}  ->  ({:.4}, {:.4})", stats.x, stats.y);
    if let Some(error) = &outcome.embedding.metadata.error {
        println!("  warning: {error}");
    }
    println!();
    println!("Nearest:");
    println!("{:-<60}", "");
    print!("{}", outcome.search);

    Ok(())
}
