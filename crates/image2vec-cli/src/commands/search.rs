//! Search command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image2vec::{DirStore, Pipeline, PipelineConfig};

pub async fn run(
    config: PipelineConfig,
    store: &Path,
    mean: f64,
    variance: f64,
    n: Option<usize>,
    json: bool,
) -> Result<()> {
    let n = n.unwrap_or(config.top_n);
    let collection = config.collection.clone();

    tracing::info!(%collection, store = %store.display(), mean, variance, "searching");

    let pipeline = Pipeline::new(config, Arc::new(DirStore::new(store)));
    let result = pipeline
        .try_find_nearest(mean, variance, n)
        .await
        .with_context(|| format!("Failed to search collection '{collection}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{result}");
    }

    Ok(())
}
