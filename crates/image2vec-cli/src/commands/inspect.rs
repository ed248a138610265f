//! Inspect command.

use std::path::Path;

use anyhow::{Context, Result};
use image2vec::stats::Summary;
use image2vec::{DirStore, PipelineConfig};

pub fn run(config: &PipelineConfig, store: &Path) -> Result<()> {
    let collection = &config.collection;
    tracing::info!(%collection, store = %store.display(), "reading collection");

    let raw = DirStore::new(store)
        .read_collection(collection)
        .with_context(|| format!("Failed to read collection '{collection}'"))?;

    // Strict coercion so unparseable fields show up as NaN and are counted.
    let records: Vec<_> = raw.iter().map(|r| r.coerce(false)).collect();
    let invalid = records
        .iter()
        .filter(|r| r.mean.is_nan() || r.variance.is_nan())
        .count();

    println!("Collection: {collection}");
    println!("Records: {}", records.len());
    if invalid > 0 {
        println!("Records with unparseable mean/var: {invalid}");
    }
    println!();

    let means: Vec<f64> = records.iter().map(|r| r.mean).collect();
    let variances: Vec<f64> = records.iter().map(|r| r.variance).collect();

    print_summary("Mean", &means);
    print_summary("Variance", &variances);

    Ok(())
}

fn print_summary(name: &str, values: &[f64]) {
    if let Some(summary) = Summary::compute(values) {
        println!("{name}:");
        println!("  Mean: {:.6}, Median: {:.6}", summary.mean, summary.median);
        println!("  Min: {:.6}, Max: {:.6}", summary.min, summary.max);
        println!("  StdDev: {:.6}", summary.std_dev);
    }
}
