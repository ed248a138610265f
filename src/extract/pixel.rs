//! Grid-averaged pixel intensity features.
//!
//! The image is resampled onto a square canvas (64x64 by default) and split
//! into a `side x side` grid where `side = sqrt(dimensions)`. Each cell
//! contributes the mean of `(R + G + B) / 3` over its pixels, scaled into
//! `[0, 1]` by dividing by 255.
//!
//! Cell boundaries use `floor(i * size / side)`, so when `size` is not a
//! multiple of `side` the cells differ by at most one pixel in width.

use std::time::Instant;

use imgref::ImgRef;
use rgb::RGBA8;

use super::{DEFAULT_DIMENSIONS, Extraction, ExtractionMetadata, FeatureVector, fit_length};
use crate::error::{Error, Result};
use crate::image::{ImageData, resample};

/// Default side of the square canvas.
pub const DEFAULT_PROCESSED_SIZE: usize = 64;

/// Extracts grid-averaged intensity vectors.
#[derive(Debug, Clone, Copy)]
pub struct PixelExtractor {
    processed_size: usize,
}

impl Default for PixelExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSED_SIZE)
    }
}

impl PixelExtractor {
    /// Create an extractor resampling onto a `processed_size` square canvas.
    #[must_use]
    pub fn new(processed_size: usize) -> Self {
        Self { processed_size }
    }

    /// Side of the canvas.
    #[must_use]
    pub fn processed_size(&self) -> usize {
        self.processed_size
    }

    /// Extract a vector of `dimensions` entries.
    ///
    /// Invalid input never fails: the result is a zero vector whose metadata
    /// carries the error message.
    #[must_use]
    pub fn extract(&self, image: &ImageData, dimensions: usize) -> Extraction {
        match self.try_extract(image, dimensions) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!(error = %e, dimensions, "pixel extraction degraded to zero vector");
                Extraction::degraded(dimensions, e.to_string())
            }
        }
    }

    /// Extract a vector of `dimensions` entries, surfacing invalid input.
    pub fn try_extract(&self, image: &ImageData, dimensions: usize) -> Result<Extraction> {
        let start = Instant::now();
        image.validate()?;
        let side = grid_side(dimensions)?;
        if self.processed_size == 0 {
            return Err(Error::InvalidInput("processed size must be non-zero".to_string()));
        }

        let size = self.processed_size;
        let canvas = resample(image.to_rgba8().as_ref(), size, size);
        let vector = fit_length(region_averages(canvas.as_ref(), side), dimensions);

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            dimensions,
            elapsed_us = start.elapsed().as_micros() as u64,
            "pixel features extracted"
        );

        Ok(Extraction {
            vector,
            metadata: ExtractionMetadata {
                image_size: Some(image.size()),
                processed_size: Some(size),
                regions_per_side: Some(side),
                timestamp: Some(chrono::Utc::now()),
                ..ExtractionMetadata::default()
            },
        })
    }
}

/// Extract a pixel feature vector with the default 64x64 canvas.
#[must_use]
pub fn extract_pixel_vector(image: &ImageData, dimensions: usize) -> Extraction {
    PixelExtractor::default().extract(image, dimensions)
}

/// Extract the default 16-entry pixel feature vector.
#[must_use]
pub fn extract_default(image: &ImageData) -> Extraction {
    extract_pixel_vector(image, DEFAULT_DIMENSIONS)
}

/// Grid side for a perfect-square number of dimensions.
pub fn grid_side(dimensions: usize) -> Result<usize> {
    let side = (dimensions as f64).sqrt().round() as usize;
    if dimensions == 0 || side * side != dimensions {
        return Err(Error::InvalidInput(format!(
            "dimensions must be a non-zero perfect square, got {dimensions}"
        )));
    }
    Ok(side)
}

/// Mean channel intensity of each grid cell, row by row, scaled to `[0, 1]`.
///
/// Cells that cover no pixel (canvas smaller than the grid) are skipped.
#[must_use]
pub fn region_averages(canvas: ImgRef<'_, RGBA8>, regions_per_side: usize) -> FeatureVector {
    let width = canvas.width();
    let height = canvas.height();
    let region_w = width as f64 / regions_per_side as f64;
    let region_h = height as f64 / regions_per_side as f64;
    let bound = |i: usize, region: f64, limit: usize| ((i as f64 * region).floor() as usize).min(limit);

    let mut vector = Vec::with_capacity(regions_per_side * regions_per_side);
    for reg_y in 0..regions_per_side {
        let (y0, y1) = (bound(reg_y, region_h, height), bound(reg_y + 1, region_h, height));
        for reg_x in 0..regions_per_side {
            let (x0, x1) = (bound(reg_x, region_w, width), bound(reg_x + 1, region_w, width));

            let mut sum = 0u64;
            let mut count = 0u64;
            for row in canvas.rows().skip(y0).take(y1.saturating_sub(y0)) {
                for px in &row[x0..x1.max(x0)] {
                    sum += u64::from(px.r) + u64::from(px.g) + u64::from(px.b);
                    count += 1;
                }
            }

            if count > 0 {
                vector.push(sum as f64 / (3 * count) as f64 / 255.0);
            }
        }
    }
    vector
}
