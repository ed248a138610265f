//! Feature extraction from images.
//!
//! Two extractors turn an image into a fixed-length [`FeatureVector`]:
//!
//! - [`pixel`]: average intensity of each cell of a square grid laid over a
//!   64x64 resample of the image. Deterministic, no model needed.
//! - [`network`]: uniform-stride subsample of the activations produced by a
//!   pre-trained classification network.
//!
//! Both report failures through [`ExtractionMetadata::error`] and a
//! zero-filled vector of the requested length, so callers always get a
//! result of the same shape.

pub mod network;
pub mod pixel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::image::ImageSize;
use crate::stats::Stats;

/// Default length of a feature vector.
pub const DEFAULT_DIMENSIONS: usize = 16;

/// Fixed-length numeric summary of an image.
pub type FeatureVector = Vec<f64>;

/// Describes how a feature vector was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    /// Natural size of the source image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,

    /// Side of the square canvas the image was resampled to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_size: Option<usize>,

    /// Grid cells per side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions_per_side: Option<usize>,

    /// Length of the raw activation vector before subsampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_length: Option<usize>,

    /// Name of the network that produced the activations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    /// When the extraction finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Why the vector is zero-filled, if it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionMetadata {
    /// Metadata for a degraded result.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Whether the extraction degraded to a zero vector.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Output of a single extractor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Feature vector of exactly the requested length.
    pub vector: FeatureVector,
    /// How the vector was produced.
    pub metadata: ExtractionMetadata,
}

impl Extraction {
    /// Zero-filled vector of `dimensions` entries, annotated with `reason`.
    #[must_use]
    pub fn degraded(dimensions: usize, reason: impl Into<String>) -> Self {
        Self {
            vector: vec![0.0; dimensions],
            metadata: ExtractionMetadata::failed(reason),
        }
    }
}

/// Feature vector plus its statistics, as returned to callers.
///
/// `S` is [`Stats`] for plain extraction and
/// [`PlacedStats`](crate::emotion::PlacedStats) once a mood coordinate has
/// been attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding<S = Stats> {
    /// Feature vector.
    pub vector: FeatureVector,
    /// How the vector was produced.
    pub metadata: ExtractionMetadata,
    /// Statistics derived from the vector.
    pub stats: S,
}

impl<S> Embedding<S> {
    /// Whether the embedding came from a degraded extraction.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.metadata.is_degraded()
    }
}

/// Pad with zeros or truncate so that `vector` has exactly `dimensions` entries.
pub(crate) fn fit_length(mut vector: FeatureVector, dimensions: usize) -> FeatureVector {
    vector.resize(dimensions, 0.0);
    vector
}
