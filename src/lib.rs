//! # image2vec
//!
//! Image fingerprinting and nearest-neighbor lookup.
//!
//! An image is reduced to a short feature vector, either by averaging the
//! intensity of a grid of regions or by subsampling the activations of a
//! pre-trained network. The vector's mean and variance, normalized and
//! biased by a mood label, give a point on the unit square. Stored records
//! carrying their own `(mean, variance)` are then ranked by Euclidean
//! distance to that point.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use image2vec::{DirStore, Emotion, Pipeline, PipelineConfig, load_image};
//!
//! # async fn run() -> image2vec::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(DirStore::new("./data")));
//! let image = load_image("photo.png")?;
//!
//! let outcome = pipeline.process("photo.png", &image, &Emotion::Joy).await;
//! println!("{}", outcome.search);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`image`]: Raster input and resampling
//! - [`decode`]: PNG/JPEG decoding
//! - [`extract`]: Pixel and network feature extraction
//! - [`stats`]: Mean/variance normalization and collection summaries
//! - [`emotion`]: Mood-biased coordinate placement
//! - [`store`]: Collection access and field coercion
//! - [`search`]: Nearest-neighbor ranking
//! - [`pipeline`]: End-to-end processing and configuration

pub mod decode;
pub mod emotion;
pub mod error;
pub mod extract;
pub mod image;
pub mod pipeline;
pub mod search;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use decode::{decode_image, load_image};
pub use emotion::{Coordinate, Emotion, PlacedStats, map_emotion_to_coordinate};
pub use error::{Error, Result};
pub use extract::network::{FeatureModel, ModelLoader, ModelService, NetworkExtractor};
pub use extract::pixel::PixelExtractor;
pub use extract::{Embedding, Extraction, ExtractionMetadata, FeatureVector};
pub use crate::image::ImageData;
pub use pipeline::{HistoryEntry, MatchOutcome, Pipeline, PipelineConfig};
pub use search::{RankedEntry, ScoredRecord, SearchResult, find_nearest};
pub use stats::{Stats, StatsBounds, Summary, calculate_stats};
pub use store::{CollectionStore, DirStore, MemoryStore, RawRecord, Record};
