//! End-to-end fingerprinting: extract, place, query.
//!
//! [`Pipeline`] ties the extractors, the mood mapper and the collection
//! store together. One [`Pipeline::process`] call runs strictly in order:
//! the embedding is complete before the store is queried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::emotion::{Coordinate, Emotion, PlacedStats};
use crate::error::{Error, Result};
use crate::extract::network::{ModelLoader, ModelService, NetworkExtractor};
use crate::extract::pixel::{DEFAULT_PROCESSED_SIZE, PixelExtractor};
use crate::extract::{DEFAULT_DIMENSIONS, Embedding, Extraction};
use crate::image::ImageData;
use crate::search::{self, DEFAULT_TOP_N, SearchResult};
use crate::stats::{StatsBounds, calculate_stats};
use crate::store::{CollectionStore, DEFAULT_COLLECTION, Record};

/// Pipeline settings.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Feature vector length. Must be a perfect square for pixel extraction.
    pub dimensions: usize,
    /// Side of the square canvas used by pixel extraction.
    pub processed_size: usize,
    /// Normalization bounds for pixel-derived vectors.
    pub pixel_bounds: StatsBounds,
    /// Normalization bounds for network-derived vectors.
    pub network_bounds: StatsBounds,
    /// Collection queried for neighbors.
    pub collection: String,
    /// Number of ranked neighbors to return.
    pub top_n: usize,
    /// Model load timeout in milliseconds.
    pub model_timeout: Option<u64>,
    /// Collection read timeout in milliseconds.
    pub store_timeout: Option<u64>,
    /// Treat unparseable stored `mean`/`var` as 0 rather than NaN.
    pub zero_invalid_fields: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            processed_size: DEFAULT_PROCESSED_SIZE,
            pixel_bounds: StatsBounds::pixel(),
            network_bounds: StatsBounds::network(),
            collection: DEFAULT_COLLECTION.to_string(),
            top_n: DEFAULT_TOP_N,
            model_timeout: None,
            store_timeout: None,
            zero_invalid_fields: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Model load timeout.
    #[must_use]
    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout.map(Duration::from_millis)
    }

    /// Collection read timeout.
    #[must_use]
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout.map(Duration::from_millis)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    dimensions: Option<usize>,
    processed_size: Option<usize>,
    pixel_bounds: Option<StatsBounds>,
    network_bounds: Option<StatsBounds>,
    collection: Option<String>,
    top_n: Option<usize>,
    model_timeout: Option<Duration>,
    store_timeout: Option<Duration>,
    zero_invalid_fields: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the feature vector length.
    #[must_use]
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set the pixel canvas side.
    #[must_use]
    pub fn processed_size(mut self, size: usize) -> Self {
        self.processed_size = Some(size);
        self
    }

    /// Set the pixel normalization bounds.
    #[must_use]
    pub fn pixel_bounds(mut self, bounds: StatsBounds) -> Self {
        self.pixel_bounds = Some(bounds);
        self
    }

    /// Set the network normalization bounds.
    #[must_use]
    pub fn network_bounds(mut self, bounds: StatsBounds) -> Self {
        self.network_bounds = Some(bounds);
        self
    }

    /// Set the queried collection.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Set how many neighbors to rank.
    #[must_use]
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Bound the model load.
    #[must_use]
    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    /// Bound each collection read.
    #[must_use]
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    /// Choose 0 (`true`) or NaN (`false`) for unparseable stored fields.
    #[must_use]
    pub fn zero_invalid_fields(mut self, zero: bool) -> Self {
        self.zero_invalid_fields = Some(zero);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        let millis = |d: Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        PipelineConfig {
            dimensions: self.dimensions.unwrap_or(defaults.dimensions),
            processed_size: self.processed_size.unwrap_or(defaults.processed_size),
            pixel_bounds: self.pixel_bounds.unwrap_or(defaults.pixel_bounds),
            network_bounds: self.network_bounds.unwrap_or(defaults.network_bounds),
            collection: self.collection.unwrap_or(defaults.collection),
            top_n: self.top_n.unwrap_or(defaults.top_n),
            model_timeout: self.model_timeout.map(millis),
            store_timeout: self.store_timeout.map(millis),
            zero_invalid_fields: self
                .zero_invalid_fields
                .unwrap_or(defaults.zero_invalid_fields),
        }
    }
}

/// One processed upload, kept for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Caller-supplied label, typically the file name.
    pub label: String,
    /// Embedding produced for the upload.
    pub embedding: Embedding<PlacedStats>,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Embedding and neighbors of one processed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Mood-placed embedding.
    pub embedding: Embedding<PlacedStats>,
    /// Neighbors of the embedding's coordinate.
    pub search: SearchResult,
}

/// Fingerprinting and lookup against one collection store.
pub struct Pipeline {
    config: PipelineConfig,
    pixel: PixelExtractor,
    network: Option<NetworkExtractor>,
    store: Arc<dyn CollectionStore>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("network", &self.network.is_some())
            .field("history_len", &self.history.lock().len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline reading neighbors from `store`.
    #[must_use]
    pub fn new(config: PipelineConfig, store: Arc<dyn CollectionStore>) -> Self {
        Self {
            pixel: PixelExtractor::new(config.processed_size),
            config,
            network: None,
            store,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Enable network extraction, loading the model lazily from `loader`.
    #[must_use]
    pub fn with_model_loader(self, loader: Arc<dyn ModelLoader>) -> Self {
        let service = ModelService::new(loader).with_timeout(self.config.model_timeout());
        self.with_model_service(Arc::new(service))
    }

    /// Enable network extraction through an existing, possibly shared, service.
    #[must_use]
    pub fn with_model_service(mut self, service: Arc<ModelService>) -> Self {
        self.network = Some(NetworkExtractor::new(service));
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pixel embedding of `image`, placed on the plane for `emotion`.
    ///
    /// Never fails: invalid input yields a zero vector with centered
    /// statistics and the error text in `metadata.error`.
    #[must_use]
    pub fn image2vec(&self, image: &ImageData, emotion: &Emotion) -> Embedding<PlacedStats> {
        let start = Instant::now();
        let extraction = self.pixel.extract(image, self.config.dimensions);
        let embedding = embed(extraction, &self.config.pixel_bounds);
        let stats = PlacedStats::place(embedding.stats, emotion);

        tracing::info!(
            emotion = %emotion,
            mean = stats.stats.mean,
            variance = stats.stats.variance,
            x = stats.x,
            y = stats.y,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "image embedded"
        );

        Embedding {
            vector: embedding.vector,
            metadata: embedding.metadata,
            stats,
        }
    }

    /// Network embedding of `image`.
    ///
    /// Only a model load failure is an error; everything else degrades to a
    /// zero vector.
    pub async fn image2vec_dnn(&self, image: &ImageData, dimensions: usize) -> Result<Embedding> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| Error::ModelLoad("no model loader configured".to_string()))?;

        let start = Instant::now();
        let extraction = network.extract(image, dimensions).await?;
        let embedding = embed(extraction, &self.config.network_bounds);

        tracing::info!(
            mean = embedding.stats.mean,
            variance = embedding.stats.variance,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "image embedded with network"
        );
        Ok(embedding)
    }

    /// Rank stored records by distance to `(mean, variance)`.
    ///
    /// Store failures, timeouts and non-finite queries are logged and
    /// produce an empty result.
    pub async fn find_nearest(&self, mean: f64, variance: f64, n: usize) -> SearchResult {
        match self.try_find_nearest(mean, variance, n).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "nearest-neighbor query failed");
                SearchResult::empty()
            }
        }
    }

    /// Rank stored records by distance to `(mean, variance)`, surfacing errors.
    pub async fn try_find_nearest(&self, mean: f64, variance: f64, n: usize) -> Result<SearchResult> {
        if !mean.is_finite() || !variance.is_finite() {
            return Err(Error::InvalidInput(format!(
                "query coordinate must be finite, got ({mean}, {variance})"
            )));
        }

        let start = Instant::now();
        let records = self.read_collection().await?;
        let result = search::find_nearest(Coordinate { x: mean, y: variance }, &records, n);

        tracing::info!(
            collection = %self.config.collection,
            records = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "nearest-neighbor query finished"
        );
        Ok(result)
    }

    /// Embed `image`, record it in the history, then query its neighbors.
    pub async fn process(
        &self,
        label: impl Into<String>,
        image: &ImageData,
        emotion: &Emotion,
    ) -> MatchOutcome {
        let embedding = self.image2vec(image, emotion);

        self.history.lock().push(HistoryEntry {
            label: label.into(),
            embedding: embedding.clone(),
            timestamp: Utc::now(),
        });

        let search = self
            .find_nearest(embedding.stats.x, embedding.stats.y, self.config.top_n)
            .await;

        MatchOutcome { embedding, search }
    }

    /// Snapshot of every processed upload, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().clone()
    }

    /// Empty the history, returning what it held.
    pub fn clear_history(&self) -> Vec<HistoryEntry> {
        std::mem::take(&mut *self.history.lock())
    }

    async fn read_collection(&self) -> Result<Vec<Record>> {
        let collection = self.config.collection.as_str();
        let read = self.store.get_all(collection);
        let raw = match self.config.store_timeout() {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| Error::StoreRead {
                    collection: collection.to_string(),
                    reason: format!("timed out after {} ms", limit.as_millis()),
                })??,
            None => read.await?,
        };

        let zero_invalid = self.config.zero_invalid_fields;
        Ok(raw.iter().map(|r| r.coerce(zero_invalid)).collect())
    }
}

fn embed(extraction: Extraction, bounds: &StatsBounds) -> Embedding {
    let stats = calculate_stats(&extraction.vector, bounds);
    Embedding {
        vector: extraction.vector,
        metadata: extraction.metadata,
        stats,
    }
}
