//! Feature vectors from a pre-trained classification network.
//!
//! The network itself is an external collaborator behind [`FeatureModel`];
//! this module owns preprocessing, lazy single-flight loading through
//! [`ModelService`], and the uniform-stride subsampling that turns a long
//! activation vector into a short feature vector.
//!
//! ## Loading lifecycle
//!
//! ```text
//! Uninitialized --model()--> Loading --ok--> Ready
//!                               |
//!                               +--err--> Failed --model()--> Loading ...
//! ```
//!
//! Every caller that arrives while a load is in flight awaits the same
//! shared future and receives the same `Arc` once it resolves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::{Extraction, ExtractionMetadata, FeatureVector};
use crate::error::{Error, Result};
use crate::image::{ImageData, resample_f32};

/// Square input size expected by the network.
pub const MODEL_INPUT_SIZE: usize = 224;

/// Preprocessed network input: RGB, row-major, channels interleaved,
/// values scaled to `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    /// `width * height * 3` values.
    pub data: Vec<f32>,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

/// Resample to 224x224 and scale channels from `[0, 255]` to `[-1, 1]`.
///
/// The resize happens in floating point, so no 8-bit rounding occurs
/// between resampling and scaling.
#[must_use]
pub fn preprocess(image: &ImageData) -> ModelInput {
    let size = MODEL_INPUT_SIZE;
    // Channels come back in [0, 1]; x * 255 / 127.5 - 1 == x * 2 - 1
    let data = resample_f32(image.to_rgba8().as_ref(), size, size)
        .into_iter()
        .map(|c| c * 2.0 - 1.0)
        .collect();
    ModelInput {
        data,
        width: size,
        height: size,
    }
}

/// A loaded network producing penultimate-layer activations.
pub trait FeatureModel: Send + Sync {
    /// Name reported in extraction metadata.
    fn name(&self) -> &str {
        "MobileNet"
    }

    /// Run the network and return the flattened activations.
    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>>;
}

/// Source of a [`FeatureModel`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model. Called at most once per in-flight load.
    async fn load(&self) -> Result<Arc<dyn FeatureModel>>;
}

/// Loader that prefers one source and falls back to another, e.g. a model
/// bundled next to the binary and a copy hosted remotely.
pub struct FallbackLoader {
    primary: Arc<dyn ModelLoader>,
    fallback: Arc<dyn ModelLoader>,
}

impl FallbackLoader {
    /// Create a loader trying `primary` first.
    #[must_use]
    pub fn new(primary: Arc<dyn ModelLoader>, fallback: Arc<dyn ModelLoader>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ModelLoader for FallbackLoader {
    async fn load(&self) -> Result<Arc<dyn FeatureModel>> {
        match self.primary.load().await {
            Ok(model) => Ok(model),
            Err(e) => {
                tracing::info!(error = %e, "primary model source unavailable, using fallback");
                self.fallback.load().await
            }
        }
    }
}

/// Observable lifecycle of a [`ModelService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    /// No load attempted yet.
    Uninitialized,
    /// A load is in flight.
    Loading,
    /// The model is available.
    Ready,
    /// The last load failed; the next request retries.
    Failed(String),
}

type LoadOutcome = std::result::Result<Arc<dyn FeatureModel>, String>;
type LoadFuture = Shared<BoxFuture<'static, LoadOutcome>>;

enum Slot {
    Uninitialized,
    Loading(LoadFuture),
    Ready(Arc<dyn FeatureModel>),
    Failed(String),
}

/// Lazily loads a model once and hands the same instance to every caller.
pub struct ModelService {
    loader: Arc<dyn ModelLoader>,
    timeout: Option<Duration>,
    slot: Mutex<Slot>,
}

impl std::fmt::Debug for ModelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ModelService {
    /// Create a service around `loader`. Nothing is loaded until first use.
    #[must_use]
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            timeout: None,
            slot: Mutex::new(Slot::Uninitialized),
        }
    }

    /// Bound each load attempt. A timed-out load counts as failed.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ModelState {
        match &*self.slot.lock() {
            Slot::Uninitialized => ModelState::Uninitialized,
            Slot::Loading(_) => ModelState::Loading,
            Slot::Ready(_) => ModelState::Ready,
            Slot::Failed(reason) => ModelState::Failed(reason.clone()),
        }
    }

    /// Return the model, loading it if necessary.
    ///
    /// Concurrent callers during a load share that load and its outcome.
    pub async fn model(&self) -> Result<Arc<dyn FeatureModel>> {
        let pending = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(model) => return Ok(Arc::clone(model)),
                Slot::Loading(pending) => {
                    tracing::debug!("model load in flight, waiting");
                    pending.clone()
                }
                Slot::Uninitialized | Slot::Failed(_) => {
                    let pending = self.start_load();
                    *slot = Slot::Loading(pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.clone().await;

        let mut slot = self.slot.lock();
        if let Slot::Loading(current) = &*slot {
            if current.ptr_eq(&pending) {
                *slot = match &outcome {
                    Ok(model) => Slot::Ready(Arc::clone(model)),
                    Err(reason) => Slot::Failed(reason.clone()),
                };
            }
        }

        outcome.map_err(Error::ModelLoad)
    }

    fn start_load(&self) -> LoadFuture {
        let loader = Arc::clone(&self.loader);
        let timeout = self.timeout;

        async move {
            tracing::info!("model load started");
            let start = Instant::now();

            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, loader.load())
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::ModelLoad(format!("timed out after {}ms", limit.as_millis())))
                    }),
                None => loader.load().await,
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(model) => {
                    tracing::info!(elapsed_ms, model = model.name(), "model ready");
                    Ok(model)
                }
                Err(e) => {
                    tracing::error!(elapsed_ms, error = %e, "model load failed");
                    Err(match e {
                        Error::ModelLoad(reason) => reason,
                        other => other.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Pick `dimensions` activations at a uniform stride.
///
/// `step = len / dimensions` (integer division) and entry `i` is
/// `activations[min(i * step, len - 1)]`. Empty input yields zeros.
///
/// # Example
///
/// ```
/// use image2vec::extract::network::subsample_activations;
///
/// let activations: Vec<f32> = (0..100).map(|i| i as f32).collect();
/// let vector = subsample_activations(&activations, 10);
/// assert_eq!(vector, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]);
/// ```
#[must_use]
pub fn subsample_activations(activations: &[f32], dimensions: usize) -> FeatureVector {
    let len = activations.len();
    if len == 0 || dimensions == 0 {
        return vec![0.0; dimensions];
    }
    let step = len / dimensions;
    (0..dimensions)
        .map(|i| f64::from(activations[(i * step).min(len - 1)]))
        .collect()
}

/// Extracts feature vectors through a shared [`ModelService`].
#[derive(Debug, Clone)]
pub struct NetworkExtractor {
    service: Arc<ModelService>,
}

impl NetworkExtractor {
    /// Create an extractor backed by `service`.
    #[must_use]
    pub fn new(service: Arc<ModelService>) -> Self {
        Self { service }
    }

    /// The underlying model service.
    #[must_use]
    pub fn service(&self) -> &Arc<ModelService> {
        &self.service
    }

    /// Extract a vector of `dimensions` entries.
    ///
    /// Only a model load failure is returned as an error. Invalid images
    /// and prediction failures produce a zero vector annotated in
    /// `metadata.error`.
    pub async fn extract(&self, image: &ImageData, dimensions: usize) -> Result<Extraction> {
        if let Err(e) = image.validate() {
            tracing::warn!(error = %e, "network extraction skipped: invalid image");
            return Ok(Extraction::degraded(dimensions, e.to_string()));
        }

        let model = self.service.model().await?;

        let start = Instant::now();
        match run_model(model.as_ref(), image, dimensions) {
            Ok(extraction) => {
                tracing::debug!(
                    dimensions,
                    original_length = extraction.metadata.original_length,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "network features extracted"
                );
                Ok(extraction)
            }
            Err(e) => {
                tracing::warn!(error = %e, "network extraction degraded to zero vector");
                Ok(Extraction::degraded(dimensions, e.to_string()))
            }
        }
    }
}

fn run_model(model: &dyn FeatureModel, image: &ImageData, dimensions: usize) -> Result<Extraction> {
    let input = preprocess(image);
    let activations = model.predict(&input)?;
    if activations.is_empty() {
        return Err(Error::Model("model returned no activations".to_string()));
    }

    Ok(Extraction {
        vector: subsample_activations(&activations, dimensions),
        metadata: ExtractionMetadata {
            image_size: Some(image.size()),
            original_length: Some(activations.len()),
            model_type: Some(model.name().to_string()),
            timestamp: Some(chrono::Utc::now()),
            ..ExtractionMetadata::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;
    use rgb::RGB8;

    /// Returns `0, 1, 2, ...` regardless of input.
    struct RampModel {
        len: usize,
    }

    impl FeatureModel for RampModel {
        fn name(&self) -> &str {
            "ramp"
        }

        fn predict(&self, input: &ModelInput) -> Result<Vec<f32>> {
            assert_eq!(input.data.len(), MODEL_INPUT_SIZE * MODEL_INPUT_SIZE * 3);
            Ok((0..self.len).map(|i| i as f32).collect())
        }
    }

    struct BrokenModel;

    impl FeatureModel for BrokenModel {
        fn predict(&self, _input: &ModelInput) -> Result<Vec<f32>> {
            Err(Error::Model("tensor shape mismatch".to_string()))
        }
    }

    struct TestLoader {
        loads: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
        model: Arc<dyn FeatureModel>,
    }

    impl TestLoader {
        fn new(model: Arc<dyn FeatureModel>) -> (Self, Arc<AtomicUsize>) {
            let loads = Arc::new(AtomicUsize::new(0));
            let loader = Self {
                loads: Arc::clone(&loads),
                delay: Duration::from_millis(20),
                fail: false,
                model,
            };
            (loader, loads)
        }
    }

    #[async_trait]
    impl ModelLoader for TestLoader {
        async fn load(&self) -> Result<Arc<dyn FeatureModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::ModelLoad("model.json not found".to_string()));
            }
            Ok(Arc::clone(&self.model))
        }
    }

    fn ramp_service(len: usize) -> (Arc<ModelService>, Arc<AtomicUsize>) {
        let (loader, loads) = TestLoader::new(Arc::new(RampModel { len }));
        (Arc::new(ModelService::new(Arc::new(loader))), loads)
    }

    #[test]
    fn test_subsample_stride() {
        let activations: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let vector = subsample_activations(&activations, 10);
        let expected: Vec<f64> = (0..10).map(|i| f64::from(i * 10)).collect();
        assert_eq!(vector, expected);
    }

    #[test]
    fn test_subsample_uneven_length() {
        // step = 10 / 4 = 2
        let activations: Vec<f32> = (0..10).map(|i| i as f32).collect();
        assert_eq!(subsample_activations(&activations, 4), vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_subsample_shorter_than_dimensions() {
        // step = 0, every entry is the first activation
        assert_eq!(subsample_activations(&[7.0, 8.0], 3), vec![7.0, 7.0, 7.0]);
        assert_eq!(subsample_activations(&[], 3), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_scales_to_unit_range() {
        let white = preprocess(&ImageData::solid(10, 10, RGB8::new(255, 255, 255)));
        assert_eq!(white.width, 224);
        assert_eq!(white.data.len(), 224 * 224 * 3);
        assert!(white.data.iter().all(|&v| (v - 1.0).abs() < 1e-5));

        let black = preprocess(&ImageData::solid(500, 300, RGB8::new(0, 0, 0)));
        assert!(black.data.iter().all(|&v| (v + 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_preprocess_does_not_round_to_8_bits() {
        // Alternating 0/1 rows downscaled 2:1 vertically blend to 0.5 / 255
        let pixels: Vec<RGB8> = (0..448 * 448)
            .map(|i| if (i / 448) % 2 == 0 { RGB8::new(0, 0, 0) } else { RGB8::new(1, 1, 1) })
            .collect();
        let input = preprocess(&ImageData::Rgb8(imgref::ImgVec::new(pixels, 448, 448)));
        let expected = 0.5 / 127.5 - 1.0;
        let centre = (112 * 224 + 112) * 3;
        assert!((input.data[centre] - expected).abs() < 1e-4, "{}", input.data[centre]);
        assert!(input.data[centre] > -1.0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let (service, loads) = ramp_service(100);
        assert_eq!(service.state(), ModelState::Uninitialized);

        let models = join_all((0..8).map(|_| service.model())).await;
        let models: Vec<_> = models.into_iter().map(|m| m.unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
        assert_eq!(service.state(), ModelState::Ready);

        // Later calls reuse the ready model
        let again = service.model().await.unwrap();
        assert!(Arc::ptr_eq(&again, &models[0]));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_across_tasks() {
        let (service, loads) = ramp_service(100);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.model().await.map(|m| m.name().to_string()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "ramp");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_shared_then_retried() {
        let (mut loader, loads) = TestLoader::new(Arc::new(RampModel { len: 4 }));
        loader.fail = true;
        let service = ModelService::new(Arc::new(loader));

        let results = join_all((0..3).map(|_| service.model())).await;
        assert!(results.iter().all(|r| matches!(r, Err(Error::ModelLoad(_)))));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(matches!(service.state(), ModelState::Failed(reason) if reason.contains("model.json")));

        assert!(service.model().await.is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout() {
        let (mut loader, _loads) = TestLoader::new(Arc::new(RampModel { len: 4 }));
        loader.delay = Duration::from_secs(30);
        let service = ModelService::new(Arc::new(loader)).with_timeout(Some(Duration::from_millis(50)));

        let Err(err) = service.model().await else {
            panic!("load should time out");
        };
        assert!(matches!(err, Error::ModelLoad(ref reason) if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_fallback_loader() {
        let (mut primary, primary_loads) = TestLoader::new(Arc::new(RampModel { len: 4 }));
        primary.fail = true;
        let (fallback, fallback_loads) = TestLoader::new(Arc::new(RampModel { len: 8 }));

        let loader = FallbackLoader::new(Arc::new(primary), Arc::new(fallback));
        let model = loader.load().await.unwrap();

        assert_eq!(model.name(), "ramp");
        assert_eq!(primary_loads.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extract_subsamples_activations() {
        let (service, _) = ramp_service(1024);
        let extractor = NetworkExtractor::new(service);
        let image = ImageData::solid(32, 32, RGB8::new(10, 20, 30));

        let extraction = extractor.extract(&image, 16).await.unwrap();
        let expected: Vec<f64> = (0..16).map(|i| f64::from(i * 64)).collect();
        assert_eq!(extraction.vector, expected);
        assert_eq!(extraction.metadata.original_length, Some(1024));
        assert_eq!(extraction.metadata.model_type.as_deref(), Some("ramp"));
        assert!(extraction.metadata.error.is_none());
    }

    #[tokio::test]
    async fn test_extract_invalid_image_does_not_load_model() {
        let (service, loads) = ramp_service(16);
        let extractor = NetworkExtractor::new(service);
        let image = ImageData::RgbSlice {
            data: vec![],
            width: 0,
            height: 0,
        };

        let extraction = extractor.extract(&image, 16).await.unwrap();
        assert_eq!(extraction.vector, vec![0.0; 16]);
        assert!(extraction.metadata.is_degraded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extract_prediction_failure_degrades() {
        let (loader, _) = TestLoader::new(Arc::new(BrokenModel));
        let extractor = NetworkExtractor::new(Arc::new(ModelService::new(Arc::new(loader))));
        let image = ImageData::solid(4, 4, RGB8::new(1, 2, 3));

        let extraction = extractor.extract(&image, 8).await.unwrap();
        assert_eq!(extraction.vector, vec![0.0; 8]);
        assert!(extraction.metadata.error.unwrap().contains("tensor shape mismatch"));
    }

    #[tokio::test]
    async fn test_extract_load_failure_propagates() {
        let (mut loader, _) = TestLoader::new(Arc::new(RampModel { len: 4 }));
        loader.fail = true;
        let extractor = NetworkExtractor::new(Arc::new(ModelService::new(Arc::new(loader))));
        let image = ImageData::solid(4, 4, RGB8::new(1, 2, 3));

        let err = extractor.extract(&image, 8).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
