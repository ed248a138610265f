//! Feature-vector statistics and normalization.
//!
//! Every feature vector is reduced to its population mean and variance,
//! which are then normalized into the unit interval against fixed bounds.
//! The bounds depend on the extractor that produced the vector, see
//! [`StatsBounds::pixel`] and [`StatsBounds::network`].
//!
//! Normalized values are *not* clamped: a variance above the configured
//! maximum yields a normalized variance above 1.0. Clamping happens later,
//! when a coordinate is placed on the plane (see [`crate::emotion`]).
//!
//! ## Collection Statistics
//!
//! - [`Summary`]: Descriptive statistics (mean, median, std_dev, min, max)
//!   used to inspect the stored collection.

use serde::{Deserialize, Serialize};

/// Fixed normalization bounds for mean and variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsBounds {
    /// Lower bound for the mean.
    pub min_mean: f64,
    /// Upper bound for the mean.
    pub max_mean: f64,
    /// Lower bound for the variance.
    pub min_variance: f64,
    /// Upper bound for the variance.
    pub max_variance: f64,
}

impl StatsBounds {
    /// Bounds for pixel-derived vectors with entries in `[0, 1]`.
    ///
    /// A vector confined to `[0, 1]` can never exceed a variance of 0.25,
    /// so this maps the full achievable range onto `[0, 1]`.
    #[must_use]
    pub const fn pixel() -> Self {
        Self {
            min_mean: 0.0,
            max_mean: 1.0,
            min_variance: 0.0,
            max_variance: 0.25,
        }
    }

    /// Bounds for vectors subsampled from network activations.
    #[must_use]
    pub const fn network() -> Self {
        Self {
            min_mean: 0.0,
            max_mean: 1.0,
            min_variance: 0.0,
            max_variance: 0.1,
        }
    }
}

impl Default for StatsBounds {
    fn default() -> Self {
        Self::pixel()
    }
}

/// Mean and variance of a feature vector, raw and normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
    /// Mean normalized against [`StatsBounds`].
    pub normalized_mean: f64,
    /// Variance normalized against [`StatsBounds`].
    pub normalized_variance: f64,
}

impl Default for Stats {
    /// Stats of an empty vector: zero moments, centered normalized values.
    fn default() -> Self {
        Self {
            mean: 0.0,
            variance: 0.0,
            normalized_mean: 0.5,
            normalized_variance: 0.5,
        }
    }
}

/// Map `value` linearly so that `min` becomes 0 and `max` becomes 1.
///
/// Returns 0.5 for a degenerate range. The result is not clamped.
///
/// # Example
///
/// ```
/// use image2vec::stats::normalize_value;
///
/// assert_eq!(normalize_value(0.125, 0.0, 0.25), 0.5);
/// assert_eq!(normalize_value(42.0, 1.0, 1.0), 0.5);
/// assert_eq!(normalize_value(0.5, 0.0, 0.25), 2.0);
/// ```
#[must_use]
pub fn normalize_value(value: f64, min: f64, max: f64) -> f64 {
    if min == max {
        return 0.5;
    }
    (value - min) / (max - min)
}

/// Compute mean, population variance and their normalized forms.
///
/// An empty vector yields [`Stats::default`].
///
/// # Example
///
/// ```
/// use image2vec::stats::{calculate_stats, StatsBounds};
///
/// let stats = calculate_stats(&[0.0, 1.0], &StatsBounds::pixel());
/// assert_eq!(stats.mean, 0.5);
/// assert_eq!(stats.variance, 0.25);
/// assert_eq!(stats.normalized_variance, 1.0);
/// ```
#[must_use]
pub fn calculate_stats(vector: &[f64], bounds: &StatsBounds) -> Stats {
    if vector.is_empty() {
        return Stats::default();
    }

    let n = vector.len() as f64;
    let mean = vector.iter().sum::<f64>() / n;
    let variance = vector.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Stats {
        mean,
        variance,
        normalized_mean: normalize_value(mean, bounds.min_mean, bounds.max_mean),
        normalized_variance: normalize_value(variance, bounds.min_variance, bounds.max_variance),
    }
}

/// Descriptive statistics for a set of measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl Summary {
    /// Compute summary statistics for a slice of values.
    ///
    /// NaN entries are ignored. Returns `None` if nothing remains.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let stats = calculate_stats(&sorted, &StatsBounds::default());

        Some(Self {
            count,
            mean: stats.mean,
            median: median_sorted(&sorted),
            std_dev: stats.variance.sqrt(),
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

/// Median of pre-sorted, non-empty values.
fn median_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
