//! Mood-biased placement of normalized statistics on the unit square.
//!
//! The four moods 喜 (joy), 怒 (anger), 哀 (sorrow) and 楽 (ease) push a
//! point 0.2 towards one corner of the (mean, variance) plane. Any other
//! label leaves the point where it is. The result is clamped to
//! `[0.001, 0.999]` on each axis so that plotted points never sit on the
//! border.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stats::Stats;

/// Lowest coordinate value on either axis.
pub const COORDINATE_MIN: f64 = 0.001;
/// Highest coordinate value on either axis.
pub const COORDINATE_MAX: f64 = 0.999;

const OFFSET: f64 = 0.2;

/// Mood label attached to an uploaded image.
///
/// Labels are compared exactly; surrounding whitespace makes a label
/// [`Emotion::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Emotion {
    /// 喜: high mean, high variance.
    Joy,
    /// 怒: low mean, high variance.
    Anger,
    /// 哀: low mean, low variance.
    Sorrow,
    /// 楽: high mean, low variance.
    Ease,
    /// Any other label; no offset.
    Other(String),
}

impl Emotion {
    /// Additive `(mean, variance)` offset for this mood.
    #[must_use]
    pub fn offset(&self) -> (f64, f64) {
        match self {
            Self::Joy => (OFFSET, OFFSET),
            Self::Anger => (-OFFSET, OFFSET),
            Self::Sorrow => (-OFFSET, -OFFSET),
            Self::Ease => (OFFSET, -OFFSET),
            Self::Other(_) => (0.0, 0.0),
        }
    }

    /// The label as written by users.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Joy => "喜",
            Self::Anger => "怒",
            Self::Sorrow => "哀",
            Self::Ease => "楽",
            Self::Other(label) => label,
        }
    }
}

impl FromStr for Emotion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "喜" => Self::Joy,
            "怒" => Self::Anger,
            "哀" => Self::Sorrow,
            "楽" => Self::Ease,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for Emotion {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(emotion) => emotion,
            Err(never) => match never {},
        }
    }
}

impl From<Emotion> for String {
    fn from(emotion: Emotion) -> Self {
        emotion.label().to_string()
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point on the (mean, variance) plane, strictly inside the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Mean axis.
    pub x: f64,
    /// Variance axis.
    pub y: f64,
}

impl Coordinate {
    /// Place a point without mood bias.
    #[must_use]
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: clamp_axis(x),
            y: clamp_axis(y),
        }
    }
}

/// Offset normalized statistics by mood and clamp into `[0.001, 0.999]`.
///
/// # Example
///
/// ```
/// use image2vec::emotion::{map_emotion_to_coordinate, Emotion};
///
/// let c = map_emotion_to_coordinate(&Emotion::Joy, 0.9, 0.1);
/// assert_eq!(c.x, 0.999);
/// assert!((c.y - 0.3).abs() < 1e-12);
/// ```
#[must_use]
pub fn map_emotion_to_coordinate(
    emotion: &Emotion,
    normalized_mean: f64,
    normalized_variance: f64,
) -> Coordinate {
    if let Emotion::Other(label) = emotion {
        tracing::debug!(label = %label, "unknown emotion label, no offset applied");
    }
    let (dx, dy) = emotion.offset();
    Coordinate::clamped(normalized_mean + dx, normalized_variance + dy)
}

/// NaN has no position; it lands in the center like an empty vector's stats.
fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        return 0.5;
    }
    value.clamp(COORDINATE_MIN, COORDINATE_MAX)
}

/// [`Stats`] plus the mood-biased plotting coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacedStats {
    /// Raw and normalized statistics.
    #[serde(flatten)]
    pub stats: Stats,
    /// Mean axis after the mood offset.
    pub x: f64,
    /// Variance axis after the mood offset.
    pub y: f64,
}

impl PlacedStats {
    /// Attach the coordinate for `emotion` to `stats`.
    #[must_use]
    pub fn place(stats: Stats, emotion: &Emotion) -> Self {
        let c = map_emotion_to_coordinate(emotion, stats.normalized_mean, stats.normalized_variance);
        Self {
            stats,
            x: c.x,
            y: c.y,
        }
    }

    /// The plotting coordinate.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate { x: self.x, y: self.y }
    }
}
