//! Brute-force nearest-neighbor search over (mean, variance) records.
//!
//! Every call scores the whole collection: Euclidean distance from the
//! query to each record's `(mean, variance)` point, sorted ascending. The
//! sort is stable, so equal distances keep collection order, and NaN
//! distances (records whose fields did not parse) always sort last.

use std::cmp::Ordering;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::emotion::Coordinate;
use crate::store::Record;

/// Number of ranked entries returned by default.
pub const DEFAULT_TOP_N: usize = 2;

/// A stored record with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// Document identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Stored mean.
    pub mean: f64,
    /// Stored variance.
    pub variance: f64,
    /// Euclidean distance to the query.
    pub distance: f64,
}

/// Identifier and title of a ranked record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Document identifier.
    pub id: String,
    /// Display title.
    pub title: String,
}

impl From<&ScoredRecord> for RankedEntry {
    fn from(record: &ScoredRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
        }
    }
}

/// Result of a nearest-neighbor query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Closest record, `None` for an empty collection.
    pub nearest: Option<ScoredRecord>,
    /// Top-n records, closest first.
    pub ranked: Vec<RankedEntry>,
    /// Top-n records with their distances, for display.
    pub matches: Vec<ScoredRecord>,
}

impl SearchResult {
    /// Result with no matches.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nearest.is_none()
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matches.is_empty() {
            return writeln!(f, "No matches.");
        }
        for (rank, m) in self.matches.iter().enumerate() {
            writeln!(
                f,
                "{:>3}. {} ({})  distance {:.4}  mean {:.4}  var {:.4}",
                rank + 1,
                m.title,
                m.id,
                m.distance,
                m.mean,
                m.variance
            )?;
        }
        Ok(())
    }
}

/// Euclidean distance between the query and a record's `(mean, variance)`.
#[must_use]
pub fn distance(query: Coordinate, record: &Record) -> f64 {
    let dx = query.x - record.mean;
    let dy = query.y - record.variance;
    (dx * dx + dy * dy).sqrt()
}

/// Ascending order with NaN after every number.
fn by_distance(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    match (a.distance.is_nan(), b.distance.is_nan()) {
        (false, false) => a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

/// Rank `records` by distance to `query` and keep the closest `n`.
///
/// `nearest` is the closest record regardless of `n`.
///
/// # Example
///
/// ```
/// use image2vec::emotion::Coordinate;
/// use image2vec::search::find_nearest;
/// use image2vec::store::Record;
///
/// let records = vec![
///     Record { id: "a".into(), title: "X".into(), mean: 0.5, variance: 0.5 },
///     Record { id: "b".into(), title: "Y".into(), mean: 0.0, variance: 0.0 },
/// ];
/// let result = find_nearest(Coordinate { x: 0.5, y: 0.5 }, &records, 1);
/// assert_eq!(result.nearest.unwrap().id, "a");
/// assert_eq!(result.ranked.len(), 1);
/// ```
#[must_use]
pub fn find_nearest(query: Coordinate, records: &[Record], n: usize) -> SearchResult {
    let mut scored: Vec<ScoredRecord> = records
        .par_iter()
        .map(|record| ScoredRecord {
            id: record.id.clone(),
            title: record.title.clone(),
            mean: record.mean,
            variance: record.variance,
            distance: distance(query, record),
        })
        .collect();

    scored.sort_by(by_distance);

    let nearest = scored.first().cloned();
    scored.truncate(n);

    for (rank, m) in scored.iter().enumerate() {
        tracing::info!(
            rank = rank + 1,
            id = %m.id,
            title = %m.title,
            distance = %format!("{:.4}", m.distance),
            "match"
        );
    }

    SearchResult {
        nearest,
        ranked: scored.iter().map(RankedEntry::from).collect(),
        matches: scored,
    }
}
