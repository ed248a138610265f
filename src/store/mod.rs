//! Read-only access to stored collections of `(title, mean, var)` records.
//!
//! The document store is an external collaborator behind
//! [`CollectionStore`]. Documents may hold `mean` and `var` as numbers or
//! as strings; [`RawRecord::coerce`] turns them into floats the way a
//! browser's `parseFloat` would, i.e. by reading the longest numeric prefix.
//!
//! Two stores ship with the crate:
//!
//! - [`MemoryStore`]: collections held in memory, for tests and embedding.
//! - [`DirStore`]: one `<collection>.json` or `<collection>.csv` file per
//!   collection in a directory.

mod coerce;
mod dir;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use coerce::parse_float_prefix;
pub use dir::DirStore;

use crate::error::{Error, Result};

/// Collection queried by default.
pub const DEFAULT_COLLECTION: &str = "book_score";

/// Title used for documents without one.
pub const DEFAULT_TITLE: &str = "No Title";

/// A document field that may hold a number, a string, or nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric field.
    Number(f64),
    /// String field, parsed on coercion.
    Text(String),
    /// Absent or null field.
    #[default]
    Missing,
    /// Any other JSON value (boolean, array, object); never numeric.
    Other(serde_json::Value),
}

impl FieldValue {
    /// Parse the field as a float, `None` when nothing numeric is present.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_float_prefix(s),
            Self::Missing | Self::Other(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A document as returned by the store.
///
/// Deserialization never fails on field types: identifiers and titles may
/// be strings or numbers, and anything else counts as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Document identifier.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    /// Display title.
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    /// Stored mean (x axis).
    #[serde(default)]
    pub mean: FieldValue,
    /// Stored variance (y axis).
    #[serde(default)]
    pub var: FieldValue,
}

impl RawRecord {
    /// Create a numeric record.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, mean: f64, var: f64) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            mean: FieldValue::Number(mean),
            var: FieldValue::Number(var),
        }
    }

    /// Convert to a typed [`Record`].
    ///
    /// Unparseable `mean`/`var` become 0 when `zero_invalid` is set and NaN
    /// otherwise. A missing title becomes [`DEFAULT_TITLE`].
    #[must_use]
    pub fn coerce(&self, zero_invalid: bool) -> Record {
        let fallback = if zero_invalid { 0.0 } else { f64::NAN };
        Record {
            id: self.id.clone(),
            title: self
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            mean: self.mean.as_f64().unwrap_or(fallback),
            variance: self.var.as_f64().unwrap_or(fallback),
        }
    }
}

/// Strings pass through, non-zero numbers are printed, the rest is absent.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// A stored entry with numeric coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Document identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Mean (x axis).
    pub mean: f64,
    /// Variance (y axis).
    pub variance: f64,
}

/// Read access to named collections.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Read every document of `collection`, in store order.
    ///
    /// A collection that does not exist is empty, not an error.
    async fn get_all(&self, collection: &str) -> Result<Vec<RawRecord>>;
}

/// Collections held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<RawRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `collection`.
    #[must_use]
    pub fn with_collection(mut self, collection: &str, records: Vec<RawRecord>) -> Self {
        self.collections.insert(collection.to_string(), records);
        self
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<RawRecord>> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }
}

/// Store that always fails, for exercising error paths.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    /// Create a store failing with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl CollectionStore for UnavailableStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<RawRecord>> {
        Err(Error::StoreRead {
            collection: collection.to_string(),
            reason: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_numeric_and_text() {
        let raw = RawRecord {
            id: "a".to_string(),
            title: Some("Walden".to_string()),
            mean: FieldValue::Text("0.25".to_string()),
            var: FieldValue::Number(0.5),
        };
        let record = raw.coerce(true);
        assert_eq!(record.title, "Walden");
        assert_eq!(record.mean, 0.25);
        assert_eq!(record.variance, 0.5);
    }

    #[test]
    fn test_coerce_invalid_fields() {
        let raw = RawRecord {
            id: "b".to_string(),
            title: None,
            mean: FieldValue::Text("n/a".to_string()),
            var: FieldValue::Missing,
        };
        let zeroed = raw.coerce(true);
        assert_eq!(zeroed.title, DEFAULT_TITLE);
        assert_eq!((zeroed.mean, zeroed.variance), (0.0, 0.0));

        let strict = raw.coerce(false);
        assert!(strict.mean.is_nan());
        assert!(strict.variance.is_nan());
    }

    #[test]
    fn test_raw_record_deserializes_mixed_fields() {
        let json = r#"[
            {"id": "1", "title": "Kokoro", "mean": "0.4", "var": 0.1},
            {"id": "2", "mean": 0.6, "var": null},
            {"id": "3", "title": "Snow Country"}
        ]"#;
        let records: Vec<RawRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].mean, FieldValue::Text("0.4".to_string()));
        assert_eq!(records[0].var, FieldValue::Number(0.1));
        assert_eq!(records[1].title, None);
        assert_eq!(records[1].var, FieldValue::Missing);
        assert_eq!(records[2].mean, FieldValue::Missing);
    }

    #[test]
    fn test_malformed_fields_do_not_fail_the_collection() {
        let json = r#"[
            {"id": "a", "title": 42, "mean": true, "var": {"nested": 1}},
            {"id": 7, "title": ["x"], "mean": [0.5], "var": "0.25"},
            {"id": "c", "title": "Ok", "mean": 0.1, "var": 0.2}
        ]"#;
        let records: Vec<RawRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 3);

        let first = records[0].coerce(true);
        assert_eq!(first.title, "42");
        assert_eq!((first.mean, first.variance), (0.0, 0.0));

        let second = records[1].coerce(true);
        assert_eq!(second.id, "7");
        assert_eq!(second.title, DEFAULT_TITLE);
        assert_eq!((second.mean, second.variance), (0.0, 0.25));

        assert!(records[0].coerce(false).mean.is_nan());
        assert_eq!(records[2].coerce(true).mean, 0.1);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new().with_collection(
            DEFAULT_COLLECTION,
            vec![RawRecord::new("a", "X", 0.5, 0.5)],
        );
        assert_eq!(store.get_all(DEFAULT_COLLECTION).await.unwrap().len(), 1);
        assert!(store.get_all("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let err = UnavailableStore::new("offline").get_all("book_score").await.unwrap_err();
        assert!(matches!(err, Error::StoreRead { ref collection, .. } if collection == "book_score"));
    }
}
