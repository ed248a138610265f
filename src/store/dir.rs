//! Directory-backed collection store.
//!
//! Each collection is a file named after it: `<collection>.json` holding an
//! array of documents, or `<collection>.csv` with a header row. JSON wins
//! when both exist.
//!
//! Reads are synchronous; the [`CollectionStore`] impl moves them onto
//! tokio's blocking pool. A JSON entry that is not a document is logged
//! and skipped rather than failing the whole collection.
//!
//! CSV columns are matched case-insensitively, with aliases:
//!
//! | Field | Accepted headers |
//! |-------|------------------|
//! | id    | `id`, `doc_id`, `key` |
//! | title | `title`, `name` |
//! | mean  | `mean`, `x` |
//! | var   | `var`, `variance`, `y` |

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CollectionStore, FieldValue, RawRecord};
use crate::error::{Error, Result};

/// Collections stored as files in a directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the collection files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a collection synchronously.
    pub fn read_collection(&self, collection: &str) -> Result<Vec<RawRecord>> {
        if collection.is_empty() || collection.contains(['/', '\\']) || collection.starts_with('.') {
            return Err(Error::InvalidInput(format!("invalid collection name '{collection}'")));
        }

        let json_path = self.root.join(format!("{collection}.json"));
        if json_path.is_file() {
            return read_json(&json_path, collection);
        }

        let csv_path = self.root.join(format!("{collection}.csv"));
        if csv_path.is_file() {
            return read_csv(&csv_path, collection);
        }

        tracing::debug!(collection, root = %self.root.display(), "collection file not found");
        Ok(Vec::new())
    }
}

/// File reads run on tokio's blocking pool.
#[async_trait]
impl CollectionStore for DirStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<RawRecord>> {
        let store = self.clone();
        let name = collection.to_string();
        let read = tokio::task::spawn_blocking(move || store.read_collection(&name))
            .await
            .map_err(|e| Error::StoreRead {
                collection: collection.to_string(),
                reason: format!("read task failed: {e}"),
            })?;

        read.map_err(|e| match e {
            Error::StoreRead { .. } | Error::InvalidInput(_) => e,
            other => Error::StoreRead {
                collection: collection.to_string(),
                reason: other.to_string(),
            },
        })
    }
}

/// Parse a JSON array of documents, skipping entries that are not documents.
fn read_json(path: &Path, collection: &str) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&content).map_err(|e| Error::StoreRead {
        collection: collection.to_string(),
        reason: format!("{}: {e}", path.display()),
    })?;

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RawRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(collection, index, error = %e, "skipping malformed document"),
        }
    }
    Ok(records)
}

fn read_csv(path: &Path, collection: &str) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

    let id_idx = find_column(&header_refs, &["id", "doc_id", "key"]);
    let title_idx = find_column(&header_refs, &["title", "name"]);
    let mean_idx = find_column(&header_refs, &["mean", "x"]);
    let var_idx = find_column(&header_refs, &["var", "variance", "y"]);

    let id_idx = id_idx.ok_or_else(|| Error::StoreRead {
        collection: collection.to_string(),
        reason: format!("{}: could not find id column", path.display()),
    })?;

    let mut records = Vec::new();
    for (line_num, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::StoreRead {
            collection: collection.to_string(),
            reason: format!("{} line {}: {e}", path.display(), line_num + 2),
        })?;

        let id = record.get(id_idx).unwrap_or("").trim().to_string();
        if id.is_empty() {
            continue;
        }

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map_or(FieldValue::Missing, |s| FieldValue::Text(s.to_string()))
        };

        records.push(RawRecord {
            id,
            title: title_idx.and_then(|i| record.get(i)).map(String::from),
            mean: field(mean_idx),
            var: field(var_idx),
        });
    }

    Ok(records)
}

/// Find a header index by any of `names` (case-insensitive).
fn find_column(headers: &[&str], names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_column() {
        let headers = ["ID", "Title", "X", "Variance"];
        assert_eq!(find_column(&headers, &["id"]), Some(0));
        assert_eq!(find_column(&headers, &["mean", "x"]), Some(2));
        assert_eq!(find_column(&headers, &["var", "variance"]), Some(3));
        assert_eq!(find_column(&headers, &["unknown"]), None);
    }

    #[test]
    fn test_reads_json_collection() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("book_score.json"),
            r#"[{"id": "a", "title": "X", "mean": 0.5, "var": "0.5"}]"#,
        )
        .unwrap();

        let records = DirStore::new(dir.path()).read_collection("book_score").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].coerce(true).variance, 0.5);
    }

    #[test]
    fn test_reads_csv_collection_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("book_score.csv"),
            "id,title,mean,var\nb,Second,0.1,0.2\na,,0.3,oops\n,skipped,1,1\n",
        )
        .unwrap();

        let records = DirStore::new(dir.path()).read_collection("book_score").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "b");
        let second = records[1].coerce(true);
        assert_eq!(second.title, "No Title");
        assert_eq!(second.mean, 0.3);
        assert_eq!(second.variance, 0.0);
    }

    #[test]
    fn test_json_preferred_over_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("c.json"), r#"[{"id": "json"}]"#).unwrap();
        fs::write(dir.path().join("c.csv"), "id\ncsv\n").unwrap();

        let records = DirStore::new(dir.path()).read_collection("c").unwrap();
        assert_eq!(records[0].id, "json");
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirStore::new(dir.path()).read_collection("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let store = DirStore::new("/tmp");
        assert!(matches!(store.read_collection("../etc"), Err(Error::InvalidInput(_))));
        assert!(matches!(store.read_collection(""), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_one_bad_document_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("book_score.json"),
            r#"[
                {"id": "a", "title": "X", "mean": true, "var": 0.5},
                "not a document",
                {"id": "b", "title": 42, "mean": 0.4, "var": 0.4}
            ]"#,
        )
        .unwrap();

        let records = DirStore::new(dir.path()).get_all("book_score").await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(records[1].coerce(true).title, "42");
    }

    #[tokio::test]
    async fn test_malformed_json_is_store_read_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let err = DirStore::new(dir.path()).get_all("bad").await.unwrap_err();
        assert!(matches!(err, Error::StoreRead { .. }));
    }
}
