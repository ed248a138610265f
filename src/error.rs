//! Error types for image2vec operations.

use thiserror::Error;

/// Result type alias for image2vec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fingerprinting images or querying a collection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An argument was outside the accepted domain.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The image cannot be processed (zero size, truncated buffer).
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Failed to decode encoded image bytes.
    #[error("Decode failed ({format}): {reason}")]
    Decode {
        /// Container format that was being decoded.
        format: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The feature-extraction model could not be loaded.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// The model was loaded but inference failed.
    #[error("Model prediction failed: {0}")]
    Model(String),

    /// Reading a collection from the store failed.
    #[error("Store read failed for collection '{collection}': {reason}")]
    StoreRead {
        /// Collection that was being read.
        collection: String,
        /// Reason for the failure.
        reason: String,
    },

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether this error should reach the caller instead of degrading to a
    /// zero-filled result.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelLoad(_))
    }
}
