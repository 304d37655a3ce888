//! Error types for the og-harvest crate

use thiserror::Error;

/// Result type for og-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for og-harvest operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Page fetch error
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Store persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// No source produced a single candidate URL
    #[error("No URLs discovered from data sources")]
    NoUrlsDiscovered,
}
