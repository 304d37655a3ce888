//! Error types for the discovery module

use std::path::PathBuf;
use thiserror::Error;

/// Error type for reading a URL source
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Reading a file or directory failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV file could not be parsed
    #[error("Failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A JSON document could not be parsed
    #[error("Failed to parse JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The weekly source needs a site URL to rebuild page URLs
    #[error("No site URL configured; {discarded} weekly CSV candidates discarded")]
    MissingSiteUrl {
        /// Files with positive metrics that could not become URLs
        discarded: usize,
    },

    /// The configured site URL is not an absolute URL
    #[error("Invalid site URL: {0}")]
    InvalidSiteUrl(String),
}
