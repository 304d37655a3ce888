//! # Metadata Harvesting Module
//!
//! This module fetches pages and extracts their social-sharing metadata
//! (Open Graph and Twitter card title and preview image), then merges the
//! results into a resumable on-disk store.
//!
//! ## Key Components
//!
//! - `FetchConfig`: Concurrency, timeout and request header settings
//! - `PageSource` / `PageFetcher`: Single bounded-time page retrieval
//! - `extract_metadata`: Tolerant HTML inspection with a fixed fallback chain
//! - `fetch_all`: Bounded fan-out of fetch + extract over many URLs
//! - `Store`: Resume/overwrite reconciliation and snapshot persistence
//!
//! Per-URL failures are contained: a URL that cannot be fetched yields a
//! `FetchResult` with empty metadata and a `FetchOutcome::Failed` marker, and
//! never affects its neighbours.

mod config;
mod error;
mod extraction;
mod fetcher;
mod orchestrator;
pub mod storage;

pub use config::{FetchConfig, FetchConfigBuilder};
pub use error::FetchError;
pub use extraction::{decode_page, extract_metadata};
pub use fetcher::{PageFetcher, PageSource};
pub use orchestrator::{FetchProgress, fetch_all};
pub use storage::{ResumeMode, Store, StorageError};

use serde::{Deserialize, Serialize};

/// Social-sharing metadata for a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Title of the page
    pub title: Option<String>,

    /// Absolute URL of the preview image
    pub image: Option<String>,
}

impl Metadata {
    /// Build metadata, treating blank strings as absent
    pub fn new(title: Option<String>, image: Option<String>) -> Self {
        Self {
            title: non_blank(title),
            image: non_blank(image),
        }
    }

    /// Whether neither a title nor an image is present
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.image.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// How a single fetch attempt ended
#[derive(Debug)]
pub enum FetchOutcome {
    /// Page fetched and at least one metadata field found
    Extracted,

    /// Page fetched but no metadata found
    Empty,

    /// Fetch failed; metadata is empty
    Failed(FetchError),
}

/// Result of fetching and extracting one URL
#[derive(Debug)]
pub struct FetchResult {
    /// Normalized URL of the page
    pub url: String,

    /// Extracted metadata, empty on failure
    pub metadata: Metadata,

    /// Outcome of the attempt
    pub outcome: FetchOutcome,
}

impl FetchResult {
    /// Result for a page that was fetched and inspected
    pub fn fetched(url: impl Into<String>, metadata: Metadata) -> Self {
        let outcome = if metadata.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Extracted
        };
        Self {
            url: url.into(),
            metadata,
            outcome,
        }
    }

    /// Result for a page that could not be fetched
    pub fn failed(url: impl Into<String>, error: FetchError) -> Self {
        Self {
            url: url.into(),
            metadata: Metadata::default(),
            outcome: FetchOutcome::Failed(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Failed(_))
    }
}
