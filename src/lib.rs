//! # og-harvest - Social Metadata Harvesting for Rust
//!
//! This crate discovers the pages listed in an analytics export, fetches them
//! concurrently and extracts their social-sharing metadata (Open Graph and
//! Twitter card title and preview image) into a resumable JSON store.
//!
//! ## Features
//!
//! - URL discovery from weekly CSV exports or a dashboard JSON export
//! - Canonical URL normalization and dedup
//! - Bounded concurrent fetching with per-request timeouts and gzip/deflate
//!   decoding
//! - Tolerant HTML metadata extraction with a fixed fallback chain
//! - Resume and overwrite modes with atomic snapshot writes
//! - Async API with Tokio
//! - Robust error handling and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use og_harvest::discovery::{DiscoveryConfig, SourceMode};
//! use og_harvest::harvest::{FetchConfig, ResumeMode};
//! use og_harvest::pipeline::{self, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .discovery(
//!             DiscoveryConfig::builder()
//!                 .mode(SourceMode::Dashboard)
//!                 .dashboard_json("dashboard_data.json")
//!                 .build(),
//!         )
//!         .fetch(FetchConfig::builder().max_workers(8).timeout_secs(10).build())
//!         .output("og_metadata.json")
//!         .mode(ResumeMode::Resume)
//!         .build();
//!
//!     let summary = pipeline::run(&config, None).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

mod error;

pub mod discovery;
pub mod harvest;
pub mod normalize;
pub mod pipeline;

pub use error::{Error, Result};
pub use normalize::normalize_url;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::discovery::{DiscoveryConfig, SourceMode};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::harvest::{FetchConfig, Metadata, ResumeMode};
    pub use crate::pipeline::{PipelineConfig, RunSummary};
}
