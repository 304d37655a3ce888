//! # URL Discovery Module
//!
//! Reads analytics exports and emits the candidate URLs worth harvesting. A
//! URL qualifies when any of its rows reports a positive `clicks`,
//! `impressions`, `ctr` or `position`.
//!
//! Two sources are supported:
//!
//! - a directory of weekly CSV files, one file per page
//! - a dashboard JSON export with a `url_data` map
//!
//! Sources emit raw candidates; normalization and dedup happen downstream.
//! A source that cannot be read is logged and treated as empty.

mod dashboard;
mod error;
mod metrics;
mod weekly;

pub use dashboard::urls_from_dashboard;
pub use error::DiscoveryError;
pub use metrics::{METRIC_FIELDS, parse_metric};
pub use weekly::{url_from_file_name, urls_from_weekly_dir};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, instrument, warn};

/// Default weekly CSV directory
pub const DEFAULT_WEEKLY_DIR: &str = "Data/weekly_data_output/aggregated";

/// Default dashboard export
pub const DEFAULT_DASHBOARD_JSON: &str = "dashboard_data.json";

/// Which sources to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceMode {
    /// Weekly directory first, dashboard only when weekly yields nothing
    #[default]
    Auto,
    /// Weekly directory only
    Weekly,
    /// Dashboard export only
    Dashboard,
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "weekly" => Ok(Self::Weekly),
            "dashboard" => Ok(Self::Dashboard),
            other => Err(format!(
                "unknown source '{}', expected auto, weekly or dashboard",
                other
            )),
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Weekly => "weekly",
            Self::Dashboard => "dashboard",
        };
        f.write_str(name)
    }
}

/// Configuration for URL discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Which sources to read
    pub mode: SourceMode,

    /// Directory of weekly CSV files
    pub weekly_dir: PathBuf,

    /// Dashboard JSON export
    pub dashboard_json: PathBuf,

    /// Site the weekly file names were derived from
    pub site_url: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::default(),
            weekly_dir: PathBuf::from(DEFAULT_WEEKLY_DIR),
            dashboard_json: PathBuf::from(DEFAULT_DASHBOARD_JSON),
            site_url: None,
        }
    }
}

impl DiscoveryConfig {
    /// Create a new builder
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::new()
    }
}

/// Builder for DiscoveryConfig
#[derive(Debug, Default)]
pub struct DiscoveryConfigBuilder {
    config: DiscoveryConfig,
}

impl DiscoveryConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DiscoveryConfig::default(),
        }
    }

    /// Set the source mode
    pub fn mode(mut self, mode: SourceMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the weekly CSV directory
    pub fn weekly_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.weekly_dir = dir.into();
        self
    }

    /// Set the dashboard export path
    pub fn dashboard_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dashboard_json = path.into();
        self
    }

    /// Set the site URL used to rebuild weekly page URLs
    pub fn site_url(mut self, site_url: impl Into<String>) -> Self {
        self.config.site_url = Some(site_url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> DiscoveryConfig {
        self.config
    }
}

/// Discover candidate URLs according to `config.mode`.
///
/// Never fails: unreadable sources are logged and contribute nothing.
#[instrument(skip_all, fields(mode = %config.mode))]
pub fn discover_urls(config: &DiscoveryConfig) -> Vec<String> {
    let urls = match config.mode {
        SourceMode::Weekly => weekly_or_empty(config),
        SourceMode::Dashboard => dashboard_or_empty(config),
        SourceMode::Auto => {
            let weekly = weekly_or_empty(config);
            if weekly.is_empty() {
                dashboard_or_empty(config)
            } else {
                weekly
            }
        }
    };

    info!("Discovered {} candidate URLs", urls.len());
    urls
}

fn weekly_or_empty(config: &DiscoveryConfig) -> Vec<String> {
    urls_from_weekly_dir(&config.weekly_dir, config.site_url.as_deref()).unwrap_or_else(|e| {
        warn!(
            "Skipping weekly source {}: {}",
            config.weekly_dir.display(),
            e
        );
        Vec::new()
    })
}

fn dashboard_or_empty(config: &DiscoveryConfig) -> Vec<String> {
    urls_from_dashboard(&config.dashboard_json).unwrap_or_else(|e| {
        warn!(
            "Skipping dashboard source {}: {}",
            config.dashboard_json.display(),
            e
        );
        Vec::new()
    })
}
