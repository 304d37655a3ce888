//! # Fetch Configuration Module
//!
//! Settings for the page fetcher and the orchestrator that drives it, with a
//! builder in the same shape as the other configuration types of the crate.
//!
//! - `max_workers`: upper bound on fetches in flight at once
//! - `timeout`: budget for one whole request (connect, headers and body)
//! - `user_agent`: browser-like identification sent with every request
//! - `accept_compressed`: advertise gzip/deflate transfer encodings
//! - `progress_every`: log a progress line after this many completions

use std::time::Duration;

/// Default number of concurrent fetches
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default progress log interval
pub const DEFAULT_PROGRESS_EVERY: usize = 25;

/// Desktop Safari identification; many sites only emit OG tags for browsers
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

/// `Accept` header preferring HTML documents
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Configuration for fetching pages
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum number of fetches in flight
    pub max_workers: usize,

    /// Budget for a single request
    pub timeout: Duration,

    /// User agent to use for requests
    pub user_agent: String,

    /// Whether to send `Accept-Encoding: gzip, deflate`
    pub accept_compressed: bool,

    /// Emit a progress log line every N completions
    pub progress_every: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_compressed: true,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Builder for FetchConfig
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: FetchConfig::default(),
        }
    }

    /// Set the maximum number of concurrent fetches (at least 1)
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers.max(1);
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the per-request timeout in seconds
    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set whether compressed transfer encodings are advertised
    pub fn accept_compressed(mut self, accept_compressed: bool) -> Self {
        self.config.accept_compressed = accept_compressed;
        self
    }

    /// Set the progress log interval (at least 1)
    pub fn progress_every(mut self, progress_every: usize) -> Self {
        self.config.progress_every = progress_every.max(1);
        self
    }

    /// Build the configuration
    pub fn build(self) -> FetchConfig {
        self.config
    }
}

impl FetchConfig {
    /// Create a new builder
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::new()
    }
}
