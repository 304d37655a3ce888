//! # Pipeline Module
//!
//! One harvesting run from discovery to the persisted snapshot:
//!
//! 1. discover candidate URLs from the configured sources
//! 2. normalize and dedup them, then apply the optional limit
//! 3. load the prior store and split targets into skipped and to-fetch
//! 4. fetch and extract concurrently
//! 5. merge the results and write the snapshot

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::discovery::{DiscoveryConfig, discover_urls};
use crate::error::{Error, Result};
use crate::harvest::storage::DEFAULT_OUTPUT;
use crate::harvest::{
    FetchConfig, FetchOutcome, FetchProgress, PageFetcher, PageSource, ResumeMode, Store,
    fetch_all,
};
use crate::normalize::normalize_unique;

/// Configuration for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where candidate URLs come from
    pub discovery: DiscoveryConfig,

    /// How pages are fetched
    pub fetch: FetchConfig,

    /// Store location
    pub output: PathBuf,

    /// Process at most this many URLs after dedup
    pub limit: Option<usize>,

    /// Resume or overwrite
    pub mode: ResumeMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            fetch: FetchConfig::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            limit: None,
            mode: ResumeMode::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Set the discovery configuration
    pub fn discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.config.discovery = discovery;
        self
    }

    /// Set the fetch configuration
    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.config.fetch = fetch;
        self
    }

    /// Set the store location
    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.config.output = output.into();
        self
    }

    /// Limit the number of URLs processed; 0 means no limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = (limit > 0).then_some(limit);
        self
    }

    /// Set the resume mode
    pub fn mode(mut self, mode: ResumeMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// Counters describing a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Raw candidates emitted by the sources
    pub discovered: usize,

    /// Distinct normalized URLs, after the limit
    pub unique: usize,

    /// URLs kept from the prior store without fetching
    pub skipped: usize,

    /// URLs fetched this run
    pub fetched: usize,

    /// Fetched URLs with at least a title or an image
    pub extracted: usize,

    /// Fetched URLs with no metadata on the page
    pub empty: usize,

    /// URLs whose fetch failed
    pub failed: usize,

    /// Entries in the written snapshot
    pub written: usize,

    /// Wall time of the run
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discovered: {} ({} unique)", self.discovered, self.unique)?;
        writeln!(f, "Skipped:    {}", self.skipped)?;
        writeln!(
            f,
            "Fetched:    {} ({} with metadata, {} empty, {} failed)",
            self.fetched, self.extracted, self.empty, self.failed
        )?;
        writeln!(f, "Written:    {}", self.written)?;
        write!(f, "Elapsed:    {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Run the pipeline with the production HTTP fetcher
pub async fn run(
    config: &PipelineConfig,
    progress_sender: Option<mpsc::Sender<FetchProgress>>,
) -> Result<RunSummary> {
    let fetcher = PageFetcher::new(config.fetch.clone())?;
    run_with_source(config, Arc::new(fetcher), progress_sender).await
}

/// Run the pipeline against any page source.
///
/// Fails with [`Error::NoUrlsDiscovered`] when the sources yield nothing, in
/// which case the store is left untouched.
#[instrument(skip_all, fields(output = %config.output.display(), mode = ?config.mode))]
pub async fn run_with_source<S>(
    config: &PipelineConfig,
    source: Arc<S>,
    progress_sender: Option<mpsc::Sender<FetchProgress>>,
) -> Result<RunSummary>
where
    S: PageSource + 'static,
{
    let started = Instant::now();

    let candidates = discover_urls(&config.discovery);
    let discovered = candidates.len();

    let mut urls = normalize_unique(candidates);
    if urls.is_empty() {
        return Err(Error::NoUrlsDiscovered);
    }
    if let Some(limit) = config.limit {
        urls.truncate(limit);
    }
    info!("{} unique URLs after normalization", urls.len());
    let unique = urls.len();

    let mut store = Store::load_or_default(&config.output).await;
    let (to_fetch, skipped) = store.partition(urls, config.mode);
    info!(
        "{} URLs to fetch, {} already have metadata",
        to_fetch.len(),
        skipped.len()
    );

    let results = if to_fetch.is_empty() {
        Vec::new()
    } else {
        fetch_all(source, to_fetch, &config.fetch, progress_sender).await
    };

    let mut summary = RunSummary {
        discovered,
        unique,
        skipped: skipped.len(),
        fetched: results.len(),
        ..Default::default()
    };
    for result in &results {
        match result.outcome {
            FetchOutcome::Extracted => summary.extracted += 1,
            FetchOutcome::Empty => summary.empty += 1,
            FetchOutcome::Failed(_) => summary.failed += 1,
        }
    }

    store.merge(&results);
    store.save().await?;
    summary.written = store.len();
    summary.elapsed = started.elapsed();

    info!(
        "Wrote {} entries to {} in {:.1}s",
        summary.written,
        config.output.display(),
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceMode;
    use crate::harvest::{FetchError, Metadata};
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves fixed pages and records which URLs were requested
    #[derive(Default)]
    struct MapSource {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MapSource {
        fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            let mut urls = self.requested.lock().unwrap().clone();
            urls.sort();
            urls
        }
    }

    impl PageSource for MapSource {
        fn fetch(
            &self,
            url: &str,
            _timeout: Duration,
        ) -> impl Future<Output = std::result::Result<Vec<u8>, FetchError>> + Send {
            self.requested.lock().unwrap().push(url.to_string());
            let page = self
                .pages
                .get(url)
                .map(|html| html.as_bytes().to_vec())
                .ok_or(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            async move { page }
        }
    }

    fn og_page(title: &str, image: &str) -> String {
        format!(
            r#"<html><head><meta property="og:title" content="{}"><meta property="og:image" content="{}"></head></html>"#,
            title, image
        )
    }

    fn config(dir: &TempDir, dashboard: &str) -> PipelineConfig {
        let dashboard_path = dir.path().join("dashboard.json");
        std::fs::write(&dashboard_path, dashboard).unwrap();

        PipelineConfig::builder()
            .discovery(
                DiscoveryConfig::builder()
                    .mode(SourceMode::Dashboard)
                    .dashboard_json(dashboard_path)
                    .build(),
            )
            .output(dir.path().join("out").join("og_metadata.json"))
            .build()
    }

    const DASHBOARD: &str = r#"{"url_data": {
        "https://x.com/a/": [{"clicks": 3}],
        "https://x.com/a?ref=nav": [{"impressions": 10}],
        "https://x.com/b": [{"ctr": "2%"}],
        "https://x.com/c": [{"position": 4}],
        "https://x.com/quiet": [{"clicks": 0}]
    }}"#;

    fn source() -> MapSource {
        MapSource::default()
            .with_page("https://x.com/a", &og_page("A", "/a.png"))
            .with_page("https://x.com/b", "<html><body>no tags</body></html>")
    }

    #[tokio::test]
    async fn test_fresh_run_writes_every_url() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, DASHBOARD);
        let source = Arc::new(source());

        let summary = run_with_source(&config, source.clone(), None).await.unwrap();

        assert_eq!(summary.discovered, 4);
        assert_eq!(summary.unique, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.extracted, 1);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.written, 3);

        let store = Store::open(&config.output).await.unwrap();
        assert_eq!(
            store.get("https://x.com/a"),
            Some(&Metadata::new(
                Some("A".to_string()),
                Some("https://x.com/a.png".to_string())
            ))
        );
        assert_eq!(store.get("https://x.com/c"), Some(&Metadata::default()));
    }

    #[tokio::test]
    async fn test_resume_skips_urls_with_metadata() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, DASHBOARD);
        run_with_source(&config, Arc::new(source()), None)
            .await
            .unwrap();

        let second = Arc::new(source());
        let summary = run_with_source(&config, second.clone(), None).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(
            second.requested(),
            vec!["https://x.com/b", "https://x.com/c"]
        );
        assert_eq!(summary.written, 3);
    }

    #[tokio::test]
    async fn test_overwrite_refetches_and_replaces() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, DASHBOARD);

        let mut prior = Store::new(&config.output);
        prior.insert(
            "https://x.com/a",
            Metadata::new(Some("Old".to_string()), None),
        );
        prior.insert(
            "https://x.com/retired",
            Metadata::new(Some("Gone".to_string()), None),
        );
        prior.save().await.unwrap();

        config.mode = ResumeMode::Overwrite;
        let source = Arc::new(source());
        let summary = run_with_source(&config, source.clone(), None).await.unwrap();

        assert_eq!(summary.skipped, 0);
        assert_eq!(source.requested().len(), 3);

        let store = Store::open(&config.output).await.unwrap();
        assert_eq!(
            store.get("https://x.com/a").and_then(|m| m.title.as_deref()),
            Some("A")
        );
        assert!(store.get("https://x.com/retired").is_some());
        assert_eq!(summary.written, 4);
    }

    #[tokio::test]
    async fn test_limit_applies_after_dedup() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, DASHBOARD);
        config.limit = Some(2);

        let summary = run_with_source(&config, Arc::new(source()), None)
            .await
            .unwrap();

        assert_eq!(summary.unique, 2);
        assert_eq!(summary.written, 2);
    }

    #[tokio::test]
    async fn test_no_urls_is_fatal_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, r#"{"url_data": {"https://x.com/a": [{"clicks": 0}]}}"#);

        let err = run_with_source(&config, Arc::new(MapSource::default()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoUrlsDiscovered));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_builder_limit_zero_means_unlimited() {
        assert_eq!(PipelineConfig::builder().limit(0).build().limit, None);
        assert_eq!(PipelineConfig::builder().limit(5).build().limit, Some(5));
    }
}
