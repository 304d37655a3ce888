//! Bounded concurrent fetch + extract

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::harvest::error::FetchError;
use crate::harvest::extraction::extract_metadata;
use crate::harvest::fetcher::PageSource;
use crate::harvest::{FetchConfig, FetchResult};

/// Progress notification sent after each URL completes
#[derive(Debug, Clone)]
pub struct FetchProgress {
    /// Number of URLs finished so far, this one included
    pub completed: usize,

    /// Number of URLs in the batch
    pub total: usize,

    /// URL that just finished
    pub url: String,

    /// Whether the fetch itself succeeded
    pub ok: bool,
}

/// Fetch every URL and extract its metadata.
///
/// # Arguments
///
/// * `source` - Where pages come from
/// * `urls` - Normalized URLs to fetch
/// * `config` - Concurrency limit, timeout and progress interval
/// * `progress_sender` - Optional channel receiving one message per completion
///
/// # Returns
///
/// One `FetchResult` per input URL, in input order. A failure of any kind on
/// one URL becomes a failed result for that URL only.
#[instrument(skip_all, fields(urls = urls.len(), max_workers = config.max_workers))]
pub async fn fetch_all<S>(
    source: Arc<S>,
    urls: Vec<String>,
    config: &FetchConfig,
    progress_sender: Option<mpsc::Sender<FetchProgress>>,
) -> Vec<FetchResult>
where
    S: PageSource + 'static,
{
    let total = urls.len();
    info!("Fetching {} URLs with {} workers", total, config.max_workers);

    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
    let completed = Arc::new(AtomicUsize::new(0));
    let timeout = config.timeout;
    let progress_every = config.progress_every.max(1);

    let tasks = urls
        .iter()
        .cloned()
        .map(|url| {
            let permit = semaphore.clone().acquire_owned();
            let source = source.clone();
            let completed = completed.clone();
            let progress_sender = progress_sender.clone();

            tokio::spawn(async move {
                let _permit = permit.await;

                let result = fetch_one(source.as_ref(), &url, timeout).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if done % progress_every == 0 {
                    info!("Processed {}/{} URLs", done, total);
                }

                if let Some(sender) = progress_sender {
                    // Ignore errors from sending (e.g., if receiver is dropped)
                    let _ = sender
                        .send(FetchProgress {
                            completed: done,
                            total,
                            url: url.clone(),
                            ok: !result.is_failure(),
                        })
                        .await;
                }

                result
            })
        })
        .collect::<Vec<_>>();

    // Release our copy so the receiver sees the channel close.
    drop(progress_sender);

    let results = future::join_all(tasks).await;

    let results: Vec<FetchResult> = results
        .into_iter()
        .zip(urls)
        .map(|(joined, url)| match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("Fetch task for {} did not complete: {}", url, e);
                FetchResult::failed(url, FetchError::from(e))
            }
        })
        .collect();

    let failures = results.iter().filter(|r| r.is_failure()).count();
    info!(
        "Fetched {}/{} URLs ({} failed)",
        total - failures,
        total,
        failures
    );

    results
}

/// Fetch one URL, bounded by `timeout`, and extract its metadata
async fn fetch_one<S: PageSource>(
    source: &S,
    url: &str,
    timeout: std::time::Duration,
) -> FetchResult {
    let fetched = match tokio::time::timeout(timeout, source.fetch(url, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            url: url.to_string(),
            after: timeout,
        }),
    };

    match fetched {
        Ok(page) => {
            let metadata = extract_metadata(&page, url);
            debug!(url, ?metadata, "Extracted");
            FetchResult::fetched(url, metadata)
        }
        Err(e) => {
            warn!("Failed to fetch metadata for {}: {}", url, e);
            FetchResult::failed(url, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::FetchOutcome;
    use std::collections::HashMap;
    use std::future::Future;
    use std::time::{Duration, Instant};

    /// In-memory page source with per-URL behaviour
    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, String>,
        hang: Vec<String>,
        panic_on: Vec<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl FakeSource {
        fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl PageSource for FakeSource {
        fn fetch(
            &self,
            url: &str,
            _timeout: Duration,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            let url = url.to_string();
            async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);

                if self.hang.contains(&url) {
                    std::future::pending::<()>().await;
                }
                if self.panic_on.contains(&url) {
                    panic!("boom");
                }
                tokio::time::sleep(self.delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                self.pages
                    .get(&url)
                    .map(|html| html.as_bytes().to_vec())
                    .ok_or(FetchError::Status { url, status: 404 })
            }
        }
    }

    fn og(title: &str) -> String {
        format!(r#"<meta property="og:title" content="{}">"#, title)
    }

    #[tokio::test]
    async fn test_every_url_gets_a_result() {
        let source = FakeSource::default()
            .with_page("https://x.com/a", &og("A"))
            .with_page("https://x.com/b", "<p>nothing here</p>");
        let urls = vec![
            "https://x.com/a".to_string(),
            "https://x.com/b".to_string(),
            "https://x.com/missing".to_string(),
        ];

        let results = fetch_all(Arc::new(source), urls, &FetchConfig::default(), None).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].metadata.title.as_deref(), Some("A"));
        assert!(matches!(results[0].outcome, FetchOutcome::Extracted));
        assert!(matches!(results[1].outcome, FetchOutcome::Empty));
        assert!(matches!(
            results[2].outcome,
            FetchOutcome::Failed(FetchError::Status { status: 404, .. })
        ));
        assert!(results[2].metadata.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let mut source = FakeSource {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let urls: Vec<String> = (0..20).map(|i| format!("https://x.com/{}", i)).collect();
        for url in &urls {
            source = source.with_page(url, &og(url));
        }
        let source = Arc::new(source);
        let config = FetchConfig::builder().max_workers(3).build();

        let results = fetch_all(source.clone(), urls, &config, None).await;

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| !r.is_failure()));
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hanging_url_does_not_hold_up_others() {
        let source = FakeSource {
            hang: vec!["https://x.com/slow".to_string()],
            ..Default::default()
        }
        .with_page("https://x.com/fast", &og("Fast"));
        let urls = vec![
            "https://x.com/slow".to_string(),
            "https://x.com/fast".to_string(),
        ];
        let config = FetchConfig::builder()
            .timeout(Duration::from_millis(200))
            .build();

        let started = Instant::now();
        let results = fetch_all(Arc::new(source), urls, &config, None).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            results[0].outcome,
            FetchOutcome::Failed(FetchError::Timeout { .. })
        ));
        assert_eq!(results[1].metadata.title.as_deref(), Some("Fast"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let source = FakeSource {
            panic_on: vec!["https://x.com/bad".to_string()],
            ..Default::default()
        }
        .with_page("https://x.com/good", &og("Good"));
        let urls = vec![
            "https://x.com/bad".to_string(),
            "https://x.com/good".to_string(),
        ];

        let results = fetch_all(Arc::new(source), urls, &FetchConfig::default(), None).await;

        assert_eq!(results[0].url, "https://x.com/bad");
        assert!(matches!(
            results[0].outcome,
            FetchOutcome::Failed(FetchError::Task(_))
        ));
        assert_eq!(results[1].metadata.title.as_deref(), Some("Good"));
    }

    #[tokio::test]
    async fn test_progress_reported_per_completion() {
        let source = FakeSource::default()
            .with_page("https://x.com/a", &og("A"))
            .with_page("https://x.com/b", &og("B"));
        let urls = vec![
            "https://x.com/a".to_string(),
            "https://x.com/b".to_string(),
            "https://x.com/c".to_string(),
        ];
        let (tx, mut rx) = mpsc::channel(10);

        fetch_all(Arc::new(source), urls, &FetchConfig::default(), Some(tx)).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.total == 3));
        assert_eq!(events.iter().filter(|e| !e.ok).count(), 1);
        let mut completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
        completed.sort();
        assert_eq!(completed, vec![1, 2, 3]);
    }
}
