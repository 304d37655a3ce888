//! HTTP page retrieval
//!
//! `PageSource` is the seam between the orchestrator and the network;
//! `PageFetcher` is the reqwest-backed implementation used in production.

use std::future::Future;
use std::io::Read;
use std::time::Duration;

use flate2::read::{GzDecoder, ZlibDecoder};
use reqwest::Client as ReqwestClient;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::harvest::config::ACCEPT_HTML;
use crate::harvest::error::FetchError;
use crate::harvest::FetchConfig;

/// Anything that can retrieve the raw bytes of a page
pub trait PageSource: Send + Sync {
    /// Fetch a page, bounded by `timeout`
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Page fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct PageFetcher {
    /// The underlying reqwest client
    client: ReqwestClient,
}

impl PageFetcher {
    /// Create a new fetcher
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if config.accept_compressed {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        }

        let client = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let body = response.bytes().await?;
        debug!("Received {} bytes from {}", body.len(), url);

        Ok(decode_content(body.to_vec(), &encoding, url))
    }
}

impl PageSource for PageFetcher {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        self.get(url, timeout).await.map_err(|err| match err {
            FetchError::Http(e) if e.is_timeout() => FetchError::Timeout {
                url: url.to_string(),
                after: timeout,
            },
            other => other,
        })
    }
}

/// Undo a gzip or deflate content encoding.
///
/// A body that fails to decompress is passed through untouched.
fn decode_content(body: Vec<u8>, encoding: &str, url: &str) -> Vec<u8> {
    let decoded = if encoding.contains("gzip") {
        read_all(GzDecoder::new(body.as_slice()))
    } else if encoding.contains("deflate") {
        read_all(ZlibDecoder::new(body.as_slice()))
    } else {
        return body;
    };

    match decoded {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to decompress {} body from {}: {}", encoding, url, e);
            body
        }
    }
}

fn read_all(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}
