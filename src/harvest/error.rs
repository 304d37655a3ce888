//! Error types for the harvest module

use crate::error::Error as CrateError;
use std::time::Duration;
use thiserror::Error;

/// Error type for a single page fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP client error (connection refused, DNS, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within its budget
    #[error("Timed out after {after:?} fetching {url}")]
    Timeout {
        /// URL being fetched
        url: String,
        /// Budget that expired
        after: Duration,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status {
        /// URL being fetched
        url: String,
        /// Response status code
        status: u16,
    },

    /// The fetch task ended without producing a result
    #[error("Task error: {0}")]
    Task(String),
}

impl From<FetchError> for CrateError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Http(e) => CrateError::Http(e),
            _ => CrateError::Fetch(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(format!("Failed to join task: {}", err))
    }
}
