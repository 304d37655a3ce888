//! # og-harvest CLI Application
//!
//! Command-line front end for the harvesting pipeline: discovers URLs from an
//! analytics export, fetches their pages and writes the extracted Open Graph
//! metadata to a resumable JSON store.
//!
//! ## Features
//!
//! - Source selection between weekly CSV exports and a dashboard export
//! - Resume (default) or overwrite reconciliation with the existing store
//! - Configurable concurrency, timeout and request headers
//! - Progress bar for the fetch phase
//! - Optional log file and OTLP telemetry export

mod telemetry;

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use og_harvest::discovery::{
    DEFAULT_DASHBOARD_JSON, DEFAULT_WEEKLY_DIR, DiscoveryConfig, SourceMode,
};
use og_harvest::harvest::storage::DEFAULT_OUTPUT;
use og_harvest::harvest::{FetchConfig, FetchProgress, ResumeMode};
use og_harvest::pipeline::{self, PipelineConfig};
use og_harvest::Error;
use tokio::sync::mpsc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Harvest Open Graph titles and images for the pages in an analytics export", long_about = None)]
struct Cli {
    /// Which URL source to read (auto|weekly|dashboard)
    #[arg(long, default_value_t = SourceMode::Auto)]
    source: SourceMode,

    /// Directory of weekly CSV exports
    #[arg(long, default_value = DEFAULT_WEEKLY_DIR)]
    weekly_dir: PathBuf,

    /// Dashboard JSON export
    #[arg(long, default_value = DEFAULT_DASHBOARD_JSON)]
    dashboard_json: PathBuf,

    /// Site the weekly file names were derived from (e.g. https://www.example.com)
    #[arg(long, required_if_eq("source", "weekly"))]
    site_url: Option<String>,

    /// Output JSON store
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Number of concurrent fetches
    #[arg(short = 'w', long, default_value = "16")]
    max_workers: usize,

    /// Process at most this many URLs (0 for no limit)
    #[arg(short, long, default_value = "0")]
    limit: usize,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value = "15")]
    timeout: u64,

    /// Re-fetch every URL, even those with metadata already stored
    #[arg(long)]
    overwrite: bool,

    /// Do not advertise gzip/deflate support
    #[arg(long)]
    no_compression: bool,

    /// User agent for requests
    #[arg(long)]
    user_agent: Option<String>,

    /// Log a progress line every N completed URLs
    #[arg(long, default_value = "25")]
    progress_every: usize,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Export traces and metrics over OTLP/HTTP
    #[arg(long)]
    otlp: bool,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut discovery = DiscoveryConfig::builder()
            .mode(self.source)
            .weekly_dir(&self.weekly_dir)
            .dashboard_json(&self.dashboard_json);
        if let Some(site_url) = &self.site_url {
            discovery = discovery.site_url(site_url);
        }

        let mut fetch = FetchConfig::builder()
            .max_workers(self.max_workers)
            .timeout_secs(self.timeout)
            .accept_compressed(!self.no_compression)
            .progress_every(self.progress_every);
        if let Some(user_agent) = &self.user_agent {
            fetch = fetch.user_agent(user_agent);
        }

        let mode = if self.overwrite {
            ResumeMode::Overwrite
        } else {
            ResumeMode::Resume
        };

        PipelineConfig::builder()
            .discovery(discovery.build())
            .fetch(fetch.build())
            .output(&self.output)
            .limit(self.limit)
            .mode(mode)
            .build()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let _otel = telemetry::init_tracing_subscriber(cli.otlp, cli.log_file.as_deref())?;

    let config = cli.pipeline_config();

    // Create a channel for progress updates
    let (progress_sender, progress_receiver) = mpsc::channel(100);
    let progress_handle = tokio::spawn(show_progress(progress_receiver));

    let result = pipeline::run(&config, Some(progress_sender)).await;

    // Wait for progress task to complete (it will end when all senders are dropped)
    let _ = progress_handle.await;

    match result {
        Ok(summary) => {
            println!("Harvest completed");
            println!("{}", summary);
            Ok(())
        }
        Err(Error::NoUrlsDiscovered) => {
            error!("No URLs discovered; nothing written to {}", config.output.display());
            Err(anyhow!(Error::NoUrlsDiscovered))
        }
        Err(e) => Err(e.into()),
    }
}

/// Drive a progress bar from fetch completions
async fn show_progress(mut progress_receiver: mpsc::Receiver<FetchProgress>) {
    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    progress_bar.set_message("Fetching pages...");

    while let Some(progress) = progress_receiver.recv().await {
        progress_bar.set_length(progress.total as u64);
        progress_bar.inc(1);
        let status = if progress.ok { "fetched" } else { "failed" };
        progress_bar.set_message(format!("{} {}", status, progress.url));
    }

    if progress_bar.position() == 0 {
        progress_bar.finish_and_clear();
    } else {
        progress_bar.finish_with_message("Fetching completed");
    }
}
