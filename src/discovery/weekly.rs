//! Weekly CSV directory source
//!
//! Each `*.csv` file holds the weekly rows of one page. The page URL is not
//! stored in the file; it is rebuilt from the file name, which is the page URL
//! with every separator flattened to `_`:
//!
//! `https_www_example_com_about-us_weekly_all_data.csv` → `https://www.example.com/about-us`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use tracing::{debug, info, warn};
use url::Url;

use crate::discovery::error::DiscoveryError;
use crate::discovery::metrics::{METRIC_FIELDS, has_positive_metric, text_metric};

const WEEKLY_SUFFIX: &str = "_weekly_all_data.csv";
const CSV_EXTENSION: &str = ".csv";

/// Collect URLs of every weekly file with at least one positive metric row.
///
/// A missing directory yields no URLs. A file that cannot be read is logged
/// and skipped.
pub fn urls_from_weekly_dir(
    dir: &Path,
    site_url: Option<&str>,
) -> Result<Vec<String>, DiscoveryError> {
    let files = list_csv_files(dir)?;
    if files.is_empty() {
        debug!("No weekly CSV files in {}", dir.display());
        return Ok(Vec::new());
    }

    let mut positive = Vec::new();
    for path in &files {
        match file_has_positive_row(path) {
            Ok(true) => match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => positive.push(name),
                None => warn!("Skipping weekly file with non UTF-8 name: {}", path.display()),
            },
            Ok(false) => debug!("No positive rows in {}", path.display()),
            Err(e) => warn!("{}", e),
        }
    }
    if positive.is_empty() {
        return Ok(Vec::new());
    }

    let site = parse_site_url(site_url, positive.len())?;
    let urls: Vec<String> = positive
        .into_iter()
        .map(|name| url_from_file_name(name, &site))
        .collect();

    info!(
        "Weekly source: {} of {} files have positive metrics",
        urls.len(),
        files.len()
    );
    Ok(urls)
}

/// Rebuild a page URL from a weekly file name
pub fn url_from_file_name(file_name: &str, site: &Url) -> String {
    let base = file_name
        .strip_suffix(WEEKLY_SUFFIX)
        .or_else(|| file_name.strip_suffix(CSV_EXTENSION))
        .unwrap_or(file_name);

    let prefix = site_prefix(site);
    let remainder = base.strip_prefix(prefix.as_str()).unwrap_or(base);
    let path = remainder.trim_start_matches('_').replace('_', "/");

    format!("{}/{}", site.origin().ascii_serialization(), path)
}

/// `https://www.example.com` → `https_www_example_com`
fn site_prefix(site: &Url) -> String {
    let host = site.host_str().unwrap_or_default().replace('.', "_");
    format!("{}_{}", site.scheme(), host)
}

fn parse_site_url(site_url: Option<&str>, candidates: usize) -> Result<Url, DiscoveryError> {
    let raw = site_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DiscoveryError::MissingSiteUrl { discarded: candidates })?;

    match Url::parse(raw) {
        Ok(url) if url.has_host() => Ok(url),
        _ => Err(DiscoveryError::InvalidSiteUrl(raw.to_string())),
    }
}

/// Sorted `*.csv` files directly inside `dir`
fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(DiscoveryError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_csv = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(CSV_EXTENSION));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_has_positive_row(path: &Path) -> Result<bool, DiscoveryError> {
    let csv_error = |source| DiscoveryError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let headers = reader.headers().map_err(csv_error)?.clone();
    let columns: Vec<(&str, usize)> = METRIC_FIELDS
        .iter()
        .filter_map(|field| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(field))
                .map(|index| (*field, index))
        })
        .collect();

    if columns.is_empty() {
        debug!("No metric columns in {}", path.display());
        return Ok(false);
    }

    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let positive = has_positive_metric(|field| {
            let cell = columns
                .iter()
                .find(|(name, _)| *name == field)
                .and_then(|(_, index)| record.get(*index));
            text_metric(cell)
        });
        if positive {
            return Ok(true);
        }
    }
    Ok(false)
}
