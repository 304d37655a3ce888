//! Dashboard JSON source

use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::discovery::error::DiscoveryError;
use crate::discovery::metrics::json_row_has_positive_metric;

/// Collect URLs from the `url_data` map of a dashboard export.
///
/// The document looks like `{"url_data": {"<url>": [row, ...]}}`. A URL is
/// kept when any of its rows has a positive metric. A missing file yields no
/// URLs; entries whose rows are not a list are ignored.
pub fn urls_from_dashboard(path: &Path) -> Result<Vec<String>, DiscoveryError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Dashboard file {} not found", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(DiscoveryError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let document: Value =
        serde_json::from_str(&contents).map_err(|source| DiscoveryError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(url_data) = document.get("url_data").and_then(Value::as_object) else {
        debug!("No url_data object in {}", path.display());
        return Ok(Vec::new());
    };

    let urls: Vec<String> = url_data
        .iter()
        .filter(|(_, rows)| {
            rows.as_array()
                .is_some_and(|rows| rows.iter().any(json_row_has_positive_metric))
        })
        .map(|(url, _)| url.clone())
        .collect();

    info!(
        "Dashboard source: {} of {} URLs have positive metrics",
        urls.len(),
        url_data.len()
    );
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(dir: &TempDir, value: &Value) -> std::path::PathBuf {
        let path = dir.path().join("dashboard_data.json");
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_positive_urls_selected() {
        let dir = TempDir::new().unwrap();
        let path = write_json(
            &dir,
            &json!({
                "summary": {"total": 3},
                "url_data": {
                    "https://x.com/a": [{"clicks": 0, "impressions": 0}, {"clicks": "2"}],
                    "https://x.com/b": [{"clicks": 0, "ctr": "0%"}],
                    "https://x.com/c": [{"ctr": "3.1%"}],
                    "https://x.com/d": {"clicks": 5},
                    "https://x.com/e": []
                }
            }),
        );

        let mut urls = urls_from_dashboard(&path).unwrap();
        urls.sort();

        assert_eq!(urls, vec!["https://x.com/a", "https://x.com/c"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let urls = urls_from_dashboard(&dir.path().join("missing.json")).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn test_missing_url_data_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_json(&dir, &json!({"other": 1}));
        assert!(urls_from_dashboard(&path).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashboard_data.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            urls_from_dashboard(&path),
            Err(DiscoveryError::Json { .. })
        ));
    }
}
