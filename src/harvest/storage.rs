use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::{io, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{FetchResult, Metadata};
use crate::error::Error as CrateError;
use crate::normalize::normalize_url;

/// Default location of the persisted store
pub const DEFAULT_OUTPUT: &str = "og_metadata.json";

/// How prior results are reconciled with the current target set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumeMode {
    /// Skip URLs that already have metadata
    #[default]
    Resume,

    /// Re-fetch every target URL
    Overwrite,
}

/// JSON representation of the store
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StoreDocument {
    pub items: Vec<StoredItem>,
}

/// JSON representation of a single store entry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    /// Normalized URL of the page
    pub url: String,

    /// Title of the page
    #[serde(default)]
    pub title: Option<String>,

    /// Preview image of the page
    #[serde(default)]
    pub image: Option<String>,
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized store layout: {0}")]
    UnrecognizedLayout(String),
}

impl From<StorageError> for CrateError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => CrateError::Io(e),
            StorageError::Json(e) => CrateError::Json(e),
            _ => CrateError::Storage(err.to_string()),
        }
    }
}

type Result<T> = std::result::Result<T, StorageError>;

/// Mapping from normalized URL to metadata, backed by a JSON file
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    entries: BTreeMap<String, Metadata>,
}

impl Store {
    /// Create an empty store that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store; an unreadable or malformed file
    /// is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !fs::try_exists(&path).await? {
            debug!("No existing store at {}", path.display());
            return Ok(Self::new(path));
        }

        let content = fs::read_to_string(&path).await?;
        let value: Value = serde_json::from_str(&content)?;
        let entries = parse_entries(value)?;

        Ok(Self { path, entries })
    }

    /// Open the store at `path`, degrading to an empty store on any error
    pub async fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path).await {
            Ok(store) => {
                if !store.is_empty() {
                    info!(
                        "Loaded {} existing entries from {}",
                        store.len(),
                        path.display()
                    );
                }
                store
            }
            Err(e) => {
                warn!("Failed to read existing output {}: {}", path.display(), e);
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata stored for a normalized URL
    pub fn get(&self, url: &str) -> Option<&Metadata> {
        self.entries.get(url)
    }

    /// Insert or replace one entry
    pub fn insert(&mut self, url: impl Into<String>, metadata: Metadata) {
        self.entries.insert(url.into(), metadata);
    }

    /// Whether `url` must be fetched under `mode`
    pub fn needs_fetch(&self, url: &str, mode: ResumeMode) -> bool {
        match mode {
            ResumeMode::Overwrite => true,
            ResumeMode::Resume => self.entries.get(url).is_none_or(Metadata::is_empty),
        }
    }

    /// Split target URLs into those to fetch and those to keep.
    ///
    /// Returns `(to_fetch, skipped)`, both in input order.
    pub fn partition(&self, urls: Vec<String>, mode: ResumeMode) -> (Vec<String>, Vec<String>) {
        urls.into_iter().partition(|url| self.needs_fetch(url, mode))
    }

    /// Overlay fetched results; a fresh result always replaces the stored one
    pub fn merge<I>(&mut self, results: I) -> usize
    where
        I: IntoIterator,
        I::Item: Borrow<FetchResult>,
    {
        let mut merged = 0;
        for result in results {
            let result: &FetchResult = result.borrow();
            self.entries
                .insert(result.url.clone(), result.metadata.clone());
            merged += 1;
        }
        merged
    }

    /// Snapshot of the store in its persisted form, ordered by URL
    pub fn to_document(&self) -> StoreDocument {
        StoreDocument {
            items: self
                .entries
                .iter()
                .map(|(url, metadata)| StoredItem {
                    url: url.clone(),
                    title: metadata.title.clone(),
                    image: metadata.image.clone(),
                })
                .collect(),
        }
    }

    /// Write the full snapshot, replacing any previous file
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.to_document())?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!("Wrote {} entries to {}", self.len(), self.path.display());
        Ok(())
    }
}

/// Read any of the accepted layouts into a normalized mapping:
/// `{"items": [...]}`, a bare list of items, or `{url: {title, image}}`.
fn parse_entries(value: Value) -> Result<BTreeMap<String, Metadata>> {
    let mut entries = BTreeMap::new();

    match value {
        Value::Object(mut map) if map.get("items").is_some_and(Value::is_array) => {
            if let Some(Value::Array(items)) = map.remove("items") {
                collect_items(items, &mut entries);
            }
        }
        Value::Object(map) => {
            for (url, meta) in map {
                let metadata = match meta {
                    Value::Object(fields) => Metadata::new(
                        string_field(fields.get("title")),
                        string_field(fields.get("image")),
                    ),
                    Value::Null => Metadata::default(),
                    other => {
                        debug!("Skipping entry {} with unexpected value {}", url, other);
                        continue;
                    }
                };
                entries.insert(normalize_url(&url), metadata);
            }
        }
        Value::Array(items) => collect_items(items, &mut entries),
        other => {
            return Err(StorageError::UnrecognizedLayout(format!(
                "expected an object or a list, found {}",
                json_kind(&other)
            )));
        }
    }

    Ok(entries)
}

fn collect_items(items: Vec<Value>, entries: &mut BTreeMap<String, Metadata>) {
    for item in items {
        match serde_json::from_value::<StoredItem>(item) {
            Ok(item) if !item.url.trim().is_empty() => {
                entries.insert(
                    normalize_url(&item.url),
                    Metadata::new(item.title, item.image),
                );
            }
            Ok(_) => debug!("Skipping item without URL"),
            Err(e) => debug!("Skipping malformed item: {}", e),
        }
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
