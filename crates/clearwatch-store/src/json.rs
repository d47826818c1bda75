//! JSON file stores: the durable recap tier and the scoring table directory.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use clearwatch_core::{KeywordSet, LoadError, TableProvider, WeightEntry, WeightTable};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::StoreError;
use crate::recap::{DurableCacheStore, RecapCacheEntry};

/// Recap cache persisted as a JSON array in a single file.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so a crash mid-write leaves the previous contents intact. A file
/// that no longer parses is moved to `<path>.corrupt-<timestamp>` before it
/// is replaced.
#[derive(Debug, Clone)]
pub struct JsonCacheStore {
    path: PathBuf,
}

impl JsonCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
        PathBuf::from(name)
    }
}

impl DurableCacheStore for JsonCacheStore {
    fn read_all(&self) -> Result<Vec<RecapCacheEntry>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no recap cache file yet");
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write_all(&self, entries: &[RecapCacheEntry]) -> Result<(), StoreError> {
        if let Err(StoreError::Json(e)) = self.read_all() {
            let backup = self.backup_path();
            std::fs::rename(&self.path, &backup)?;
            warn!(
                path = %self.path.display(),
                backup = %backup.display(),
                error = %e,
                "unreadable recap cache moved aside before replacing it"
            );
        }
        write_json_atomic(&self.path, entries)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub(crate) fn write_json_atomic<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[derive(Deserialize)]
struct WeightFile {
    #[serde(default)]
    default: Option<f64>,
    weights: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct KeywordFile {
    terms: Vec<String>,
}

/// Scoring tables stored as `<dir>/<name>.json`.
///
/// Weight files look like `{"default": 0.2, "weights": {"OR": 0.8}}`
/// (`default` optional); keyword files like `{"terms": ["robotic"]}`.
#[derive(Debug, Clone)]
pub struct JsonTableDir {
    dir: PathBuf,
}

impl JsonTableDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, LoadError> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(LoadError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|e| LoadError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl TableProvider for JsonTableDir {
    fn load_weight_table(&self, name: &str, default: f64) -> Result<WeightTable, LoadError> {
        let file: WeightFile = self.read(name)?;
        Ok(WeightTable::from_entries(
            name,
            file.default.unwrap_or(default),
            file.weights
                .into_iter()
                .map(|(code, weight)| WeightEntry { code, weight }),
        ))
    }

    fn load_keyword_set(&self, name: &str) -> Result<KeywordSet, LoadError> {
        let file: KeywordFile = self.read(name)?;
        Ok(KeywordSet::new(name, file.terms))
    }
}
