//! Data directory layout and the optional `clearwatch.json` settings file.
//!
//! Values resolve as: command-line flag, then environment variable (both via
//! clap), then the settings file, then compiled defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clearwatch_ai::EnricherConfig;
use clearwatch_core::ScoringConfig;
use clearwatch_core::guard::DEFAULT_GRACE_DAYS;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SETTINGS_FILE: &str = "clearwatch.json";

/// Contents of `<data_dir>/clearwatch.json`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scoring: ScoringConfig,
    /// Users allowed to force a full run and trigger enrichment.
    pub privileged_users: Vec<String>,
    pub grace_days: u32,
    pub enrichment: EnricherConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            privileged_users: Vec::new(),
            grace_days: DEFAULT_GRACE_DAYS,
            enrichment: EnricherConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `data_dir`, or defaults when the file is absent.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn is_privileged(&self, user: Option<&str>) -> bool {
        let Some(user) = user.map(str::trim).filter(|u| !u.is_empty()) else {
            return false;
        };
        self.privileged_users
            .iter()
            .any(|p| p.trim().eq_ignore_ascii_case(user))
    }
}

/// Fixed file layout under the data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> PathBuf {
        self.root.join("records.json")
    }

    pub fn tables(&self) -> PathBuf {
        self.root.join("tables")
    }

    pub fn recap_cache(&self) -> PathBuf {
        self.root.join("recap_cache.json")
    }

    pub fn results(&self) -> PathBuf {
        self.root.join("results").join("scored.parquet")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }
}
