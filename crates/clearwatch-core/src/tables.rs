//! Weight tables and keyword sets consumed by the scoring engine.
//!
//! Both are loaded once per run through a [`TableProvider`] and are
//! immutable while records are scored. [`ScoringTables::load`] applies the
//! required/optional policy: a missing advisory-committee table,
//! submission-type table or high-value keyword set aborts the run, the
//! others degrade to empty.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;

/// Table names understood by [`ScoringTables::load`].
pub mod names {
    pub const ADVISORY_COMMITTEE: &str = "advisory_committee";
    pub const PRODUCT_CODE: &str = "product_code";
    pub const SUBMISSION_TYPE: &str = "submission_type";
    pub const HIGH_VALUE: &str = "high_value";
    pub const COSMETIC: &str = "cosmetic";
    pub const DIAGNOSTIC: &str = "diagnostic";
    pub const THERAPEUTIC: &str = "therapeutic";
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("table not found: {0}")]
    NotFound(String),

    #[error("table {name} is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("io error reading table: {0}")]
    Io(#[from] std::io::Error),
}

/// A required table could not be loaded. Scoring must not start.
#[derive(Debug, Error)]
#[error("required table {table} failed to load: {source}")]
pub struct FatalLoadError {
    pub table: String,
    #[source]
    pub source: LoadError,
}

/// Supplies weight tables and keyword sets by name.
pub trait TableProvider {
    /// Load a weight table. `default` is the fallback weight unless the
    /// stored table carries its own.
    fn load_weight_table(&self, name: &str, default: f64) -> Result<WeightTable, LoadError>;

    fn load_keyword_set(&self, name: &str) -> Result<KeywordSet, LoadError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub code: String,
    pub weight: f64,
}

/// Code → weight lookup with a table-level fallback.
///
/// Codes are compared trimmed and upper-cased. Inserting a code twice keeps
/// the last weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    name: String,
    default: f64,
    weights: HashMap<String, f64>,
}

impl WeightTable {
    pub fn new(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            default,
            weights: HashMap::new(),
        }
    }

    pub fn from_entries(
        name: impl Into<String>,
        default: f64,
        entries: impl IntoIterator<Item = WeightEntry>,
    ) -> Self {
        let mut table = Self::new(name, default);
        for entry in entries {
            table.insert(&entry.code, entry.weight);
        }
        table
    }

    pub fn insert(&mut self, code: &str, weight: f64) {
        self.weights.insert(normalize_code(code), weight);
    }

    /// Weight for `code`, or the table default when the code is absent,
    /// blank, or unknown.
    pub fn get_or_default(&self, code: Option<&str>) -> f64 {
        code.map(normalize_code)
            .and_then(|c| self.weights.get(&c).copied())
            .unwrap_or(self.default)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_weight(&self) -> f64 {
        self.default
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Named set of case-insensitive terms, matched as substrings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeywordSet {
    name: String,
    terms: BTreeSet<String>,
}

impl KeywordSet {
    pub fn new<I, S>(name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            name: name.into(),
            terms,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: BTreeSet::new(),
        }
    }

    /// Whether any term occurs anywhere in `text`, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// The first term (in sorted order) found in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        if self.terms.is_empty() {
            return None;
        }
        let haystack = text.to_lowercase();
        self.terms
            .iter()
            .find(|term| haystack.contains(term.as_str()))
            .map(String::as_str)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Everything the scoring engine looks up, loaded once per run.
#[derive(Debug, Clone)]
pub struct ScoringTables {
    pub advisory_committee: WeightTable,
    pub product_code: WeightTable,
    pub submission_type: WeightTable,
    pub high_value: KeywordSet,
    pub cosmetic: KeywordSet,
    pub diagnostic: KeywordSet,
    pub therapeutic: KeywordSet,
}

/// Table counts after a load, for the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablesSummary {
    pub advisory_committee: usize,
    pub product_code: usize,
    pub submission_type: usize,
    pub high_value: usize,
    pub cosmetic: usize,
    pub diagnostic: usize,
    pub therapeutic: usize,
}

impl ScoringTables {
    /// Load every table, failing only when a required one is unavailable.
    pub fn load(
        provider: &dyn TableProvider,
        config: &ScoringConfig,
    ) -> Result<Self, FatalLoadError> {
        let advisory_committee =
            load_required_weights(provider, names::ADVISORY_COMMITTEE, config.ac_default)?;
        let submission_type = load_required_weights(
            provider,
            names::SUBMISSION_TYPE,
            config.submission_type_default,
        )?;
        let high_value = provider
            .load_keyword_set(names::HIGH_VALUE)
            .map_err(|source| FatalLoadError {
                table: names::HIGH_VALUE.to_string(),
                source,
            })?;
        debug!(table = high_value.name(), terms = high_value.len(), "loaded keyword set");

        let product_code = provider
            .load_weight_table(names::PRODUCT_CODE, config.pc_default)
            .unwrap_or_else(|e| {
                warn!(table = names::PRODUCT_CODE, error = %e, "optional table unavailable, using defaults");
                WeightTable::new(names::PRODUCT_CODE, config.pc_default)
            });

        let tables = Self {
            advisory_committee,
            product_code,
            submission_type,
            high_value,
            cosmetic: load_optional_keywords(provider, names::COSMETIC),
            diagnostic: load_optional_keywords(provider, names::DIAGNOSTIC),
            therapeutic: load_optional_keywords(provider, names::THERAPEUTIC),
        };

        let s = tables.summary();
        info!(
            ac = s.advisory_committee,
            pc = s.product_code,
            submission_type = s.submission_type,
            high_value = s.high_value,
            cosmetic = s.cosmetic,
            diagnostic = s.diagnostic,
            therapeutic = s.therapeutic,
            "loaded scoring tables"
        );
        Ok(tables)
    }

    /// Tables with only defaults and no keywords. Mostly useful in tests.
    pub fn empty(config: &ScoringConfig) -> Self {
        Self {
            advisory_committee: WeightTable::new(names::ADVISORY_COMMITTEE, config.ac_default),
            product_code: WeightTable::new(names::PRODUCT_CODE, config.pc_default),
            submission_type: WeightTable::new(
                names::SUBMISSION_TYPE,
                config.submission_type_default,
            ),
            high_value: KeywordSet::empty(names::HIGH_VALUE),
            cosmetic: KeywordSet::empty(names::COSMETIC),
            diagnostic: KeywordSet::empty(names::DIAGNOSTIC),
            therapeutic: KeywordSet::empty(names::THERAPEUTIC),
        }
    }

    pub fn summary(&self) -> TablesSummary {
        TablesSummary {
            advisory_committee: self.advisory_committee.len(),
            product_code: self.product_code.len(),
            submission_type: self.submission_type.len(),
            high_value: self.high_value.len(),
            cosmetic: self.cosmetic.len(),
            diagnostic: self.diagnostic.len(),
            therapeutic: self.therapeutic.len(),
        }
    }
}

fn load_required_weights(
    provider: &dyn TableProvider,
    name: &str,
    default: f64,
) -> Result<WeightTable, FatalLoadError> {
    let table = provider
        .load_weight_table(name, default)
        .map_err(|source| FatalLoadError {
            table: name.to_string(),
            source,
        })?;
    debug!(
        table = table.name(),
        entries = table.len(),
        default = table.default_weight(),
        "loaded weight table"
    );
    Ok(table)
}

fn load_optional_keywords(provider: &dyn TableProvider, name: &str) -> KeywordSet {
    match provider.load_keyword_set(name) {
        Ok(set) => {
            debug!(table = set.name(), terms = set.len(), "loaded keyword set");
            set
        }
        Err(e) => {
            warn!(table = name, error = %e, "optional keyword set unavailable, using empty set");
            KeywordSet::empty(name)
        }
    }
}
