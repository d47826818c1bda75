//! Two-tier company recap cache.
//!
//! The durable tier is read once at run start into memory; every lookup
//! after that touches memory only. Misses are filled with a placeholder or,
//! when allowed, one enrichment attempt, and the whole memory tier is
//! written back at run end.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clearwatch_core::EnrichmentClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::StoreError;

/// Longest recap kept, in characters, including the truncation marker.
pub const MAX_RECAP_CHARS: usize = 32_760;
pub const TRUNCATION_MARKER: &str = " ...[truncated]";
/// Recap for a company nobody has researched yet.
pub const NEEDS_RESEARCH: &str = "Needs Research";
/// Returned for a blank applicant name; never cached.
pub const INVALID_APPLICANT: &str = "Invalid Applicant Name";

/// One persisted recap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapCacheEntry {
    /// Trimmed, lower-cased company name.
    pub company_name_key: String,
    pub recap_text: String,
    pub last_updated: DateTime<Utc>,
}

/// Durable tier of the recap cache.
pub trait DurableCacheStore {
    /// All persisted entries. A store that does not exist yet is empty, not an error.
    fn read_all(&self) -> Result<Vec<RecapCacheEntry>, StoreError>;

    /// Replace the persisted contents with `entries`.
    fn write_all(&self, entries: &[RecapCacheEntry]) -> Result<(), StoreError>;

    /// Where the entries live, for log messages.
    fn describe(&self) -> String {
        "recap cache store".to_string()
    }
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub invalid_names: usize,
    pub enrichment_successes: usize,
    pub enrichment_failures: usize,
}

pub struct RecapCache<'a> {
    entries: BTreeMap<String, String>,
    enricher: Option<&'a dyn EnrichmentClient>,
    stats: CacheStats,
}

impl Default for RecapCache<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RecapCache<'a> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            enricher: None,
            stats: CacheStats::default(),
        }
    }

    /// Read the durable tier into memory.
    ///
    /// An unreadable store degrades to an empty cache; the failure is logged
    /// and the next save replaces the stored contents.
    pub fn load(store: &dyn DurableCacheStore) -> Self {
        let mut cache = Self::new();
        match store.read_all() {
            Ok(entries) => {
                for entry in entries {
                    let key = cache_key(&entry.company_name_key);
                    if key.is_empty() {
                        continue;
                    }
                    cache.entries.insert(key, truncate_recap(entry.recap_text));
                }
                info!(count = cache.entries.len(), "loaded recap cache");
            }
            Err(e) => {
                warn!(
                    store = %store.describe(),
                    error = %e,
                    "recap cache unreadable, starting empty; the next save replaces it"
                );
            }
        }
        cache
    }

    /// Attach the client used for enrichment on a miss.
    pub fn with_enricher(mut self, enricher: &'a dyn EnrichmentClient) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn has_enricher(&self) -> bool {
        self.enricher.is_some()
    }

    /// Recap for `company_name`.
    ///
    /// A blank name returns [`INVALID_APPLICANT`] without touching the cache.
    /// A miss is filled with [`NEEDS_RESEARCH`], or with the enrichment result
    /// when `allow_enrichment` is set and a client is attached, and stored so
    /// later lookups in this run are hits.
    pub fn resolve(&mut self, company_name: &str, allow_enrichment: bool) -> String {
        let key = cache_key(company_name);
        if key.is_empty() {
            self.stats.invalid_names += 1;
            return INVALID_APPLICANT.to_string();
        }

        if let Some(text) = self.entries.get(&key) {
            self.stats.hits += 1;
            return text.clone();
        }
        self.stats.misses += 1;

        let mut recap = NEEDS_RESEARCH.to_string();
        if allow_enrichment && let Some(enricher) = self.enricher {
            match enricher.summarize(company_name.trim()) {
                Ok(text) if !text.trim().is_empty() => {
                    self.stats.enrichment_successes += 1;
                    recap = truncate_recap(text.trim().to_string());
                    debug!(company = %key, chars = recap.chars().count(), "enriched recap");
                }
                Ok(_) => {
                    self.stats.enrichment_failures += 1;
                    warn!(company = %key, kind = "empty", "enrichment returned no text");
                }
                Err(e) => {
                    self.stats.enrichment_failures += 1;
                    warn!(company = %key, kind = e.kind(), error = %e, "enrichment failed");
                }
            }
        }

        self.entries.insert(key, recap.clone());
        recap
    }

    /// Write the memory tier to `store`, stamping every entry with now.
    ///
    /// Returns the number of entries written. An empty cache writes nothing,
    /// so a non-empty durable store is never wiped.
    pub fn save(&self, store: &dyn DurableCacheStore) -> Result<usize, StoreError> {
        if self.entries.is_empty() {
            debug!("recap cache empty, skipping save");
            return Ok(0);
        }
        let now = Utc::now();
        let entries: Vec<RecapCacheEntry> = self
            .entries
            .iter()
            .map(|(key, text)| RecapCacheEntry {
                company_name_key: key.clone(),
                recap_text: text.clone(),
                last_updated: now,
            })
            .collect();
        store.write_all(&entries)?;
        info!(count = entries.len(), "saved recap cache");
        Ok(entries.len())
    }

    /// Cached recap for `company_name`, without counting a hit or filling a miss.
    pub fn get(&self, company_name: &str) -> Option<&str> {
        self.entries.get(&cache_key(company_name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

fn cache_key(company_name: &str) -> String {
    company_name.trim().to_lowercase()
}

/// Cap `text` at [`MAX_RECAP_CHARS`], ending with [`TRUNCATION_MARKER`] when cut.
pub fn truncate_recap(text: String) -> String {
    if text.chars().count() <= MAX_RECAP_CHARS {
        return text;
    }
    let keep = MAX_RECAP_CHARS - TRUNCATION_MARKER.chars().count();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearwatch_core::EnrichmentError;
    use std::cell::{Cell, RefCell};

    /// Memory-backed store that can be told to fail.
    #[derive(Default)]
    struct MemStore {
        entries: RefCell<Vec<RecapCacheEntry>>,
        writes: Cell<usize>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl DurableCacheStore for MemStore {
        fn read_all(&self) -> Result<Vec<RecapCacheEntry>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Other("disk on fire".into()));
            }
            Ok(self.entries.borrow().clone())
        }

        fn write_all(&self, entries: &[RecapCacheEntry]) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Other("read-only".into()));
            }
            self.writes.set(self.writes.get() + 1);
            *self.entries.borrow_mut() = entries.to_vec();
            Ok(())
        }
    }

    /// Enricher that counts calls and replays a fixed answer.
    struct FakeEnricher {
        calls: Cell<usize>,
        answer: Result<String, fn() -> EnrichmentError>,
    }

    impl FakeEnricher {
        fn ok(text: &str) -> Self {
            Self {
                calls: Cell::new(0),
                answer: Ok(text.to_string()),
            }
        }

        fn failing(err: fn() -> EnrichmentError) -> Self {
            Self {
                calls: Cell::new(0),
                answer: Err(err),
            }
        }
    }

    impl EnrichmentClient for FakeEnricher {
        fn summarize(&self, _company_name: &str) -> Result<String, EnrichmentError> {
            self.calls.set(self.calls.get() + 1);
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn entry(key: &str, text: &str) -> RecapCacheEntry {
        RecapCacheEntry {
            company_name_key: key.to_string(),
            recap_text: text.to_string(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn miss_without_enrichment_stores_placeholder() {
        let mut cache = RecapCache::new();
        assert_eq!(cache.resolve("Acme Corp", false), NEEDS_RESEARCH);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("acme corp"), Some(NEEDS_RESEARCH));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut cache = RecapCache::new();
        let first = cache.resolve("Acme Corp", false);
        let second = cache.resolve("ACME CORP", false);
        let third = cache.resolve("  acme corp ", false);
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn blank_name_is_invalid_and_uncached() {
        let mut cache = RecapCache::new();
        cache.resolve("Acme Corp", false);
        let before = cache.len();

        assert_eq!(cache.resolve("", true), INVALID_APPLICANT);
        assert_eq!(cache.resolve("   ", true), INVALID_APPLICANT);
        assert_eq!(cache.len(), before);
        assert_eq!(cache.stats().invalid_names, 2);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn enrichment_fills_miss_once() {
        let enricher = FakeEnricher::ok("Acme makes orthopedic implants.");
        let mut cache = RecapCache::new().with_enricher(&enricher);

        let first = cache.resolve("Acme Corp", true);
        let second = cache.resolve("ACME CORP", true);

        assert_eq!(first, "Acme makes orthopedic implants.");
        assert_eq!(first, second);
        assert_eq!(enricher.calls.get(), 1);
        assert_eq!(cache.stats().enrichment_successes, 1);
    }

    #[test]
    fn enrichment_not_attempted_when_disallowed() {
        let enricher = FakeEnricher::ok("unused");
        let mut cache = RecapCache::new().with_enricher(&enricher);
        assert_eq!(cache.resolve("Acme Corp", false), NEEDS_RESEARCH);
        assert_eq!(enricher.calls.get(), 0);
    }

    #[test]
    fn enrichment_failure_degrades_and_is_not_retried() {
        let enricher = FakeEnricher::failing(|| EnrichmentError::Timeout);
        let mut cache = RecapCache::new().with_enricher(&enricher);

        assert_eq!(cache.resolve("Acme Corp", true), NEEDS_RESEARCH);
        assert_eq!(cache.resolve("acme corp", true), NEEDS_RESEARCH);
        assert_eq!(enricher.calls.get(), 1);
        assert_eq!(cache.stats().enrichment_failures, 1);
    }

    #[test]
    fn empty_enrichment_counts_as_failure() {
        let enricher = FakeEnricher::ok("   ");
        let mut cache = RecapCache::new().with_enricher(&enricher);
        assert_eq!(cache.resolve("Acme Corp", true), NEEDS_RESEARCH);
        assert_eq!(cache.stats().enrichment_failures, 1);
        assert_eq!(cache.stats().enrichment_successes, 0);
    }

    #[test]
    fn hit_from_durable_tier_skips_enrichment() {
        let store = MemStore::default();
        store.entries.borrow_mut().push(entry("acme corp", "Known recap"));
        let enricher = FakeEnricher::ok("fresh");

        let mut cache = RecapCache::load(&store).with_enricher(&enricher);
        assert_eq!(cache.resolve("ACME Corp", true), "Known recap");
        assert_eq!(enricher.calls.get(), 0);
    }

    #[test]
    fn load_normalizes_keys_and_collapses_duplicates() {
        let store = MemStore::default();
        store.entries.borrow_mut().extend([
            entry("Acme Corp", "old"),
            entry("ACME CORP ", "new"),
            entry("   ", "orphan"),
        ]);
        let cache = RecapCache::load(&store);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("acme corp"), Some("new"));
    }

    #[test]
    fn unreadable_store_loads_empty() {
        let store = MemStore {
            fail_reads: true,
            ..Default::default()
        };
        let cache = RecapCache::load(&store);
        assert!(cache.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MemStore::default();
        let enricher = FakeEnricher::ok("Makes stents.");
        let mut cache = RecapCache::new().with_enricher(&enricher);
        cache.resolve("Acme Corp", false);
        cache.resolve("Stent Co", true);
        assert_eq!(cache.save(&store).unwrap(), 2);

        let reloaded = RecapCache::load(&store);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("ACME CORP"), Some(NEEDS_RESEARCH));
        assert_eq!(reloaded.get("stent co"), Some("Makes stents."));
    }

    #[test]
    fn save_stamps_every_entry() {
        let store = MemStore::default();
        let mut cache = RecapCache::new();
        cache.resolve("A", false);
        cache.resolve("B", false);
        let before = Utc::now();
        cache.save(&store).unwrap();

        let saved = store.entries.borrow();
        assert!(saved.iter().all(|e| e.last_updated >= before));
        assert_eq!(saved[0].last_updated, saved[1].last_updated);
    }

    #[test]
    fn empty_cache_does_not_overwrite_store() {
        let store = MemStore::default();
        store.entries.borrow_mut().push(entry("acme corp", "keep me"));
        let cache = RecapCache::new();

        assert_eq!(cache.save(&store).unwrap(), 0);
        assert_eq!(store.writes.get(), 0);
        assert_eq!(store.entries.borrow().len(), 1);
    }

    #[test]
    fn save_failure_is_reported() {
        let store = MemStore {
            fail_writes: true,
            ..Default::default()
        };
        let mut cache = RecapCache::new();
        cache.resolve("Acme Corp", false);
        assert!(cache.save(&store).is_err());
        // In-memory results survive the failed write.
        assert_eq!(cache.get("acme corp"), Some(NEEDS_RESEARCH));
    }

    #[test]
    fn long_recap_is_truncated_with_marker() {
        let long = "x".repeat(MAX_RECAP_CHARS + 100);
        let enricher = FakeEnricher::ok(&long);
        let mut cache = RecapCache::new().with_enricher(&enricher);

        let recap = cache.resolve("Verbose Inc", true);
        assert_eq!(recap.chars().count(), MAX_RECAP_CHARS);
        assert!(recap.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn short_recap_is_untouched() {
        let exact = "y".repeat(MAX_RECAP_CHARS);
        assert_eq!(truncate_recap(exact.clone()), exact);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(MAX_RECAP_CHARS + 1);
        let cut = truncate_recap(long);
        assert_eq!(cut.chars().count(), MAX_RECAP_CHARS);
    }
}
