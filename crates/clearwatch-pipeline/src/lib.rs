//! Run orchestration: guard decision, table load, scoring, recap resolution,
//! hand-off to the sink, cache persistence, archiving.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::NaiveDate;
use clearwatch_core::{
    Category, DataSink, DataSource, EnrichmentClient, FatalLoadError, ReportPeriod, RunGuard,
    RunGuardDecision, ScoredRecord, ScoringConfig, ScoringEngine, ScoringTables, SinkError,
    SourceError, TableProvider,
};
use clearwatch_store::{CacheStats, DurableCacheStore, RecapCache};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    FatalLoad(#[from] FatalLoadError),

    #[error("data source failed: {0}")]
    Source(#[from] SourceError),

    #[error("data sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// Inputs that vary per invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest {
    pub period: ReportPeriod,
    pub today: NaiveDate,
    pub is_privileged_user: bool,
}

impl RunRequest {
    /// Target the month before `today`.
    pub fn for_today(today: NaiveDate, is_privileged_user: bool) -> Self {
        Self {
            period: ReportPeriod::preceding(today),
            today,
            is_privileged_user,
        }
    }
}

/// Records per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
    pub almost_none: usize,
    pub error: usize,
}

impl CategoryCounts {
    fn add(&mut self, category: Category) {
        match category {
            Category::High => self.high += 1,
            Category::Moderate => self.moderate += 1,
            Category::Low => self.low += 1,
            Category::AlmostNone => self.almost_none += 1,
            Category::Error => self.error += 1,
        }
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::High => self.high,
            Category::Moderate => self.moderate,
            Category::Low => self.low,
            Category::AlmostNone => self.almost_none,
            Category::Error => self.error,
        }
    }
}

/// End-of-run summary of a full run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub period: ReportPeriod,
    pub decision: RunGuardDecision,
    pub records_processed: usize,
    pub categories: CategoryCounts,
    pub cache: CacheStats,
    pub cache_entries: usize,
    /// Entries written, or `None` when the save failed.
    pub cache_saved: Option<usize>,
    pub cache_save_error: Option<String>,
    pub archived: bool,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn error_records(&self) -> usize {
        self.categories.error
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Guard said no full run; only a refresh happened.
    Skipped(RunGuardDecision),
    Completed {
        summary: RunSummary,
        results: Vec<ScoredRecord>,
    },
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Skipped(_) => None,
            Self::Completed { summary, .. } => Some(summary),
        }
    }
}

/// Drives one run over borrowed collaborators.
pub struct Pipeline<'a> {
    source: &'a mut dyn DataSource,
    sink: &'a mut dyn DataSink,
    tables: &'a dyn TableProvider,
    cache_store: &'a dyn DurableCacheStore,
    config: &'a ScoringConfig,
    enricher: Option<&'a dyn EnrichmentClient>,
    guard: RunGuard,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a mut dyn DataSource,
        sink: &'a mut dyn DataSink,
        tables: &'a dyn TableProvider,
        cache_store: &'a dyn DurableCacheStore,
        config: &'a ScoringConfig,
    ) -> Self {
        Self {
            source,
            sink,
            tables,
            cache_store,
            config,
            enricher: None,
            guard: RunGuard::default(),
            cancel: None,
        }
    }

    /// Enrichment client used for privileged runs.
    pub fn with_enricher(mut self, enricher: &'a dyn EnrichmentClient) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_guard(mut self, guard: RunGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Flag checked between records; setting it stops the run after the
    /// current record.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn run(&mut self, request: RunRequest) -> Result<RunOutcome, PipelineError> {
        let start = Instant::now();

        let decision = self.guard.decide(
            request.period,
            &*self.source,
            request.today,
            request.is_privileged_user,
        );
        info!(
            period = %request.period,
            mode = decision.mode().as_str(),
            must_archive = decision.must_archive,
            grace_window = decision.within_grace_window,
            privileged = decision.is_privileged_user,
            "run guard decided"
        );

        if !decision.proceed_full {
            self.source.refresh_only()?;
            info!("refresh complete, scoring skipped");
            return Ok(RunOutcome::Skipped(decision));
        }

        // Required tables fail here, before any record is touched.
        let tables = ScoringTables::load(self.tables, self.config)?;
        let engine = ScoringEngine::new(&tables, self.config);

        let mut cache = RecapCache::load(self.cache_store);
        if let Some(enricher) = self.enricher {
            cache = cache.with_enricher(enricher);
        }
        let allow_enrichment = decision.is_privileged_user && cache.has_enricher();

        let records = self.source.records()?;
        info!(count = records.len(), allow_enrichment, "scoring records");

        let mut results = Vec::with_capacity(records.len());
        let mut categories = CategoryCounts::default();
        let mut cancelled = false;

        for record in records {
            if self.cancelled() {
                warn!(done = results.len(), "run cancelled between records");
                cancelled = true;
                break;
            }
            let breakdown = engine.score(&record);
            let recap = cache.resolve(
                record.applicant_name.as_deref().unwrap_or(""),
                allow_enrichment,
            );
            categories.add(breakdown.category);
            results.push(ScoredRecord {
                record,
                breakdown,
                recap,
            });
        }

        // Recaps paid for this run are saved even when the sink fails.
        let written = self.sink.write_results(&results);

        let (cache_saved, cache_save_error) = match cache.save(self.cache_store) {
            Ok(n) => (Some(n), None),
            Err(e) => {
                error!(error = %e, "failed to save recap cache");
                (None, Some(e.to_string()))
            }
        };

        if let Err(e) = written {
            error!(error = %e, cache_saved = cache_saved.is_some(), "failed to write results");
            return Err(e.into());
        }

        let archived = decision.must_archive && !cancelled;
        if archived {
            self.sink.archive(request.period, &results)?;
            info!(period = %request.period, "archived period");
        }

        let summary = RunSummary {
            period: request.period,
            decision,
            records_processed: results.len(),
            categories,
            cache: cache.stats(),
            cache_entries: cache.len(),
            cache_saved,
            cache_save_error,
            archived,
            cancelled,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            records = summary.records_processed,
            errors = summary.error_records(),
            high = categories.high,
            moderate = categories.moderate,
            low = categories.low,
            almost_none = categories.almost_none,
            cache_hits = summary.cache.hits,
            cache_misses = summary.cache.misses,
            enriched = summary.cache.enrichment_successes,
            enrichment_failures = summary.cache.enrichment_failures,
            archived,
            cancelled,
            "run complete"
        );

        Ok(RunOutcome::Completed { summary, results })
    }
}
