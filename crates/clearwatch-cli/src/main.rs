mod display;
mod settings;
mod sources;

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use clearwatch_ai::{API_KEY_ENV, LlmEnricher};
use clearwatch_core::{
    Category, DataSource, ReportPeriod, RunGuard, ScoredRecord, ScoringEngine, ScoringTables,
};
use clearwatch_pipeline::{Pipeline, RunOutcome, RunRequest};
use clearwatch_store::{
    DurableCacheStore, JsonCacheStore, JsonTableDir, NEEDS_RESEARCH, RecapCache, read_parquet,
    scored_to_batch,
};
use tracing::{info, warn};

use settings::{DataLayout, Settings};
use sources::{JsonRecordSource, ParquetResultSink, archive_path};

#[derive(Parser)]
#[command(name = "clearwatch")]
#[command(about = "Score regulatory clearances and maintain company recaps")]
#[command(version)]
struct Cli {
    /// Data directory holding records, tables, cache and outputs
    #[arg(long, global = true, env = "CLEARWATCH_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline: guard, score, resolve recaps, write results
    Run {
        #[command(flatten)]
        when: WhenArgs,

        /// Skip enrichment even for privileged users
        #[arg(long)]
        no_enrich: bool,

        /// API key for the enrichment service
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Print this many result cards after the run
        #[arg(long, default_value_t = 0)]
        cards: usize,
    },

    /// Score the records file and print a table, without writing anything
    Score {
        /// Records file (default: <data-dir>/records.json)
        #[arg(long)]
        records: Option<PathBuf>,
    },

    /// Show the run guard decision without running
    Guard {
        #[command(flatten)]
        when: WhenArgs,
    },

    /// Show scored results from the latest run or an archive
    Results {
        /// Archived period (YYYY-MM) instead of the latest results
        #[arg(long)]
        archive: Option<String>,

        /// Only rows in this category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,

        /// Maximum cards to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Inspect the durable recap cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry counts
    Stats,
    /// Cached recaps, sorted by company key
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(clap::Args)]
struct WhenArgs {
    /// Target period (YYYY-MM); defaults to the month before --today
    #[arg(long)]
    period: Option<String>,

    /// Override today's date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Invoking user, checked against the privileged list
    #[arg(long, env = "CLEARWATCH_USER")]
    user: Option<String>,

    /// Days at the start of a month during which every run is a full run
    #[arg(long)]
    grace_days: Option<u32>,
}

impl WhenArgs {
    fn request(&self, settings: &Settings) -> anyhow::Result<RunRequest> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let is_privileged_user = settings.is_privileged(self.user.as_deref());
        let period = match &self.period {
            Some(p) => ReportPeriod::parse(p)
                .with_context(|| format!("invalid period {p:?}, expected YYYY-MM"))?,
            None => ReportPeriod::preceding(today),
        };
        Ok(RunRequest {
            period,
            today,
            is_privileged_user,
        })
    }

    fn guard(&self, settings: &Settings) -> RunGuard {
        RunGuard::with_grace_days(self.grace_days.unwrap_or(settings.grace_days))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    High,
    Moderate,
    Low,
    AlmostNone,
    Error,
}

impl From<CategoryArg> for Category {
    fn from(c: CategoryArg) -> Self {
        match c {
            CategoryArg::High => Category::High,
            CategoryArg::Moderate => Category::Moderate,
            CategoryArg::Low => Category::Low,
            CategoryArg::AlmostNone => Category::AlmostNone,
            CategoryArg::Error => Category::Error,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    info!("clearwatch v{}", env!("CARGO_PKG_VERSION"));

    let layout = DataLayout::new(&cli.data_dir);
    let settings = Settings::load(layout.root())?;

    match cli.command {
        Commands::Run {
            when,
            no_enrich,
            api_key,
            cards,
        } => cmd_run(&layout, &settings, &when, no_enrich, api_key, cards),
        Commands::Score { records } => cmd_score(&layout, &settings, records),
        Commands::Guard { when } => cmd_guard(&layout, &settings, &when),
        Commands::Results {
            archive,
            category,
            limit,
        } => cmd_results(&layout, archive, category.map(Category::from), limit),
        Commands::Cache { action } => cmd_cache(&layout, action),
    }
}

fn cmd_run(
    layout: &DataLayout,
    settings: &Settings,
    when: &WhenArgs,
    no_enrich: bool,
    api_key: Option<String>,
    cards: usize,
) -> anyhow::Result<()> {
    let request = when.request(settings)?;

    let mut source = JsonRecordSource::new(layout.records(), layout.archive_dir());
    let mut sink = ParquetResultSink::new(layout.results(), layout.archive_dir());
    let tables = JsonTableDir::new(layout.tables());
    let cache_store = JsonCacheStore::new(layout.recap_cache());

    let enricher = if no_enrich || !request.is_privileged_user {
        None
    } else if api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
        Some(
            LlmEnricher::new(api_key, settings.enrichment.clone())
                .context("building enrichment client")?,
        )
    } else {
        warn!("{API_KEY_ENV} not set, recaps will not be enriched");
        None
    };

    let mut pipeline = Pipeline::new(
        &mut source,
        &mut sink,
        &tables,
        &cache_store,
        &settings.scoring,
    )
    .with_guard(when.guard(settings));
    if let Some(enricher) = &enricher {
        pipeline = pipeline.with_enricher(enricher);
    }

    match pipeline.run(request).context("pipeline run failed")? {
        RunOutcome::Skipped(decision) => {
            display::print_decision(request.period, &when.guard(settings), &decision);
            println!();
            println!("Archive for {} already exists; records refreshed only.", request.period);
        }
        RunOutcome::Completed { summary, results } => {
            display::print_summary(&summary);
            if cards > 0 && !results.is_empty() {
                println!();
                let batch = scored_to_batch(&results)?;
                display::print_result_cards(&[batch], None, cards)?;
            }
        }
    }
    Ok(())
}

fn cmd_score(
    layout: &DataLayout,
    settings: &Settings,
    records: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = records.unwrap_or_else(|| layout.records());
    let records = JsonRecordSource::new(&path, layout.archive_dir())
        .records()
        .with_context(|| format!("reading {}", path.display()))?;

    let tables = ScoringTables::load(&JsonTableDir::new(layout.tables()), &settings.scoring)?;
    let engine = ScoringEngine::new(&tables, &settings.scoring);
    let cache = RecapCache::load(&JsonCacheStore::new(layout.recap_cache()));

    let results: Vec<ScoredRecord> = engine
        .score_all(&records)
        .into_iter()
        .map(|mut scored| {
            scored.recap = scored
                .record
                .applicant_name
                .as_deref()
                .and_then(|name| cache.get(name))
                .unwrap_or(NEEDS_RESEARCH)
                .to_string();
            scored
        })
        .collect();

    display::print_table(&[scored_to_batch(&results)?])
}

fn cmd_guard(layout: &DataLayout, settings: &Settings, when: &WhenArgs) -> anyhow::Result<()> {
    let request = when.request(settings)?;
    let source = JsonRecordSource::new(layout.records(), layout.archive_dir());
    let guard = when.guard(settings);
    let decision = guard.decide(
        request.period,
        &source,
        request.today,
        request.is_privileged_user,
    );
    display::print_decision(request.period, &guard, &decision);
    Ok(())
}

fn cmd_results(
    layout: &DataLayout,
    archive: Option<String>,
    category: Option<Category>,
    limit: usize,
) -> anyhow::Result<()> {
    let path = match archive {
        Some(p) => {
            let Some(period) = ReportPeriod::parse(&p) else {
                bail!("invalid period {p:?}, expected YYYY-MM");
            };
            archive_path(&layout.archive_dir(), period)
        }
        None => layout.results(),
    };
    let batches = read_parquet(&path).with_context(|| format!("reading {}", path.display()))?;
    display::print_result_cards(&batches, category, limit)
}

fn cmd_cache(layout: &DataLayout, action: CacheAction) -> anyhow::Result<()> {
    let store = JsonCacheStore::new(layout.recap_cache());
    let mut entries = store
        .read_all()
        .with_context(|| format!("reading {}", store.path().display()))?;
    entries.sort_by(|a, b| a.company_name_key.cmp(&b.company_name_key));

    match action {
        CacheAction::Stats => {
            let researched = entries
                .iter()
                .filter(|e| e.recap_text == NEEDS_RESEARCH)
                .count();
            println!("{:<26} {}", "entries", entries.len());
            println!("{:<26} {}", "needs_research", researched);
            println!("{:<26} {}", "enriched", entries.len() - researched);
            if let Some(latest) = entries.iter().map(|e| e.last_updated).max() {
                println!("{:<26} {}", "last_saved", latest.to_rfc3339());
            }
        }
        CacheAction::List { limit } => display::print_cache_entries(&entries, limit),
    }
    Ok(())
}
