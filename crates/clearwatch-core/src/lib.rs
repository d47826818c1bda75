pub mod collab;
pub mod config;
pub mod guard;
pub mod record;
pub mod schema;
pub mod scoring;
pub mod tables;

pub use collab::{DataSink, DataSource, EnrichmentClient, EnrichmentError, SinkError, SourceError};
pub use config::ScoringConfig;
pub use guard::{ArchiveCheck, ReportPeriod, RunGuard, RunGuardDecision, RunMode};
pub use record::{InputRecord, ProcessingDays, ScoredRecord, records_from_json};
pub use schema::scored;
pub use scoring::{Category, ComponentWeights, RecordScoringError, ScoreBreakdown, ScoringEngine};
pub use tables::{
    FatalLoadError, KeywordSet, LoadError, ScoringTables, TableProvider, WeightEntry, WeightTable,
};
