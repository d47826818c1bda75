//! Collaborator contracts supplied by the host application.

use thiserror::Error;

use crate::guard::{ArchiveCheck, ReportPeriod};
use crate::record::{InputRecord, ScoredRecord};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed records: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Why an enrichment attempt produced nothing usable.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("request timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response contained no text")]
    EmptyResponse,

    #[error("missing credential: {0}")]
    MissingCredential(String),
}

impl EnrichmentError {
    /// Short label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::EmptyResponse => "empty",
            Self::MissingCredential(_) => "credential",
        }
    }
}

/// Produces the month's records and answers archive questions.
pub trait DataSource: ArchiveCheck {
    /// The full, ordered set of records for this run.
    fn records(&mut self) -> Result<Vec<InputRecord>, SourceError>;

    /// Cheap refresh performed instead of a full run.
    fn refresh_only(&mut self) -> Result<(), SourceError>;
}

/// Receives scored results.
pub trait DataSink {
    fn write_results(&mut self, results: &[ScoredRecord]) -> Result<(), SinkError>;

    fn archive(&mut self, period: ReportPeriod, results: &[ScoredRecord]) -> Result<(), SinkError>;
}

/// Generates a short company description on a cache miss.
///
/// Implementations own their timeout, retry, and rate-limit policy; callers
/// make exactly one call per miss.
pub trait EnrichmentClient {
    fn summarize(&self, company_name: &str) -> Result<String, EnrichmentError>;
}
