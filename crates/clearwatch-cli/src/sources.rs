//! File-backed data source and sink.

use std::path::{Path, PathBuf};

use clearwatch_core::{
    ArchiveCheck, DataSink, DataSource, InputRecord, ReportPeriod, ScoredRecord, SinkError,
    SourceError, records_from_json,
};
use clearwatch_store::{StoreError, write_scored_parquet};
use tracing::{info, warn};

/// `<archive_dir>/<YYYY-MM>.parquet`
pub fn archive_path(archive_dir: &Path, period: ReportPeriod) -> PathBuf {
    archive_dir.join(format!("{period}.parquet"))
}

/// Records read from a JSON array file.
pub struct JsonRecordSource {
    path: PathBuf,
    archive_dir: PathBuf,
}

impl JsonRecordSource {
    pub fn new(path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive_dir: archive_dir.into(),
        }
    }

    /// Read every entry. Entries that do not convert are kept, flagged, and
    /// logged; only a file that is not a JSON array is an error.
    pub fn read(&self) -> Result<Vec<InputRecord>, SourceError> {
        let text = std::fs::read_to_string(&self.path)?;
        let records = records_from_json(&text)
            .map_err(|e| SourceError::Malformed(format!("{}: {e}", self.path.display())))?;
        for record in &records {
            if let Some(reason) = &record.conversion_error {
                warn!(
                    path = %self.path.display(),
                    record_id = %record.record_id,
                    error = %reason,
                    "record could not be converted"
                );
            }
        }
        Ok(records)
    }
}

impl ArchiveCheck for JsonRecordSource {
    fn archive_exists(&self, period: ReportPeriod) -> bool {
        archive_path(&self.archive_dir, period).exists()
    }
}

impl DataSource for JsonRecordSource {
    fn records(&mut self) -> Result<Vec<InputRecord>, SourceError> {
        let records = self.read()?;
        info!(path = %self.path.display(), count = records.len(), "loaded records");
        Ok(records)
    }

    fn refresh_only(&mut self) -> Result<(), SourceError> {
        let records = self.read()?;
        info!(path = %self.path.display(), count = records.len(), "refreshed records");
        Ok(())
    }
}

/// Scored results and monthly archives as Parquet files.
pub struct ParquetResultSink {
    results_path: PathBuf,
    archive_dir: PathBuf,
}

impl ParquetResultSink {
    pub fn new(results_path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
            archive_dir: archive_dir.into(),
        }
    }
}

impl DataSink for ParquetResultSink {
    fn write_results(&mut self, results: &[ScoredRecord]) -> Result<(), SinkError> {
        write_scored_parquet(&self.results_path, results).map_err(sink_error)
    }

    fn archive(&mut self, period: ReportPeriod, results: &[ScoredRecord]) -> Result<(), SinkError> {
        write_scored_parquet(&archive_path(&self.archive_dir, period), results).map_err(sink_error)
    }
}

fn sink_error(e: StoreError) -> SinkError {
    match e {
        StoreError::Io(io) => SinkError::Io(io),
        other => SinkError::Other(other.to_string()),
    }
}
