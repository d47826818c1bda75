//! Arrow/Parquet output of scored records.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use clearwatch_core::{ScoredRecord, scored};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::StoreError;

/// Build one RecordBatch (see [`scored::scored_record_schema`]) from scored records.
pub fn scored_to_batch(results: &[ScoredRecord]) -> Result<RecordBatch, StoreError> {
    let text = |f: fn(&ScoredRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(
            results.iter().map(f).collect::<Vec<Option<&str>>>(),
        ))
    };
    let float = |f: fn(&ScoredRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(
            results.iter().map(f).collect::<Vec<f64>>(),
        ))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            results
                .iter()
                .map(|r| r.record.record_id.as_str())
                .collect::<Vec<&str>>(),
        )),
        text(|r| r.record.applicant_name.as_deref()),
        text(|r| r.record.device_name.as_deref()),
        text(|r| r.record.advisory_committee_code.as_deref()),
        text(|r| r.record.product_code.as_deref()),
        text(|r| r.record.submission_type_code.as_deref()),
        text(|r| r.record.country.as_deref()),
        text(|r| r.record.decision_date.as_deref()),
        float(|r| r.breakdown.final_score),
        Arc::new(StringArray::from(
            results
                .iter()
                .map(|r| r.breakdown.category.as_str())
                .collect::<Vec<&str>>(),
        )),
        float(|r| r.breakdown.components.ac),
        float(|r| r.breakdown.components.pc),
        float(|r| r.breakdown.components.keyword),
        float(|r| r.breakdown.components.submission_type),
        float(|r| r.breakdown.components.processing_time),
        float(|r| r.breakdown.components.geography),
        float(|r| r.breakdown.negative_factor),
        float(|r| r.breakdown.synergy_bonus),
        Arc::new(StringArray::from(
            results
                .iter()
                .map(|r| r.recap.as_str())
                .collect::<Vec<&str>>(),
        )),
    ];

    Ok(RecordBatch::try_new(
        Arc::new(scored::scored_record_schema()),
        columns,
    )?)
}

/// Write scored records to a Parquet file, replacing any existing file.
pub fn write_scored_parquet(path: &Path, results: &[ScoredRecord]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let batch = scored_to_batch(results)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    info!(path = %path.display(), rows = results.len(), "wrote scored parquet");
    Ok(())
}

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    if !path.exists() {
        return Err(StoreError::ParquetNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}
