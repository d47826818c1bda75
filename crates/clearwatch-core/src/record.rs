//! Cleared-device submission records as supplied by the data source.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::ScoreBreakdown;

/// One cleared-device submission.
///
/// Everything except `record_id` is optional: the upstream feed routinely
/// omits fields, and the scoring engine treats a missing value the same as an
/// unknown one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Submission number (e.g. `K251234`), used for diagnostics only.
    pub record_id: String,
    #[serde(default)]
    pub advisory_committee_code: Option<String>,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub submission_type_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub processing_days: Option<ProcessingDays>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub statement_text: Option<String>,
    #[serde(default)]
    pub applicant_name: Option<String>,
    /// ISO 8601 date string. Carried through to the output, not scored.
    #[serde(default)]
    pub decision_date: Option<String>,
    /// Why the feed entry could not be read. A record carrying one always
    /// scores as `Error`.
    #[serde(skip)]
    pub conversion_error: Option<String>,
}

impl InputRecord {
    /// Text searched by every keyword set: device name and statement, space-joined.
    pub fn search_blob(&self) -> String {
        format!(
            "{} {}",
            self.device_name.as_deref().unwrap_or(""),
            self.statement_text.as_deref().unwrap_or("")
        )
    }

    /// Convert one feed entry. An entry that does not fit the record shape
    /// still yields a record: its id (or `#<index>` when it has none), its
    /// applicant and device when those are text, and `conversion_error` set.
    pub fn from_json_value(index: usize, value: Value) -> Self {
        match serde_json::from_value::<InputRecord>(value.clone()) {
            Ok(record) => record,
            Err(e) => {
                let record_id = match value.get("record_id") {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => format!("#{index}"),
                };
                Self {
                    record_id,
                    applicant_name: text_field(&value, "applicant_name"),
                    device_name: text_field(&value, "device_name"),
                    decision_date: text_field(&value, "decision_date"),
                    conversion_error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}

/// Parse a JSON array of feed entries, converting each one on its own.
///
/// Only a document that is not a JSON array fails; a bad entry becomes a
/// record with `conversion_error` set and the rest of the batch is kept.
pub fn records_from_json(text: &str) -> Result<Vec<InputRecord>, serde_json::Error> {
    let values: Vec<Value> = serde_json::from_str(text)?;
    Ok(values
        .into_iter()
        .enumerate()
        .map(|(i, v)| InputRecord::from_json_value(i, v))
        .collect())
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Review duration as it arrives from the feed: sometimes a number,
/// sometimes text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessingDays {
    Number(f64),
    Text(String),
}

impl ProcessingDays {
    /// The value as a finite number of days, if it is one.
    ///
    /// Numeric text (`" 170 "`) parses; anything else, including NaN and
    /// infinities, is `None`.
    pub fn as_days(&self) -> Option<f64> {
        let days = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        days.is_finite().then_some(days)
    }
}

impl From<f64> for ProcessingDays {
    fn from(days: f64) -> Self {
        Self::Number(days)
    }
}

/// A record together with its score and resolved company recap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: InputRecord,
    pub breakdown: ScoreBreakdown,
    pub recap: String,
}
