//! Scoring constants.
//!
//! Every number the scoring engine uses lives here so a host can override
//! them from its settings file. `ScoringConfig::default()` carries the
//! calibrated values the category thresholds were tuned against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub ac_default: f64,
    pub pc_default: f64,
    pub submission_type_default: f64,

    /// Processing days strictly above this fall in the slow tier.
    pub slow_review_days: f64,
    /// Lower bound (inclusive) of the medium tier; upper bound is `slow_review_days`.
    pub medium_review_days: f64,
    pub slow_review_weight: f64,
    pub medium_review_weight: f64,
    pub fast_review_weight: f64,

    /// Country code (case-insensitive) that earns `domestic_weight`.
    pub domestic_country: String,
    pub domestic_weight: f64,
    pub foreign_weight: f64,

    pub keyword_match_weight: f64,
    pub keyword_miss_weight: f64,

    pub cosmetic_penalty: f64,
    pub diagnostic_penalty: f64,

    /// Advisory committees that earn the synergy bonus on a high-value match.
    pub synergy_committees: Vec<String>,
    pub synergy_bonus: f64,

    pub normalization: f64,

    pub high_threshold: f64,
    pub moderate_threshold: f64,
    pub low_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ac_default: 0.2,
            pc_default: 0.2,
            submission_type_default: 0.6,
            slow_review_days: 172.0,
            medium_review_days: 162.0,
            slow_review_weight: 0.65,
            medium_review_weight: 0.60,
            fast_review_weight: 0.50,
            domestic_country: "US".to_string(),
            domestic_weight: 0.6,
            foreign_weight: 0.5,
            keyword_match_weight: 0.85,
            keyword_miss_weight: 0.20,
            cosmetic_penalty: -2.0,
            diagnostic_penalty: -0.2,
            synergy_committees: vec!["OR".to_string(), "NE".to_string()],
            synergy_bonus: 0.15,
            normalization: 6.0,
            high_threshold: 0.6,
            moderate_threshold: 0.5,
            low_threshold: 0.4,
        }
    }
}

impl ScoringConfig {
    /// Whether `code` is one of the synergy committees (case-insensitive).
    pub fn is_synergy_committee(&self, code: &str) -> bool {
        let code = code.trim();
        self.synergy_committees
            .iter()
            .any(|c| c.eq_ignore_ascii_case(code))
    }
}
