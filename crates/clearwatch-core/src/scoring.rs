//! Multi-factor relevance scoring for clearance records.
//!
//! A record's score is the sum of six component weights (advisory committee,
//! product code, keyword, submission type, processing time, geography), a
//! negative factor for cosmetic/diagnostic devices, and a synergy bonus,
//! divided by a fixed normalization constant and floored at zero.
//!
//! Scoring is a pure function of the record, the tables, and the config: the
//! same inputs always produce bit-identical output.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::ScoringConfig;
use crate::record::{InputRecord, ScoredRecord};
use crate::tables::ScoringTables;

/// Relevance bucket derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    High,
    Moderate,
    Low,
    AlmostNone,
    /// The record could not be scored.
    Error,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::High,
        Self::Moderate,
        Self::Low,
        Self::AlmostNone,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
            Self::AlmostNone => "Almost None",
            Self::Error => "Error",
        }
    }

    /// Bucket a non-negative score.
    ///
    /// `> high` is High, `[moderate, high]` Moderate, `[low, moderate)` Low,
    /// anything else AlmostNone. A NaN score lands in AlmostNone; the engine
    /// never passes one.
    pub fn from_score(score: f64, config: &ScoringConfig) -> Self {
        if score > config.high_threshold {
            Self::High
        } else if score >= config.moderate_threshold {
            Self::Moderate
        } else if score >= config.low_threshold {
            Self::Low
        } else {
            Self::AlmostNone
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub ac: f64,
    pub pc: f64,
    pub keyword: f64,
    pub submission_type: f64,
    pub processing_time: f64,
    pub geography: f64,
}

impl ComponentWeights {
    fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("ac", self.ac),
            ("pc", self.pc),
            ("keyword", self.keyword),
            ("submission_type", self.submission_type),
            ("processing_time", self.processing_time),
            ("geography", self.geography),
        ]
        .into_iter()
    }
}

/// Full result of scoring one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub final_score: f64,
    pub category: Category,
    pub components: ComponentWeights,
    pub negative_factor: f64,
    pub synergy_bonus: f64,
}

impl ScoreBreakdown {
    /// Sentinel for a record that could not be scored: all zero, `Error`.
    pub fn error() -> Self {
        Self {
            final_score: 0.0,
            category: Category::Error,
            components: ComponentWeights::default(),
            negative_factor: 0.0,
            synergy_bonus: 0.0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.category == Category::Error
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordScoringError {
    #[error("{component} weight is not a finite number ({value})")]
    NonFiniteWeight { component: &'static str, value: f64 },

    #[error("{factor} is not a finite number ({value})")]
    NonFiniteFactor { factor: &'static str, value: f64 },

    #[error("normalization constant must be positive and finite, got {0}")]
    BadNormalization(f64),

    #[error("record could not be read: {0}")]
    Unconvertible(String),
}

/// Scores records against a fixed set of tables.
pub struct ScoringEngine<'a> {
    tables: &'a ScoringTables,
    config: &'a ScoringConfig,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(tables: &'a ScoringTables, config: &'a ScoringConfig) -> Self {
        Self { tables, config }
    }

    /// Score one record. Failures degrade to [`ScoreBreakdown::error`] and
    /// are logged; they never propagate.
    pub fn score(&self, record: &InputRecord) -> ScoreBreakdown {
        match self.try_score(record) {
            Ok(breakdown) => breakdown,
            Err(e) => {
                warn!(record_id = %record.record_id, error = %e, "record could not be scored");
                ScoreBreakdown::error()
            }
        }
    }

    /// Score records in input order, pairing each with an empty recap.
    pub fn score_all(&self, records: &[InputRecord]) -> Vec<ScoredRecord> {
        records
            .iter()
            .map(|record| ScoredRecord {
                record: record.clone(),
                breakdown: self.score(record),
                recap: String::new(),
            })
            .collect()
    }

    pub fn try_score(&self, record: &InputRecord) -> Result<ScoreBreakdown, RecordScoringError> {
        let cfg = self.config;
        let t = self.tables;

        if let Some(reason) = &record.conversion_error {
            return Err(RecordScoringError::Unconvertible(reason.clone()));
        }
        if !(cfg.normalization.is_finite() && cfg.normalization > 0.0) {
            return Err(RecordScoringError::BadNormalization(cfg.normalization));
        }

        let blob = record.search_blob();
        let high_value = t.high_value.matches(&blob);

        let components = ComponentWeights {
            ac: t
                .advisory_committee
                .get_or_default(record.advisory_committee_code.as_deref()),
            pc: t.product_code.get_or_default(record.product_code.as_deref()),
            keyword: if high_value {
                cfg.keyword_match_weight
            } else {
                cfg.keyword_miss_weight
            },
            submission_type: t
                .submission_type
                .get_or_default(record.submission_type_code.as_deref()),
            processing_time: self.processing_time_weight(record),
            geography: self.geography_weight(record.country.as_deref()),
        };
        for (component, value) in components.iter() {
            if !value.is_finite() {
                return Err(RecordScoringError::NonFiniteWeight { component, value });
            }
        }

        let negative_factor = self.negative_factor(&blob);
        let synergy_bonus = match record.advisory_committee_code.as_deref() {
            Some(ac) if high_value && cfg.is_synergy_committee(ac) => cfg.synergy_bonus,
            _ => 0.0,
        };
        for (factor, value) in [
            ("negative factor", negative_factor),
            ("synergy bonus", synergy_bonus),
        ] {
            if !value.is_finite() {
                return Err(RecordScoringError::NonFiniteFactor { factor, value });
            }
        }

        // Fixed summation order keeps results bit-identical across runs.
        let sum = components.ac
            + components.pc
            + components.keyword
            + components.submission_type
            + components.processing_time
            + components.geography
            + negative_factor
            + synergy_bonus;
        let normalized = sum / cfg.normalization;
        let final_score = if normalized > 0.0 { normalized } else { 0.0 };

        Ok(ScoreBreakdown {
            final_score,
            category: Category::from_score(final_score, cfg),
            components,
            negative_factor,
            synergy_bonus,
        })
    }

    fn processing_time_weight(&self, record: &InputRecord) -> f64 {
        let cfg = self.config;
        match record.processing_days.as_ref().and_then(|d| d.as_days()) {
            Some(days) if days > cfg.slow_review_days => cfg.slow_review_weight,
            Some(days) if days >= cfg.medium_review_days => cfg.medium_review_weight,
            _ => cfg.fast_review_weight,
        }
    }

    fn geography_weight(&self, country: Option<&str>) -> f64 {
        match country {
            Some(c) if c.trim().eq_ignore_ascii_case(&self.config.domestic_country) => {
                self.config.domestic_weight
            }
            _ => self.config.foreign_weight,
        }
    }

    /// Cosmetic and diagnostic penalties stack; a therapeutic match cancels both.
    fn negative_factor(&self, blob: &str) -> f64 {
        let t = self.tables;
        if t.therapeutic.matches(blob) {
            return 0.0;
        }
        let mut factor = 0.0;
        if t.cosmetic.matches(blob) {
            factor += self.config.cosmetic_penalty;
        }
        if t.diagnostic.matches(blob) {
            factor += self.config.diagnostic_penalty;
        }
        factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ProcessingDays;
    use crate::tables::{KeywordSet, WeightTable, names};

    fn tables() -> ScoringTables {
        let config = ScoringConfig::default();
        let mut t = ScoringTables::empty(&config);
        t.advisory_committee = {
            let mut w = WeightTable::new(names::ADVISORY_COMMITTEE, config.ac_default);
            w.insert("OR", 0.8);
            w.insert("NE", 0.7);
            w.insert("CV", 0.5);
            w
        };
        t.submission_type = {
            let mut w = WeightTable::new(names::SUBMISSION_TYPE, config.submission_type_default);
            w.insert("2", 0.4);
            w
        };
        t.high_value = KeywordSet::new(names::HIGH_VALUE, ["robotic", "navigation"]);
        t.cosmetic = KeywordSet::new(names::COSMETIC, ["wrinkle", "hair removal"]);
        t.diagnostic = KeywordSet::new(names::DIAGNOSTIC, ["assay", "reagent"]);
        t.therapeutic = KeywordSet::new(names::THERAPEUTIC, ["treatment of", "therapy"]);
        t
    }

    fn record(ac: &str, device: &str) -> InputRecord {
        InputRecord {
            record_id: "K250001".into(),
            advisory_committee_code: Some(ac.into()),
            product_code: Some("ZZZ".into()),
            submission_type_code: Some("9".into()),
            country: Some("US".into()),
            processing_days: Some(ProcessingDays::Number(200.0)),
            device_name: Some(device.into()),
            statement_text: None,
            applicant_name: Some("Acme Corp".into()),
            decision_date: None,
            conversion_error: None,
        }
    }

    fn score(t: &ScoringTables, r: &InputRecord) -> ScoreBreakdown {
        let config = ScoringConfig::default();
        ScoringEngine::new(t, &config).score(r)
    }

    #[test]
    fn worked_example_with_synergy() {
        let t = tables();
        let b = score(&t, &record("OR", "Robotic Spinal System"));

        assert_eq!(b.components.ac, 0.8);
        assert_eq!(b.components.pc, 0.2);
        assert_eq!(b.components.keyword, 0.85);
        assert_eq!(b.components.submission_type, 0.6);
        assert_eq!(b.components.processing_time, 0.65);
        assert_eq!(b.components.geography, 0.6);
        assert_eq!(b.synergy_bonus, 0.15);
        assert_eq!(b.negative_factor, 0.0);

        let expected = (0.8 + 0.2 + 0.85 + 0.6 + 0.65 + 0.6 + 0.0 + 0.15) / 6.0;
        assert_eq!(b.final_score, expected);
        assert_eq!(b.category, Category::High);
    }

    #[test]
    fn no_synergy_without_keyword_match() {
        let t = tables();
        let b = score(&t, &record("OR", "Bone Screw"));
        assert_eq!(b.components.keyword, 0.2);
        assert_eq!(b.synergy_bonus, 0.0);
    }

    #[test]
    fn no_synergy_outside_allow_list() {
        let t = tables();
        let b = score(&t, &record("CV", "Robotic catheter"));
        assert_eq!(b.components.keyword, 0.85);
        assert_eq!(b.synergy_bonus, 0.0);
    }

    #[test]
    fn processing_time_tiers() {
        let t = tables();
        let cases: &[(Option<ProcessingDays>, f64)] = &[
            (Some(200.0.into()), 0.65),
            (Some(172.5.into()), 0.65),
            (Some(172.0.into()), 0.60),
            (Some(162.0.into()), 0.60),
            (Some(161.9.into()), 0.50),
            (Some(0.0.into()), 0.50),
            (Some(ProcessingDays::Text("165".into())), 0.60),
            (Some(ProcessingDays::Text("n/a".into())), 0.50),
            (None, 0.50),
        ];
        for (days, expected) in cases {
            let mut r = record("CV", "Bone Screw");
            r.processing_days = days.clone();
            let b = score(&t, &r);
            assert_eq!(
                b.components.processing_time, *expected,
                "processing_days {days:?}"
            );
        }
    }

    #[test]
    fn geography_domestic_is_case_insensitive() {
        let t = tables();
        let mut r = record("CV", "Bone Screw");
        for (country, expected) in [
            (Some("us"), 0.6),
            (Some(" US "), 0.6),
            (Some("DE"), 0.5),
            (None, 0.5),
        ] {
            r.country = country.map(str::to_string);
            assert_eq!(score(&t, &r).components.geography, expected);
        }
    }

    #[test]
    fn keyword_found_in_statement_text() {
        let t = tables();
        let mut r = record("OR", "Pedicle Screw");
        r.statement_text = Some("Intended for use with a NAVIGATION platform".into());
        assert_eq!(score(&t, &r).components.keyword, 0.85);
    }

    #[test]
    fn cosmetic_and_diagnostic_penalties_stack() {
        let t = tables();
        let cosmetic = score(&t, &record("CV", "Laser hair removal device"));
        assert_eq!(cosmetic.negative_factor, -2.0);

        let diagnostic = score(&t, &record("CV", "Troponin assay"));
        assert_eq!(diagnostic.negative_factor, -0.2);

        let both = score(&t, &record("CV", "Wrinkle assay kit"));
        assert_eq!(both.negative_factor, -2.0 + -0.2);
    }

    #[test]
    fn therapeutic_match_suppresses_penalties() {
        let t = tables();
        let b = score(
            &t,
            &record("CV", "Laser for wrinkle and reagent-free treatment of acne"),
        );
        assert_eq!(b.negative_factor, 0.0);
    }

    #[test]
    fn final_score_is_floored_at_zero() {
        let t = tables();
        let mut r = record("XX", "Wrinkle assay");
        r.country = Some("FR".into());
        r.processing_days = None;
        let b = score(&t, &r);
        // Cosmetic and diagnostic both hit: 0.2 + 0.2 + 0.2 + 0.6 + 0.5 + 0.5 - 2.2.
        assert_eq!(b.negative_factor, -2.2);
        assert_eq!(b.final_score, 0.0);
        assert_eq!(b.category, Category::AlmostNone);
    }

    #[test]
    fn heavy_penalty_never_goes_negative() {
        let mut t = tables();
        let config = ScoringConfig {
            cosmetic_penalty: -50.0,
            ..ScoringConfig::default()
        };
        t.high_value = KeywordSet::empty(names::HIGH_VALUE);
        let b = ScoringEngine::new(&t, &config).score(&record("OR", "wrinkle filler"));
        assert_eq!(b.final_score, 0.0);
        assert!(b.final_score.is_sign_positive());
    }

    #[test]
    fn category_partition() {
        let cfg = ScoringConfig::default();
        assert_eq!(Category::from_score(0.0, &cfg), Category::AlmostNone);
        assert_eq!(Category::from_score(0.399_999, &cfg), Category::AlmostNone);
        assert_eq!(Category::from_score(0.4, &cfg), Category::Low);
        assert_eq!(Category::from_score(0.499_999, &cfg), Category::Low);
        assert_eq!(Category::from_score(0.5, &cfg), Category::Moderate);
        assert_eq!(Category::from_score(0.6, &cfg), Category::Moderate);
        assert_eq!(Category::from_score(0.600_001, &cfg), Category::High);
        assert_eq!(Category::from_score(42.0, &cfg), Category::High);
    }

    #[test]
    fn category_partition_is_total_over_a_sweep() {
        let cfg = ScoringConfig::default();
        for i in 0..=2000 {
            let s = i as f64 / 1000.0;
            let c = Category::from_score(s, &cfg);
            let expected = if s > 0.6 {
                Category::High
            } else if s >= 0.5 {
                Category::Moderate
            } else if s >= 0.4 {
                Category::Low
            } else {
                Category::AlmostNone
            };
            assert_eq!(c, expected, "score {s}");
            assert_ne!(c, Category::Error);
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let t = tables();
        let r = record("NE", "Navigation system for wrinkle assay");
        let first = score(&t, &r);
        for _ in 0..10 {
            let again = score(&t, &r.clone());
            assert_eq!(again.final_score.to_bits(), first.final_score.to_bits());
            assert_eq!(again, first);
        }
    }

    #[test]
    fn non_finite_weight_yields_error_sentinel() {
        let mut t = tables();
        t.advisory_committee.insert("OR", f64::NAN);
        let config = ScoringConfig::default();
        let engine = ScoringEngine::new(&t, &config);
        let r = record("OR", "Robotic arm");

        let err = engine.try_score(&r).unwrap_err();
        assert!(matches!(
            err,
            RecordScoringError::NonFiniteWeight { component: "ac", .. }
        ));

        let b = engine.score(&r);
        assert_eq!(b, ScoreBreakdown::error());
        assert!(b.is_error());
    }

    #[test]
    fn bad_normalization_yields_error_sentinel() {
        let t = tables();
        let config = ScoringConfig {
            normalization: 0.0,
            ..ScoringConfig::default()
        };
        let b = ScoringEngine::new(&t, &config).score(&record("OR", "Robotic"));
        assert_eq!(b.category, Category::Error);
    }

    #[test]
    fn unreadable_record_yields_error_sentinel() {
        let t = tables();
        let config = ScoringConfig::default();
        let engine = ScoringEngine::new(&t, &config);
        let mut r = record("OR", "Robotic Spinal System");
        r.conversion_error = Some("invalid type: integer `840`".into());

        let err = engine.try_score(&r).unwrap_err();
        assert!(matches!(err, RecordScoringError::Unconvertible(_)));
        assert_eq!(engine.score(&r), ScoreBreakdown::error());
    }

    #[test]
    fn score_all_keeps_input_order() {
        let t = tables();
        let config = ScoringConfig::default();
        let records = vec![record("OR", "Robotic"), record("CV", "Wrinkle cream applicator")];
        let scored = ScoringEngine::new(&t, &config).score_all(&records);
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].record, records[0]);
        assert_eq!(scored[1].record, records[1]);
        assert_eq!(scored[0].breakdown.category, Category::High);
    }

    #[test]
    fn does_not_mutate_record() {
        let t = tables();
        let r = record("OR", "Robotic");
        let before = r.clone();
        let _ = score(&t, &r);
        assert_eq!(r, before);
    }
}
