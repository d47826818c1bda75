/// Arrow schema definitions for scored clearance output.
pub mod scored {
    use arrow::datatypes::{DataType, Field, Schema};

    /// Column order of a scored-record batch.
    pub const COLUMNS: &[&str] = &[
        "record_id",
        "applicant_name",
        "device_name",
        "advisory_committee_code",
        "product_code",
        "submission_type_code",
        "country",
        "decision_date",
        "final_score",
        "category",
        "ac_weight",
        "pc_weight",
        "keyword_weight",
        "submission_type_weight",
        "processing_time_weight",
        "geography_weight",
        "negative_factor",
        "synergy_bonus",
        "recap",
    ];

    /// One row per scored record.
    pub fn scored_record_schema() -> Schema {
        Schema::new(vec![
            Field::new("record_id", DataType::Utf8, false),
            Field::new("applicant_name", DataType::Utf8, true),
            Field::new("device_name", DataType::Utf8, true),
            Field::new("advisory_committee_code", DataType::Utf8, true),
            Field::new("product_code", DataType::Utf8, true),
            Field::new("submission_type_code", DataType::Utf8, true),
            Field::new("country", DataType::Utf8, true),
            Field::new("decision_date", DataType::Utf8, true),
            Field::new("final_score", DataType::Float64, false),
            Field::new("category", DataType::Utf8, false),
            Field::new("ac_weight", DataType::Float64, false),
            Field::new("pc_weight", DataType::Float64, false),
            Field::new("keyword_weight", DataType::Float64, false),
            Field::new("submission_type_weight", DataType::Float64, false),
            Field::new("processing_time_weight", DataType::Float64, false),
            Field::new("geography_weight", DataType::Float64, false),
            Field::new("negative_factor", DataType::Float64, false),
            Field::new("synergy_bonus", DataType::Float64, false),
            Field::new("recap", DataType::Utf8, false),
        ])
    }
}
