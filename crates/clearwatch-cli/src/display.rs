//! Terminal output: scored-record cards, run summaries, guard decisions.
//!
//! Cards render one row of a scored-record batch grouped by section, with
//! type-aware formatting for text and float columns.

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use clearwatch_core::{Category, ReportPeriod, RunGuard, RunGuardDecision};
use clearwatch_pipeline::RunSummary;
use clearwatch_store::RecapCacheEntry;

const RECAP_PREVIEW_CHARS: usize = 240;

// ── Schema section groupings ──

const IDENTITY: &[&str] = &[
    "record_id",
    "applicant_name",
    "device_name",
    "decision_date",
    "country",
];

const CODES: &[&str] = &[
    "advisory_committee_code",
    "product_code",
    "submission_type_code",
];

const SCORE: &[&str] = &["final_score", "category"];

const COMPONENTS: &[&str] = &[
    "ac_weight",
    "pc_weight",
    "keyword_weight",
    "submission_type_weight",
    "processing_time_weight",
    "geography_weight",
    "negative_factor",
    "synergy_bonus",
];

const RECAP: &[&str] = &["recap"];

// ── Public API ──

/// Print every row (up to `limit`) as a vertical card, optionally only rows
/// in `category`.
pub fn print_result_cards(
    batches: &[RecordBatch],
    category: Option<Category>,
    limit: usize,
) -> anyhow::Result<()> {
    let mut shown = 0;
    for batch in batches {
        for row in 0..batch.num_rows() {
            if shown >= limit {
                return Ok(());
            }
            if let Some(want) = category
                && get_utf8(batch, "category", row) != Some(want.as_str())
            {
                continue;
            }
            print_card(batch, row);
            shown += 1;
        }
    }
    if shown == 0 {
        println!("No matching results.");
    }
    Ok(())
}

/// Print result batches as a table.
pub fn print_table(batches: &[RecordBatch]) -> anyhow::Result<()> {
    arrow::util::pretty::print_batches(batches)?;
    Ok(())
}

pub fn print_decision(period: ReportPeriod, guard: &RunGuard, decision: &RunGuardDecision) {
    println!("=== Run guard: {period} ===");
    println!("  {:<26} {}", "mode", decision.mode().as_str());
    println!("  {:<26} {}", "grace_days", guard.grace_days());
    println!("  {:<26} {}", "must_archive", yes_no(decision.must_archive));
    println!(
        "  {:<26} {}",
        "within_grace_window",
        yes_no(decision.within_grace_window)
    );
    println!(
        "  {:<26} {}",
        "is_privileged_user",
        yes_no(decision.is_privileged_user)
    );
    println!("  {:<26} {}", "proceed_full", yes_no(decision.proceed_full));
}

pub fn print_summary(summary: &RunSummary) {
    println!("=== Run complete: {} ===", summary.period);
    println!();

    println!("Records");
    println!("  {:<26} {}", "processed", summary.records_processed);
    for category in Category::ALL {
        println!(
            "  {:<26} {}",
            category.as_str(),
            summary.categories.get(category)
        );
    }
    println!();

    println!("Recap cache");
    println!("  {:<26} {}", "hits", summary.cache.hits);
    println!("  {:<26} {}", "misses", summary.cache.misses);
    println!("  {:<26} {}", "invalid_names", summary.cache.invalid_names);
    println!(
        "  {:<26} {}",
        "enrichment_successes", summary.cache.enrichment_successes
    );
    println!(
        "  {:<26} {}",
        "enrichment_failures", summary.cache.enrichment_failures
    );
    println!("  {:<26} {}", "entries", summary.cache_entries);
    match (&summary.cache_saved, &summary.cache_save_error) {
        (Some(n), _) => println!("  {:<26} {n} entries", "saved"),
        (None, Some(e)) => println!("  {:<26} FAILED: {e}", "saved"),
        (None, None) => println!("  {:<26} no", "saved"),
    }
    println!();

    println!("Outcome");
    println!("  {:<26} {}", "archived", yes_no(summary.archived));
    println!("  {:<26} {}", "cancelled", yes_no(summary.cancelled));
    println!("  {:<26} {:.1}s", "elapsed", summary.elapsed_secs);
}

pub fn print_cache_entries(entries: &[RecapCacheEntry], limit: usize) {
    for entry in entries.iter().take(limit) {
        println!(
            "{}  ({})",
            entry.company_name_key,
            entry.last_updated.format("%Y-%m-%d %H:%M UTC")
        );
        println!("  {}", preview(&entry.recap_text));
    }
    if entries.len() > limit {
        println!("... {} more", entries.len() - limit);
    }
}

// ── Card rendering ──

fn print_card(batch: &RecordBatch, row: usize) {
    let id = get_utf8(batch, "record_id", row).unwrap_or_default();
    let device = get_utf8(batch, "device_name", row).unwrap_or_default();

    println!("=== {id} ===");
    if !device.is_empty() {
        println!("{device}");
    }
    println!();

    print_section(batch, row, "Identity", IDENTITY);
    print_section(batch, row, "Codes", CODES);
    print_section(batch, row, "Score", SCORE);
    print_section(batch, row, "Components", COMPONENTS);
    print_section(batch, row, "Recap", RECAP);
}

fn print_section(batch: &RecordBatch, row: usize, header: &str, cols: &[&str]) {
    let has_data = cols.iter().any(|&col| {
        batch
            .column_by_name(col)
            .is_some_and(|c| !c.is_null(row))
    });
    if !has_data {
        return;
    }

    println!("{header}");
    for &col_name in cols {
        let Some(col) = batch.column_by_name(col_name) else {
            continue;
        };
        if col.is_null(row) {
            continue;
        }
        match col.data_type() {
            DataType::Utf8 => {
                let value = col.as_string::<i32>().value(row);
                if col_name == "recap" {
                    println!("  {}", preview(value));
                } else {
                    println!("  {:<26} {}", col_name, value);
                }
            }
            DataType::Float64 => {
                let value = col.as_primitive::<Float64Type>().value(row);
                println!("  {:<26} {:.4}", col_name, value);
            }
            other => println!("  {:<26} ({other:?})", col_name),
        }
    }
    println!();
}

// ── Helpers ──

fn get_utf8<'a>(batch: &'a RecordBatch, col: &str, row: usize) -> Option<&'a str> {
    let arr = batch.column_by_name(col)?.as_string_opt::<i32>()?;
    (!arr.is_null(row)).then(|| arr.value(row))
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= RECAP_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(RECAP_PREVIEW_CHARS).collect();
    format!("{cut}...")
}
