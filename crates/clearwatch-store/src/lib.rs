//! Storage layer: two-tier recap cache, JSON table/cache stores, Parquet output.

mod error;
pub use error::StoreError;

pub mod json;
pub mod output;
pub mod recap;

pub use json::{JsonCacheStore, JsonTableDir};
pub use output::{read_parquet, scored_to_batch, write_scored_parquet};
pub use recap::{
    CacheStats, DurableCacheStore, INVALID_APPLICANT, NEEDS_RESEARCH, RecapCache, RecapCacheEntry,
};
