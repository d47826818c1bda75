//! AI layer: LLM-generated company recaps for cache misses.

mod enricher;
pub use enricher::{API_KEY_ENV, EnricherConfig, LlmEnricher};
