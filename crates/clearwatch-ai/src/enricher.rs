//! Company recap generation over an Anthropic-style Messages API.
//!
//! The client is blocking: the pipeline is single-threaded and makes at most
//! one call per cache miss. It owns the whole failure policy for that call:
//! a request timeout, one retry on transient failures (timeouts, 429, 5xx),
//! and a minimum interval between requests.

use std::cell::Cell;
use std::time::{Duration, Instant};

use clearwatch_core::{EnrichmentClient, EnrichmentError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

// ── Prompt templates ──

const SYSTEM_PROMPT: &str = "\
You write short factual company profiles for a medical device market analyst.

Given the name of a company that has just received a device clearance, describe in at most \
three sentences what the company makes, where it is based, and whether it is public, \
private, or a subsidiary.

Respond with plain text only. No markdown, no preamble. If you do not recognise the \
company, say so in one sentence rather than guessing.";

fn build_user_prompt(company_name: &str) -> String {
    format!("Company: {company_name}")
}

/// Tunables for [`LlmEnricher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnricherConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Minimum gap between two requests, in milliseconds.
    pub min_interval_ms: u64,
    /// Attempts after the first one, for transient failures only.
    pub retries: u32,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 300,
            timeout_secs: 30,
            min_interval_ms: 1_000,
            retries: 1,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Blocking LLM client producing company recaps.
pub struct LlmEnricher {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    config: EnricherConfig,
    last_request: Cell<Option<Instant>>,
}

impl LlmEnricher {
    /// Build a client. A missing `api_key` is not an error here; every
    /// `summarize` call then fails with `MissingCredential`.
    pub fn new(api_key: Option<String>, config: EnricherConfig) -> Result<Self, EnrichmentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        info!(
            model = %config.model,
            timeout_secs = config.timeout_secs,
            has_key = api_key.is_some(),
            "enrichment client ready"
        );
        Ok(Self {
            client,
            api_key,
            config: EnricherConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            last_request: Cell::new(None),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Sleep until `min_interval_ms` has passed since the previous request.
    fn throttle(&self) {
        let interval = Duration::from_millis(self.config.min_interval_ms);
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < interval {
                let wait = interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limiting enrichment");
                std::thread::sleep(wait);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    fn request_once(&self, api_key: &str, company_name: &str) -> Result<String, EnrichmentError> {
        self.throttle();

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: build_user_prompt(company_name),
            }],
        };

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let text = resp.text().map_err(classify)?;
        parse_response(&text)
    }
}

impl EnrichmentClient for LlmEnricher {
    fn summarize(&self, company_name: &str) -> Result<String, EnrichmentError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EnrichmentError::MissingCredential(API_KEY_ENV.to_string()))?;

        let mut attempt = 0;
        loop {
            match self.request_once(api_key, company_name) {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.config.retries && is_transient(&e) => {
                    attempt += 1;
                    warn!(company = company_name, kind = e.kind(), attempt, "retrying enrichment");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn classify(e: reqwest::Error) -> EnrichmentError {
    if e.is_timeout() {
        EnrichmentError::Timeout
    } else if e.is_decode() {
        EnrichmentError::Malformed(e.to_string())
    } else {
        EnrichmentError::Http(e.to_string())
    }
}

fn is_transient(e: &EnrichmentError) -> bool {
    match e {
        EnrichmentError::Timeout | EnrichmentError::Http(_) => true,
        EnrichmentError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Concatenate the text blocks of a Messages API response.
fn parse_response(body: &str) -> Result<String, EnrichmentError> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|e| EnrichmentError::Malformed(e.to_string()))?;
    let text = parsed
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        return Err(EnrichmentError::EmptyResponse);
    }
    Ok(text.to_string())
}
