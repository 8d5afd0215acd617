//! Facility detail fetch: one component for full runs and for retrying the
//! ids a previous run missed.

mod detail;
mod listing;

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::UnitDetails;

pub use detail::DetailPageParser;
pub use listing::ListingHarvester;

pub const UNIT_ID_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(20),
            pause: Duration::from_millis(800),
        }
    }
}

/// Runs `operation` up to `policy.attempts` times with a fixed sleep between
/// failed attempts, returning the last error when every attempt fails.
pub fn with_retry<T, F>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(error) => {
                debug!(attempt, attempts, error = %error, "attempt failed");
                last_error = Some(error);
                if attempt < attempts && !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("operation was not attempted")))
}

pub trait PageSource {
    fn fetch_text(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::blocking::Client,
    policy: RetryPolicy,
}

impl HttpPageSource {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(policy.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, policy })
    }

    fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("unexpected HTTP status: {url}"))?;
        let body = response
            .bytes()
            .with_context(|| format!("failed to read response body: {url}"))?;

        Ok(decode_body(&body))
    }
}

impl PageSource for HttpPageSource {
    fn fetch_text(&self, url: &str) -> Result<String> {
        with_retry(&self.policy, |_| self.fetch_once(url))
    }
}

/// UTF-8 when valid, otherwise Latin-1.
pub fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}

/// One detail page to fetch. `unit_code` is the municipality code followed by
/// the unit id, the value detail links carry in `VCo_Unidade`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub unit_id: String,
    pub unit_code: String,
}

impl FetchTarget {
    /// Target for a code harvested from a listing page, kept as linked.
    pub fn from_unit_code(unit_code: &str) -> Self {
        let unit_code = unit_code.trim();
        let id_start = unit_code
            .char_indices()
            .rev()
            .nth(UNIT_ID_LEN - 1)
            .map_or(0, |(index, _)| index);
        Self {
            unit_id: unit_code[id_start..].to_string(),
            unit_code: unit_code.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailEndpoint {
    pub base_url: String,
    pub municipality_code: String,
}

impl DetailEndpoint {
    /// Target for a bare unit id inside the configured municipality.
    pub fn target(&self, unit_id: &str) -> FetchTarget {
        let unit_id = unit_id.trim();
        FetchTarget {
            unit_id: unit_id.to_string(),
            unit_code: format!("{}{}", self.municipality_code, unit_id),
        }
    }

    pub fn url_for(&self, target: &FetchTarget) -> String {
        let separator = if self.base_url.ends_with('/') { "" } else { "/" };
        format!(
            "{}{}Exibe_Ficha_Estabelecimento.asp?VCo_Unidade={}",
            self.base_url, separator, target.unit_code
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub unit_id: String,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub details: UnitDetails,
    pub failures: Vec<FetchFailure>,
}

pub fn fetch_details<S: PageSource>(
    source: &S,
    endpoint: &DetailEndpoint,
    parser: &DetailPageParser,
    targets: &[FetchTarget],
    pause: Duration,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();

    for (index, target) in targets.iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            thread::sleep(pause);
        }

        let unit_id = &target.unit_id;
        let url = endpoint.url_for(target);
        match source.fetch_text(&url) {
            Ok(html) => {
                let mut fields = parser.parse(&html);
                fields.insert("detail_url".to_string(), url);
                info!(unit_id = %unit_id, fields = fields.len(), "fetched unit detail");
                outcome.details.insert(unit_id.clone(), fields);
            }
            Err(error) => {
                warn!(unit_id = %unit_id, url = %url, error = %error, "unit detail fetch failed");
                outcome.failures.push(FetchFailure {
                    unit_id: unit_id.clone(),
                    url,
                    error: format!("{error:#}"),
                });
            }
        }
    }

    outcome
}
