// src/fetch/mod.rs

pub mod csv;
pub mod jsonstat;
pub mod local;
pub mod multi;

use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, SourceError};

pub use self::csv::{
    fetch_csv, parse_csv, parse_csv_with, validate_records, CsvParse, CsvTyping, DEFAULT_DELIMITER,
};
pub use self::jsonstat::{convert_json_stat, decode_index, fetch_json_stat, is_json_stat};
pub use self::local::load_local;
pub use self::multi::{fetch_multi_csv, MultiCsvData};

/// Run CPU-bound work (CSV parsing, classification) on the blocking pool.
pub async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| SourceError::Task(e.to_string()))
}

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
/// saturating and capped at [`MAX_BACKOFF_MS`].
pub fn backoff_delay(initial_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(initial_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// One failed attempt, and whether trying again could help.
struct Failure {
    error: SourceError,
    retryable: bool,
}

impl Failure {
    fn transient(error: SourceError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: SourceError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

/// Shared HTTP transport: one client with a request timeout, plus retry with
/// exponential backoff. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_retries: u32, initial_backoff_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| SourceError::Config(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_retries,
            initial_backoff_ms,
        })
    }

    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        Self::new(cfg.request_timeout(), cfg.max_retries, cfg.retry_backoff_ms)
    }

    /// GET `url` and return the body as text. Transport errors and 5xx
    /// responses are retried; any other non-success status fails at once.
    pub async fn get_text(&self, url: &str, accept: &str) -> Result<String> {
        let mut attempts: u32 = 0;
        loop {
            match self.get_text_once(url, accept).await {
                Ok(t) => return Ok(t),
                Err(f) if f.retryable && attempts < self.max_retries => {
                    attempts += 1;
                    let delay = backoff_delay(self.initial_backoff_ms, attempts);
                    warn!(
                        %url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %f.error,
                        "retrying"
                    );
                    sleep(delay).await;
                }
                Err(f) => {
                    error!(%url, error = %f.error, "giving up");
                    return Err(f.error);
                }
            }
        }
    }

    async fn get_text_once(&self, url: &str, accept: &str) -> std::result::Result<String, Failure> {
        debug!("fetching text from {}", url);
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| Failure::transient(SourceError::unavailable(url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let error = SourceError::unavailable(url, format!("HTTP status {}", status));
            return Err(if status.is_server_error() {
                Failure::transient(error)
            } else {
                Failure::fatal(error)
            });
        }

        resp.text().await.map_err(|e| {
            Failure::transient(SourceError::unavailable(url, format!("reading body: {}", e)))
        })
    }
}
