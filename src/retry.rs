//! Outbound HTTP policy shared by the embedding, LLM and channel clients
//!
//! Every call gets a hard timeout from the shared `reqwest::Client` and a
//! bounded number of retries with capped exponential backoff and full jitter.
//! Only 429, 500, 502, 503, 504, timeouts and connection failures are retried.

use std::time::Duration;

use rand::Rng;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use tracing::debug;
use tracing::warn;

use crate::config::HttpConfig;
use crate::errors::ShopRagError;
use crate::Result;

/// Build the `reqwest::Client` used by every outbound integration
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .build()
        .map_err(|e| ShopRagError::HttpError(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Policy that fails on the first error
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Upper bound of the sleep before retry number `attempt` (1-based)
    #[must_use]
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ceiling = self.base_backoff.saturating_mul(1u32 << exp);
        ceiling.min(self.max_backoff)
    }

    /// Full jitter: uniform in `[0, ceiling]`
    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }

    /// Send the request produced by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is consumed
    /// by `send`. Returns the first 2xx response; any other final status is
    /// reported as [`ShopRagError::Upstream`] carrying the response body.
    pub async fn send<F>(&self, service: &'static str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let delay = self.jittered_backoff(attempt);
                warn!(service, attempt, delay_ms = delay.as_millis() as u64, "retrying after transient error");
                tokio::time::sleep(delay).await;
            }

            let error = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(service, status = %status, attempt, "response received");
                    if status.is_success() {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    let error = ShopRagError::Upstream {
                        service,
                        status: status.as_u16(),
                        body,
                    };
                    if !is_transient_status(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    ShopRagError::HttpError(format!("{service} request failed: {e}"))
                }
                Err(e) => {
                    return Err(ShopRagError::HttpError(format!(
                        "{service} request failed: {e}"
                    )))
                }
            };

            if attempt >= self.max_retries {
                warn!(service, attempts = attempt + 1, error = %error, "giving up after retries");
                return Err(error);
            }
            attempt += 1;
        }
    }
}

/// Statuses worth retrying
#[must_use]
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}
