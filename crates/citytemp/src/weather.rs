//! Weather provider client — current conditions over HTTP.
//!
//! One client instance is shared across the whole refresh fan-out. A
//! semaphore bounds in-flight requests and the reqwest pool bounds
//! keep-alive connections, so a large city list cannot stampede the
//! provider.

use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;

// ── Constants ───────────────────────────────────────────────────────

/// Total attempts per fetch, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Overall per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum concurrent in-flight requests.
const MAX_CONNECTIONS: usize = 10;

/// Maximum idle keep-alive connections.
const MAX_KEEPALIVE: usize = 5;

// ── Errors ──────────────────────────────────────────────────────────

/// Errors from weather fetch operations.
///
/// `Http` and `Status` are transient and retried; `Parse` means the
/// provider answered 2xx with a body we don't understand, which no
/// amount of retrying will fix.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("unexpected payload: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

// ── Wire format ─────────────────────────────────────────────────────

/// Provider response for current conditions.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherPayload {
    pub current: CurrentConditions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentConditions {
    /// Current temperature in degrees Celsius.
    pub temp_c: f64,
}

// ── Client ──────────────────────────────────────────────────────────

/// Reusable client for the external weather provider.
#[derive(Debug)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    permits: Semaphore,
}

impl WeatherClient {
    /// Build a client for the given endpoint and API key.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_KEEPALIVE)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            permits: Semaphore::new(MAX_CONNECTIONS),
        })
    }

    /// Fetch current conditions for a city by name.
    ///
    /// Transient failures (network errors, non-2xx responses) are retried
    /// up to [`MAX_ATTEMPTS`] with a fixed [`RETRY_DELAY`] between
    /// attempts; the last observed failure is returned once attempts are
    /// exhausted. Parse failures are returned immediately.
    pub async fn fetch_current(&self, city_name: &str) -> Result<WeatherPayload> {
        // The semaphore is owned by the client and never closed.
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("weather client semaphore closed");

        for attempt in 1..MAX_ATTEMPTS {
            match self.request_once(city_name).await {
                Ok(payload) => return Ok(payload),
                Err(e @ FetchError::Parse(_)) => return Err(e),
                Err(e) => {
                    log::warn!(
                        "weather fetch for '{}' failed (attempt {}/{}): {}",
                        city_name,
                        attempt,
                        MAX_ATTEMPTS,
                        e
                    );
                }
            }
            tokio::time::sleep(RETRY_DELAY).await;
        }

        // Final attempt; whatever it yields goes to the caller.
        self.request_once(city_name).await
    }

    async fn request_once(&self, city_name: &str) -> Result<WeatherPayload> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("q", city_name)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let payload: WeatherPayload = serde_json::from_str(&text)?;
        Ok(payload)
    }
}
