//! Rate-limited FoodData Central client

use super::models::{ExternalFoodRecord, FoodSearchResponse};
use crate::config::IngestConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One page of records from a data-type partition
#[derive(Debug, Clone, Default)]
pub struct FoodPage {
    pub data_type: String,
    pub page: u32,
    /// Total hits the API reports for the whole partition
    pub total_hits: u64,
    pub records: Vec<ExternalFoodRecord>,
}

/// A paginated source of external food records
#[async_trait]
pub trait FoodSource: Send + Sync {
    /// Fetch `page` (1-based) of the `data_type` partition
    async fn fetch_page(&self, data_type: &str, page: u32) -> Result<FoodPage, FetchError>;
}

#[async_trait]
impl<S: FoodSource + ?Sized> FoodSource for std::sync::Arc<S> {
    async fn fetch_page(&self, data_type: &str, page: u32) -> Result<FoodPage, FetchError> {
        (**self).fetch_page(data_type, page).await
    }
}

/// HTTP client for the `foods/search` endpoint.
///
/// Outbound calls are spaced at least `min_interval` apart. The gate is a
/// FIFO `tokio::sync::Mutex` holding the instant of the last request, so
/// concurrent callers queue instead of racing past the limit.
pub struct RateLimitedClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    min_interval: Duration,
    max_retries: u32,
    base_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedClient {
    /// Create a client from the run configuration
    pub fn new(config: &IngestConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("pantry-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::fatal(format!("failed to build HTTP client: {}", e), None))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.effective_api_key().to_string(),
            page_size: config.page_size,
            min_interval: config.min_request_interval(),
            max_retries: config.max_retries.max(1),
            base_delay: config.retry_base_delay(),
            last_request: Mutex::new(None),
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn search_url(&self) -> String {
        format!("{}/foods/search", self.base_url)
    }

    /// Wait for the rate gate, then claim the next request slot
    async fn acquire_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Single attempt, no retry
    async fn request_page(&self, data_type: &str, page: u32) -> Result<FoodSearchResponse, FetchError> {
        self.acquire_slot().await;

        let page_size = self.page_size.to_string();
        let page_number = page.to_string();
        let response = self
            .client
            .get(self.search_url())
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("dataType", data_type),
                ("pageSize", page_size.as_str()),
                ("pageNumber", page_number.as_str()),
            ])
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("{} returned {}", data_type, status);
            return Err(if is_retryable_status(status) {
                FetchError::transient(message, Some(status.as_u16()))
            } else {
                FetchError::fatal(message, Some(status.as_u16()))
            });
        }

        let body = response.bytes().await.map_err(|e| {
            FetchError::transient(format!("failed to read response body: {}", e), Some(status.as_u16()))
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            FetchError::fatal(format!("undecodable search response: {}", e), Some(status.as_u16()))
        })
    }
}

#[async_trait]
impl FoodSource for RateLimitedClient {
    async fn fetch_page(&self, data_type: &str, page: u32) -> Result<FoodPage, FetchError> {
        let mut attempt = 1;
        loop {
            match self.request_page(data_type, page).await {
                Ok(response) => {
                    debug!(
                        data_type = %data_type,
                        page = page,
                        records = response.foods.len(),
                        total_hits = response.total_hits,
                        "Fetched page"
                    );
                    return Ok(FoodPage {
                        data_type: data_type.to_string(),
                        page,
                        total_hits: response.total_hits,
                        records: response.foods,
                    });
                },
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = self.base_delay.saturating_mul(2_u32.saturating_pow(attempt - 1));
                    warn!(
                        data_type = %data_type,
                        page = page,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying..."
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_send_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::fatal(format!("invalid request: {}", e), None)
    } else if e.is_timeout() {
        FetchError::transient(format!("request timed out: {}", e), None)
    } else {
        FetchError::transient(format!("network error: {}", e), None)
    }
}
