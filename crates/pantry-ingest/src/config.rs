//! Ingestion run configuration
//!
//! Defaults target the public FoodData Central API. `from_env` layers the
//! environment on top of the defaults, and CLI flags are applied last through
//! the `with_*` setters.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default FoodData Central base URL
pub const DEFAULT_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";

/// Public key accepted by api.data.gov with a small hourly quota
pub const DEMO_API_KEY: &str = "DEMO_KEY";

/// Hourly request quota of a registered key
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 1000;

/// Hourly request quota of [`DEMO_API_KEY`]
pub const DEMO_REQUESTS_PER_HOUR: u32 = 30;

/// Largest page the search endpoint serves
pub const MAX_PAGE_SIZE: u32 = 200;

/// Upper bound for the writer batch size
pub const MAX_BATCH_SIZE: usize = 1000;

/// Data types ingested when none are configured, in ingestion order
pub const DEFAULT_DATA_TYPES: [&str; 4] = ["Foundation", "SR Legacy", "Survey (FNDDS)", "Branded"];

/// Configuration for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// API key; `None` falls back to [`DEMO_API_KEY`]
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    /// Partitions, processed in this order
    pub data_types: Vec<String>,
    pub page_size: u32,
    pub batch_size: usize,
    /// `None` derives the rate from the key (registered or demo)
    pub requests_per_hour: Option<u32>,
    pub timeout_secs: u64,
    /// HTTP attempts per request, including the first
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Extra attempts the orchestrator makes on a page after a transient failure
    pub page_retry_budget: u32,
    /// Pause between page retries
    pub page_retry_delay_ms: u64,
    pub checkpoint_path: PathBuf,
    /// Optional cap on pages per partition (None for unlimited)
    pub max_pages_per_data_type: Option<u32>,
    /// Consecutive checkpoint save failures tolerated before aborting
    pub max_save_failures: u32,
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            data_types: DEFAULT_DATA_TYPES.iter().map(|s| s.to_string()).collect(),
            page_size: MAX_PAGE_SIZE,
            batch_size: 100,
            requests_per_hour: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            page_retry_budget: 3,
            page_retry_delay_ms: 5000,
            checkpoint_path: PathBuf::from("./data/ingest-checkpoint.json"),
            max_pages_per_data_type: None,
            max_save_failures: 5,
            database_url: None,
            database_max_connections: 5,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with whatever is set in the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`IngestConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(key) = get("FDC_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(url) = get("FDC_BASE_URL") {
            config.base_url = url;
        }
        if let Some(types) = get("FDC_DATA_TYPES") {
            config.data_types = parse_data_types(&types);
        }
        if let Some(v) = get("FDC_PAGE_SIZE") {
            config.page_size = parse_var("FDC_PAGE_SIZE", &v)?;
        }
        if let Some(v) = get("INGEST_BATCH_SIZE") {
            config.batch_size = parse_var("INGEST_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("FDC_REQUESTS_PER_HOUR") {
            config.requests_per_hour = Some(parse_var("FDC_REQUESTS_PER_HOUR", &v)?);
        }
        if let Some(v) = get("FDC_TIMEOUT_SECS") {
            config.timeout_secs = parse_var("FDC_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("FDC_MAX_RETRIES") {
            config.max_retries = parse_var("FDC_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("FDC_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = parse_var("FDC_RETRY_BASE_DELAY_MS", &v)?;
        }
        if let Some(v) = get("INGEST_PAGE_RETRY_BUDGET") {
            config.page_retry_budget = parse_var("INGEST_PAGE_RETRY_BUDGET", &v)?;
        }
        if let Some(path) = get("INGEST_CHECKPOINT_PATH") {
            config.checkpoint_path = PathBuf::from(path);
        }
        if let Some(v) = get("INGEST_MAX_PAGES_PER_DATA_TYPE") {
            config.max_pages_per_data_type = Some(parse_var("INGEST_MAX_PAGES_PER_DATA_TYPE", &v)?);
        }
        if let Some(v) = get("INGEST_MAX_SAVE_FAILURES") {
            config.max_save_failures = parse_var("INGEST_MAX_SAVE_FAILURES", &v)?;
        }
        if let Some(url) = get("DATABASE_URL") {
            config.database_url = Some(url);
        }
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            config.database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &v)?;
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_data_types<I, S>(mut self, data_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_types = data_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_requests_per_hour(mut self, requests_per_hour: u32) -> Self {
        self.requests_per_hour = Some(requests_per_hour);
        self
    }

    /// Set HTTP attempts and the base of the exponential backoff
    pub fn with_retry(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Set the orchestrator's per-page retry budget and the pause between attempts
    pub fn with_page_retry(mut self, budget: u32, delay_ms: u64) -> Self {
        self.page_retry_budget = budget;
        self.page_retry_delay_ms = delay_ms;
        self
    }

    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn with_max_pages_per_data_type(mut self, max_pages: u32) -> Self {
        self.max_pages_per_data_type = Some(max_pages);
        self
    }

    pub fn with_max_save_failures(mut self, max_failures: u32) -> Self {
        self.max_save_failures = max_failures;
        self
    }

    /// Key sent with every request
    pub fn effective_api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or(DEMO_API_KEY)
    }

    pub fn uses_demo_key(&self) -> bool {
        self.effective_api_key() == DEMO_API_KEY
    }

    /// Configured rate, or the quota that matches the key
    pub fn effective_requests_per_hour(&self) -> u32 {
        self.requests_per_hour.unwrap_or(if self.uses_demo_key() {
            DEMO_REQUESTS_PER_HOUR
        } else {
            DEFAULT_REQUESTS_PER_HOUR
        })
    }

    /// Minimum spacing between two outbound requests
    pub fn min_request_interval(&self) -> Duration {
        let per_hour = u64::from(self.effective_requests_per_hour().max(1));
        Duration::from_millis(3_600_000_u64.div_ceil(per_hour))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn page_retry_delay(&self) -> Duration {
        Duration::from_millis(self.page_retry_delay_ms)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(IngestError::config("base URL must not be empty"));
        }
        if self.data_types.is_empty() {
            return Err(IngestError::config("at least one data type is required"));
        }
        if self.data_types.iter().any(|t| t.trim().is_empty()) {
            return Err(IngestError::config("data types must not be blank"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(IngestError::config(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::config(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.requests_per_hour == Some(0) {
            return Err(IngestError::config("requests per hour must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(IngestError::config("timeout must be positive"));
        }
        if self.max_retries == 0 {
            return Err(IngestError::config("max retries must be at least 1"));
        }
        if self.max_pages_per_data_type == Some(0) {
            return Err(IngestError::config("page cap must be positive when set"));
        }
        if self.max_save_failures == 0 {
            return Err(IngestError::config("max save failures must be at least 1"));
        }
        if self.database_max_connections == 0 {
            return Err(IngestError::config("database pool needs at least one connection"));
        }
        Ok(())
    }
}

/// Split a comma-separated data-type list, dropping blanks
pub fn parse_data_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| IngestError::config(format!("{} has an invalid value: '{}'", key, value)))
}
