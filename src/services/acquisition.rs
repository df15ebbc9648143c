//! Boundary to the external product acquisition (scraping) service.
//!
//! The service answers with a `{success, data?, error?, retryCount, durationMs}`
//! envelope. It is converted into [`FetchOutcome`] at the edge so the rest of the
//! engine only ever sees a tagged success or failure.

use crate::error::{AppError, AppResult};
use crate::models::{Market, ProductObservation};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionErrorCode {
    Captcha,
    Timeout,
    NotFound,
    Blocked,
    Other,
}

impl AcquisitionErrorCode {
    /// Lenient parse of the codes the service reports; anything unknown is `Other`
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "captcha" => AcquisitionErrorCode::Captcha,
            "timeout" => AcquisitionErrorCode::Timeout,
            "not_found" | "notfound" => AcquisitionErrorCode::NotFound,
            "blocked" | "rate_limited" => AcquisitionErrorCode::Blocked,
            _ => AcquisitionErrorCode::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionErrorCode::Captcha => "captcha",
            AcquisitionErrorCode::Timeout => "timeout",
            AcquisitionErrorCode::NotFound => "not_found",
            AcquisitionErrorCode::Blocked => "blocked",
            AcquisitionErrorCode::Other => "other",
        }
    }
}

impl fmt::Display for AcquisitionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionError {
    pub code: AcquisitionErrorCode,
    pub message: String,
}

impl AcquisitionError {
    pub fn new(code: AcquisitionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            AcquisitionErrorCode::Timeout
        } else {
            AcquisitionErrorCode::Other
        };
        Self::new(code, err.to_string())
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<AcquisitionError> for AppError {
    fn from(err: AcquisitionError) -> Self {
        AppError::Acquisition {
            code: err.code.as_str().to_string(),
            message: err.message,
        }
    }
}

/// Result of one acquisition call, with the collaborator's own retry and timing figures
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success {
        data: T,
        retry_count: u32,
        duration_ms: u64,
    },
    Failure {
        error: AcquisitionError,
        retry_count: u32,
        duration_ms: u64,
    },
}

impl<T> FetchOutcome<T> {
    pub fn success(data: T) -> Self {
        FetchOutcome::Success {
            data,
            retry_count: 0,
            duration_ms: 0,
        }
    }

    pub fn failure(code: AcquisitionErrorCode, message: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            error: AcquisitionError::new(code, message),
            retry_count: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            FetchOutcome::Success { retry_count, .. } | FetchOutcome::Failure { retry_count, .. } => *retry_count,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            FetchOutcome::Success { duration_ms, .. } | FetchOutcome::Failure { duration_ms, .. } => *duration_ms,
        }
    }

    pub fn into_result(self) -> AppResult<T> {
        match self {
            FetchOutcome::Success { data, .. } => Ok(data),
            FetchOutcome::Failure { error, .. } => Err(error.into()),
        }
    }
}

/// Item ids discovered under a category reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListing {
    pub item_ids: Vec<String>,
    pub market: Market,
    #[serde(rename = "ref")]
    pub category_ref: String,
    pub total: usize,
}

/// Source of product observations and category listings
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_product(&self, item_id: &str, market: Market) -> FetchOutcome<ProductObservation>;

    async fn fetch_category(&self, category_ref: &str, market: Market, max_items: usize) -> FetchOutcome<CategoryListing>;
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<WireError>,
    #[serde(default)]
    retry_count: u32,
    duration_ms: Option<u64>,
}

impl<T> Envelope<T> {
    fn into_outcome(self, measured_ms: u64) -> FetchOutcome<T> {
        let duration_ms = self.duration_ms.unwrap_or(measured_ms);
        let retry_count = self.retry_count;

        match (self.success, self.data) {
            (true, Some(data)) => FetchOutcome::Success {
                data,
                retry_count,
                duration_ms,
            },
            (true, None) => FetchOutcome::Failure {
                error: AcquisitionError::new(AcquisitionErrorCode::Other, "success response without data"),
                retry_count,
                duration_ms,
            },
            (false, _) => {
                let error = self
                    .error
                    .map(|e| AcquisitionError::new(AcquisitionErrorCode::from_str(&e.code), e.message))
                    .unwrap_or_else(|| AcquisitionError::new(AcquisitionErrorCode::Other, "unspecified failure"));
                FetchOutcome::Failure {
                    error,
                    retry_count,
                    duration_ms,
                }
            }
        }
    }
}

/// JSON-over-HTTP client for the acquisition service with its own concurrency ceiling
pub struct HttpProductSource {
    client: Client,
    base_url: Url,
    permits: Arc<Semaphore>,
}

impl HttpProductSource {
    pub fn new(base_url: &str, max_concurrency: usize, timeout: Duration) -> AppResult<Self> {
        if max_concurrency == 0 {
            return Err(AppError::Config("Acquisition concurrency must be greater than 0".to_string()));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid acquisition URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!("Acquisition URL {} cannot carry a path", base_url)));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            permits: Arc::new(Semaphore::new(max_concurrency)),
        })
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AcquisitionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AcquisitionError::new(AcquisitionErrorCode::Other, "acquisition URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> FetchOutcome<T> {
        let started = Instant::now();
        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FetchOutcome::failure(AcquisitionErrorCode::Other, "acquisition client is closed"),
        };

        debug!(url = %url, "Acquisition request");
        let response = match self.client.get(url.clone()).query(query).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, "Acquisition transport error: {}", e);
                return FetchOutcome::Failure {
                    error: AcquisitionError::from_transport(e),
                    retry_count: 0,
                    duration_ms: elapsed(started),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let code = match status {
                StatusCode::NOT_FOUND => AcquisitionErrorCode::NotFound,
                StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => AcquisitionErrorCode::Blocked,
                StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AcquisitionErrorCode::Timeout,
                _ => AcquisitionErrorCode::Other,
            };
            return FetchOutcome::Failure {
                error: AcquisitionError::new(code, format!("acquisition service returned {}", status)),
                retry_count: 0,
                duration_ms: elapsed(started),
            };
        }

        match response.json::<Envelope<T>>().await {
            Ok(envelope) => envelope.into_outcome(elapsed(started)),
            Err(e) => FetchOutcome::Failure {
                error: AcquisitionError::from_transport(e),
                retry_count: 0,
                duration_ms: elapsed(started),
            },
        }
    }
}

#[async_trait]
impl ProductSource for HttpProductSource {
    async fn fetch_product(&self, item_id: &str, market: Market) -> FetchOutcome<ProductObservation> {
        match self.endpoint(&["products", market.as_str(), item_id]) {
            Ok(url) => self.get(url, &[]).await,
            Err(error) => FetchOutcome::Failure {
                error,
                retry_count: 0,
                duration_ms: 0,
            },
        }
    }

    async fn fetch_category(&self, category_ref: &str, market: Market, max_items: usize) -> FetchOutcome<CategoryListing> {
        match self.endpoint(&["categories", market.as_str(), category_ref]) {
            Ok(url) => self.get(url, &[("max_items", max_items.to_string())]).await,
            Err(error) => FetchOutcome::Failure {
                error,
                retry_count: 0,
                duration_ms: 0,
            },
        }
    }
}
