//! Page retrieval: the tiered fetch chain, concurrency limiting, and sitemap discovery.
//!
//! A [`PageFetcher`] walks an ordered list of [`FetchStrategy`] tiers. Remote
//! failures never escape as errors; they come back as a failed
//! [`FetchAttemptResult`] so callers can store and count them like any other
//! outcome.

pub mod backoff;
mod direct;
mod fetcher;
mod limiter;
mod proxy;
mod sitemap;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::CategoryConfig;
use crate::models::{ErrorType, FetchStrategyKind};

pub use direct::{BasicDirectStrategy, EnhancedDirectStrategy};
pub use fetcher::{FetchAttemptResult, PageFetcher};
pub use limiter::ConcurrencyLimiter;
pub use proxy::{ProxyConfig, ProxyStrategy};
pub use sitemap::{parse_sitemap, SitemapCollector, SitemapDocument, SitemapError};

/// Errors from a single fetch attempt against one tier.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),
    #[error("Rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Rejected HTTP status {0}")]
    Status(u16),
    #[error("Empty response body (HTTP {0})")]
    EmptyBody(u16),
    #[error("Invalid fetch configuration: {0}")]
    InvalidConfig(String),
}

impl FetchError {
    /// Convert a transport error, keeping timeouts distinguishable.
    pub(crate) fn transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Http(err)
        }
    }

    /// The HTTP status observed when the attempt failed, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::RateLimited { .. } => Some(429),
            Self::Status(code) | Self::EmptyBody(code) => Some(*code),
            Self::Timeout(_) | Self::InvalidConfig(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Timeout(_) => ErrorType::Timeout,
            Self::RateLimited { .. } => ErrorType::RateLimited,
            Self::Status(_) => ErrorType::HttpStatus,
            Self::EmptyBody(_) => ErrorType::EmptyResponse,
            Self::Http(e) if e.is_timeout() => ErrorType::Timeout,
            Self::Http(_) => ErrorType::Network,
            Self::InvalidConfig(_) => ErrorType::Unknown,
        }
    }
}

/// Per-call fetch settings, usually derived from a category's configuration.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each individual attempt.
    pub timeout: Duration,
    /// Attempts given to tiers that retry (the proxy tier).
    pub max_retries: u32,
    /// Extra request headers for the enhanced direct tier.
    pub headers: BTreeMap<String, String>,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            headers: BTreeMap::new(),
            backoff_base: Duration::from_millis(backoff::DEFAULT_BACKOFF_BASE_MS),
            backoff_cap: Duration::from_millis(backoff::DEFAULT_BACKOFF_CAP_MS),
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }
}

impl From<&CategoryConfig> for FetchOptions {
    fn from(config: &CategoryConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            headers: config.headers.clone(),
            ..Default::default()
        }
    }
}

/// Content returned by a tier that accepted the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// One tier of the fetch chain.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> FetchStrategyKind;

    /// Number of attempts this tier gets before the chain moves on.
    fn max_attempts(&self, _options: &FetchOptions) -> u32 {
        1
    }

    /// Make one attempt. A non-empty body is the only success.
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError>;
}

/// Read a direct-tier response, accepting statuses below `reject_from`.
pub(crate) async fn read_response(
    response: reqwest::Response,
    reject_from: u16,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    let status = response.status().as_u16();
    if status >= reject_from {
        if status == 429 {
            let retry_after = backoff::parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(FetchError::RateLimited { retry_after });
        }
        return Err(FetchError::Status(status));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::transport(e, timeout))?;
    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody(status));
    }

    Ok(FetchedPage { status, body })
}
