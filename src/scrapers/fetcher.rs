//! The ordered fallback chain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::backoff::backoff_delay;
use super::{
    BasicDirectStrategy, EnhancedDirectStrategy, FetchError, FetchOptions, FetchStrategy,
    ProxyConfig, ProxyStrategy,
};
use crate::config::Settings;
use crate::models::{ErrorType, FetchStrategyKind};

/// Outcome of running one URL through the fetch chain.
///
/// `success` holds exactly when `html` is present and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchAttemptResult {
    pub url: String,
    pub success: bool,
    pub html: Option<String>,
    /// Last observed HTTP status, or 0 when no response arrived.
    pub http_status: u16,
    pub strategy: FetchStrategyKind,
    pub error: Option<String>,
    pub error_type: Option<ErrorType>,
}

impl FetchAttemptResult {
    fn fetched(url: &str, status: u16, body: String, strategy: FetchStrategyKind) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            html: Some(body),
            http_status: status,
            strategy,
            error: None,
            error_type: None,
        }
    }

    fn exhausted(url: &str, status: u16, error: String, error_type: ErrorType) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            html: None,
            http_status: status,
            strategy: FetchStrategyKind::AllMethodsFailed,
            error: Some(error),
            error_type: Some(error_type),
        }
    }
}

/// Retrieves pages through an ordered list of fetch tiers.
#[derive(Clone)]
pub struct PageFetcher {
    strategies: Vec<Arc<dyn FetchStrategy>>,
}

impl PageFetcher {
    /// Build the standard chain: proxy (when configured), enhanced direct, basic direct.
    pub fn new(user_agent: &str, proxy: Option<ProxyConfig>) -> Result<Self, FetchError> {
        let mut strategies: Vec<Arc<dyn FetchStrategy>> = Vec::new();
        if let Some(proxy) = proxy {
            strategies.push(Arc::new(ProxyStrategy::new(proxy)?));
        }
        strategies.push(Arc::new(EnhancedDirectStrategy::new(user_agent)?));
        strategies.push(Arc::new(BasicDirectStrategy::new(user_agent)?));
        Ok(Self { strategies })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        Self::new(&settings.user_agent, settings.proxy.clone())
    }

    /// Use a custom chain, tried in the given order.
    pub fn with_strategies(strategies: Vec<Arc<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_kinds(&self) -> Vec<FetchStrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Fetch a URL, trying every tier in full before moving to the next.
    ///
    /// Never fails: when all tiers are exhausted the result carries the last
    /// error and [`FetchStrategyKind::AllMethodsFailed`].
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchAttemptResult {
        let mut last_error: Option<FetchError> = None;
        let mut last_status: u16 = 0;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let attempts = strategy.max_attempts(options).max(1);

            for attempt in 1..=attempts {
                match strategy.fetch(url, options).await {
                    Ok(page) => {
                        if attempt > 1 || last_error.is_some() {
                            info!("Fetched {} via {} (attempt {})", url, kind, attempt);
                        }
                        return FetchAttemptResult::fetched(url, page.status, page.body, kind);
                    }
                    Err(e) => {
                        debug!("{} attempt {}/{} for {} failed: {}", kind, attempt, attempts, url, e);
                        if let Some(status) = e.status() {
                            last_status = status;
                        }
                        let wait = e
                            .retry_after()
                            .unwrap_or_else(|| backoff_delay(attempt, options.backoff_base, options.backoff_cap));
                        last_error = Some(e);

                        if attempt < attempts {
                            sleep(wait).await;
                        }
                    }
                }
            }

            warn!("{} exhausted for {}, falling back", kind, url);
        }

        let (message, error_type) = match last_error {
            Some(e) => (e.to_string(), e.error_type()),
            None => (
                "no fetch strategies configured".to_string(),
                ErrorType::Unknown,
            ),
        };
        warn!("All fetch methods failed for {}: {}", url, message);
        FetchAttemptResult::exhausted(url, last_status, message, error_type)
    }
}
