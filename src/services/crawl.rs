//! Single-page and bulk scraping.
//!
//! `scrape_page` runs one URL through fetch, extraction, hashing, and the
//! record store. `bulk` fans a list of URLs out under a fresh
//! [`ConcurrencyLimiter`] and folds the outcomes into a [`BulkResult`].

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::report::format_rate;
use super::CrawlError;
use crate::config::CategoryConfig;
use crate::extract::{is_review_url, ParsedPage, ReviewParser};
use crate::models::{
    CrawlRecord, ErrorType, FetchStrategyKind, PageType, RecordPayload, ReviewData,
};
use crate::repository::RecordStore;
use crate::scrapers::{ConcurrencyLimiter, FetchOptions, PageFetcher};

/// Result of scraping one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub url: String,
    pub success: bool,
    pub http_status: u16,
    pub page_type: PageType,
    pub strategy: FetchStrategyKind,
    pub content_hash: Option<String>,
    /// Present for successful review pages.
    pub review: Option<ReviewData>,
    pub error: Option<String>,
    pub error_type: Option<ErrorType>,
    /// Whether the record store accepted the record.
    pub persisted: bool,
}

/// Settings for one bulk call.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Maximum pages in flight. Zero is rejected.
    pub max_concurrent: usize,
    /// Pause after each page while its concurrency slot is still held.
    pub delay: Duration,
    pub fetch: FetchOptions,
}

impl BulkConfig {
    pub fn from_category(config: &CategoryConfig, max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            delay: Duration::from_millis(config.delay_ms),
            fetch: FetchOptions::from(config),
        }
    }
}

/// Aggregated outcome of one bulk call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub review_pages: usize,
    /// Strategy name -> pages it produced (failures count under `all_methods_failed`).
    pub method_stats: BTreeMap<String, usize>,
    pub duration_ms: u64,
    pub success_rate_pct: String,
    /// Per-URL outcomes, in input order.
    pub outcomes: Vec<ScrapeOutcome>,
}

impl BulkResult {
    fn from_outcomes(outcomes: Vec<ScrapeOutcome>, duration: Duration) -> Self {
        let total = outcomes.len();
        let successful = outcomes.iter().filter(|o| o.success).count();
        let review_pages = outcomes
            .iter()
            .filter(|o| o.page_type == PageType::Review)
            .count();

        let mut method_stats: BTreeMap<String, usize> = BTreeMap::new();
        for outcome in &outcomes {
            *method_stats
                .entry(outcome.strategy.as_str().to_string())
                .or_default() += 1;
        }

        Self {
            successful,
            failed: total - successful,
            total,
            review_pages,
            method_stats,
            duration_ms: duration.as_millis() as u64,
            success_rate_pct: format_rate(successful, total),
            outcomes,
        }
    }

    /// Outcomes of pages that were fetched, in input order.
    pub fn successful_outcomes(&self) -> impl Iterator<Item = &ScrapeOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    /// Outcomes of pages that failed, in input order.
    pub fn failed_outcomes(&self) -> impl Iterator<Item = &ScrapeOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// Error messages of failed pages.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| o.error.as_deref())
    }
}

/// Composes fetching, extraction, and persistence.
pub struct CrawlService {
    fetcher: PageFetcher,
    store: Arc<dyn RecordStore>,
}

impl CrawlService {
    pub fn new(fetcher: PageFetcher, store: Arc<dyn RecordStore>) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Fetch, extract, and persist one page.
    ///
    /// Remote failures and store failures are reported in the outcome, never as errors.
    pub async fn scrape_page(&self, url: &str, options: &FetchOptions) -> ScrapeOutcome {
        let page_type = if is_review_url(url) {
            PageType::Review
        } else {
            PageType::General
        };

        let attempt = self.fetcher.fetch(url, options).await;

        let (record, review) = match attempt.html {
            Some(html) if attempt.success => {
                // The DOM is not Send; keep it inside this block.
                let page = ParsedPage::parse(&html);
                let text = page.text();
                let metadata = page.metadata();
                let payload = page.structured_data(url);
                let review = (page_type == PageType::Review)
                    .then(|| ReviewParser::parse_page(&page, url));
                drop(page);

                let record = CrawlRecord::fetched(
                    url.to_string(),
                    attempt.http_status,
                    html,
                    text,
                    metadata,
                    payload,
                    attempt.strategy,
                    page_type,
                );
                (record, review)
            }
            _ => {
                let error = attempt
                    .error
                    .unwrap_or_else(|| "fetch returned no content".to_string());
                let error_type = attempt
                    .error_type
                    .unwrap_or_else(|| ErrorType::classify(&error, attempt.http_status));
                let record = CrawlRecord::failed(
                    url.to_string(),
                    attempt.http_status,
                    error,
                    error_type,
                    attempt.strategy,
                    page_type,
                );
                (record, None)
            }
        };

        let persisted = self.persist(&record).await;
        outcome_for(&record, review, persisted)
    }

    /// Scrape many URLs with at most `config.max_concurrent` in flight.
    ///
    /// Every URL yields an outcome; a panic while scraping one URL becomes a
    /// failure for that URL only.
    pub async fn bulk(&self, urls: &[String], config: &BulkConfig) -> Result<BulkResult, CrawlError> {
        self.bulk_with_progress(urls, config, |_| {}).await
    }

    /// [`bulk`](Self::bulk), calling `on_page` as each page finishes.
    ///
    /// `on_page` runs before the per-page delay, while the page still holds its slot.
    pub async fn bulk_with_progress<F>(
        &self,
        urls: &[String],
        config: &BulkConfig,
        on_page: F,
    ) -> Result<BulkResult, CrawlError>
    where
        F: Fn(&ScrapeOutcome) + Sync,
    {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent).ok_or_else(|| {
            CrawlError::InvalidConfig("max_concurrent must be at least 1".to_string())
        })?;

        let start = Instant::now();
        info!(
            "Scraping {} URLs (max {} concurrent)",
            urls.len(),
            config.max_concurrent
        );

        let on_page = &on_page;
        let tasks = urls.iter().map(|url| {
            let limiter = limiter.clone();
            async move {
                limiter
                    .run(async {
                        let result = AssertUnwindSafe(self.scrape_page(url, &config.fetch))
                            .catch_unwind()
                            .await;
                        let outcome = match result {
                            Ok(outcome) => outcome,
                            Err(panic) => self.record_panic(url, panic).await,
                        };
                        on_page(&outcome);
                        if !config.delay.is_zero() {
                            sleep(config.delay).await;
                        }
                        outcome
                    })
                    .await
            }
        });

        let outcomes = join_all(tasks).await;
        let result = BulkResult::from_outcomes(outcomes, start.elapsed());
        info!(
            "Bulk scrape finished: {}/{} succeeded ({}%) in {}ms",
            result.successful, result.total, result.success_rate_pct, result.duration_ms
        );
        Ok(result)
    }

    async fn record_panic(&self, url: &str, panic: Box<dyn Any + Send>) -> ScrapeOutcome {
        let message = format!("panic while scraping: {}", panic_message(panic.as_ref()));
        warn!("{}: {}", url, message);

        let page_type = if is_review_url(url) {
            PageType::Review
        } else {
            PageType::General
        };
        let record = CrawlRecord::failed(
            url.to_string(),
            0,
            message,
            ErrorType::Panic,
            FetchStrategyKind::AllMethodsFailed,
            page_type,
        );
        let persisted = self.persist(&record).await;
        outcome_for(&record, None, persisted)
    }

    async fn persist(&self, record: &CrawlRecord) -> bool {
        match self.store.upsert(record).await {
            Ok(()) => {
                debug!("Stored record for {}", record.url);
                true
            }
            Err(e) => {
                warn!("Failed to store record for {}: {}", record.url, e);
                false
            }
        }
    }
}

fn outcome_for(record: &CrawlRecord, review: Option<ReviewData>, persisted: bool) -> ScrapeOutcome {
    let error_type = match &record.structured_data {
        RecordPayload::Failure { error_type, .. } => Some(*error_type),
        RecordPayload::Extracted(_) => None,
    };

    ScrapeOutcome {
        url: record.url.clone(),
        success: record.is_success(),
        http_status: record.http_status,
        page_type: record.page_type,
        strategy: record.fetch_strategy,
        content_hash: record.content_hash.clone(),
        review,
        error: record.error().map(str::to_string),
        error_type,
        persisted,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
