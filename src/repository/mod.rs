//! Record store: where crawl records and run reports are kept.
//!
//! The rest of the crate only sees the [`RecordStore`] trait. Records are keyed
//! by URL and every upsert replaces the previous record for that URL.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{CrawlRecord, ScrapeReport};

pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid stored value: {0}")]
    InvalidData(String),
    #[error("Record store lock poisoned")]
    LockPoisoned,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Persistence contract used by the crawl service and orchestrator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record for `record.url`.
    async fn upsert(&self, record: &CrawlRecord) -> Result<()>;

    async fn get(&self, url: &str) -> Result<Option<CrawlRecord>>;

    /// Records matching `filter`, newest first.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<CrawlRecord>>;

    async fn count(&self) -> Result<u64>;

    /// Archive a finished run report.
    async fn insert_report(&self, report: &ScrapeReport) -> Result<()>;

    async fn latest_report(&self) -> Result<Option<ScrapeReport>>;
}

/// Selects records from a store. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub min_status: Option<u16>,
    pub max_status: Option<u16>,
    /// Case-sensitive substring of the URL.
    pub url_contains: Option<String>,
    /// Case-sensitive substring of the extracted text.
    pub text_contains: Option<String>,
    pub fetched_after: Option<DateTime<Utc>>,
    /// `Some(true)` keeps only successes, `Some(false)` only failures.
    pub success: Option<bool>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_between(mut self, min: u16, max: u16) -> Self {
        self.min_status = Some(min);
        self.max_status = Some(max);
        self
    }

    pub fn url_contains(mut self, needle: impl Into<String>) -> Self {
        self.url_contains = Some(needle.into());
        self
    }

    pub fn text_contains(mut self, needle: impl Into<String>) -> Self {
        self.text_contains = Some(needle.into());
        self
    }

    pub fn fetched_after(mut self, after: DateTime<Utc>) -> Self {
        self.fetched_after = Some(after);
        self
    }

    pub fn successes(mut self) -> Self {
        self.success = Some(true);
        self
    }

    pub fn failures(mut self) -> Self {
        self.success = Some(false);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record passes every set condition (ignores `limit`).
    pub fn matches(&self, record: &CrawlRecord) -> bool {
        if self.min_status.is_some_and(|min| record.http_status < min) {
            return false;
        }
        if self.max_status.is_some_and(|max| record.http_status > max) {
            return false;
        }
        if let Some(ref needle) = self.url_contains {
            if !record.url.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(ref needle) = self.text_contains {
            let found = record
                .text_content
                .as_deref()
                .is_some_and(|text| text.contains(needle.as_str()));
            if !found {
                return false;
            }
        }
        if self.fetched_after.is_some_and(|after| record.fetched_at <= after) {
            return false;
        }
        if self.success.is_some_and(|want| record.is_success() != want) {
            return false;
        }
        true
    }
}
