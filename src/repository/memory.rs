//! In-memory record store for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordFilter, RecordStore, Result};
use crate::models::{CrawlRecord, ScrapeReport};

/// Keeps everything in process memory; contents vanish on drop.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, CrawlRecord>>,
    reports: RwLock<Vec<ScrapeReport>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All archived reports, oldest first.
    pub async fn reports(&self) -> Vec<ScrapeReport> {
        self.reports.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert(&self, record: &CrawlRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Option<CrawlRecord>> {
        Ok(self.records.read().await.get(url).cloned())
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<CrawlRecord>> {
        let records = self.records.read().await;
        let mut matched: Vec<CrawlRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            b.fetched_at
                .cmp(&a.fetched_at)
                .then_with(|| a.url.cmp(&b.url))
        });
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn insert_report(&self, report: &ScrapeReport) -> Result<()> {
        self.reports.write().await.push(report.clone());
        Ok(())
    }

    async fn latest_report(&self) -> Result<Option<ScrapeReport>> {
        Ok(self.reports.read().await.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorType, FetchStrategyKind, PageType};

    fn failed(url: &str) -> CrawlRecord {
        CrawlRecord::failed(
            url.to_string(),
            0,
            "Request timeout after 30s".to_string(),
            ErrorType::Timeout,
            FetchStrategyKind::AllMethodsFailed,
            PageType::General,
        )
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_url() {
        let store = InMemoryRecordStore::new();
        store.upsert(&failed("https://example.com/a")).await.unwrap();
        store.upsert(&failed("https://example.com/a")).await.unwrap();
        store.upsert(&failed("https://example.com/b")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.get("https://example.com/a").await.unwrap().is_some());
        assert!(store.get("https://example.com/z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_limit_and_filter() {
        let store = InMemoryRecordStore::new();
        for i in 0..5 {
            store
                .upsert(&failed(&format!("https://example.com/{}", i)))
                .await
                .unwrap();
        }

        let all = store.query(&RecordFilter::new().failures()).await.unwrap();
        assert_eq!(all.len(), 5);
        let some = store.query(&RecordFilter::new().limit(2)).await.unwrap();
        assert_eq!(some.len(), 2);
        let none = store.query(&RecordFilter::new().successes()).await.unwrap();
        assert!(none.is_empty());
    }
}
