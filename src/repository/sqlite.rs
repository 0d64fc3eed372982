//! SQLite-backed record store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{RecordFilter, RecordStore, RepositoryError, Result};
use crate::models::{CrawlRecord, FetchStrategyKind, PageType, ScrapeReport};

const RECORD_COLUMNS: &str = "url, http_status, raw_html, text_content, metadata, structured_data,
     content_hash, fetch_strategy, page_type, fetched_at";

/// Stores records and reports in a single SQLite file.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrent access
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // Set busy timeout for lock contention
        conn.busy_timeout(Duration::from_secs(5))?;

        Self::with_connection(conn)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    /// Initialize database tables.
    fn init_tables(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_records (
                url TEXT PRIMARY KEY,
                http_status INTEGER NOT NULL,
                raw_html TEXT,
                text_content TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                structured_data TEXT NOT NULL,
                content_hash TEXT,
                fetch_strategy TEXT NOT NULL,
                page_type TEXT NOT NULL,
                success INTEGER NOT NULL,
                fetched_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_crawl_records_fetched_at
                ON crawl_records(fetched_at);

            CREATE TABLE IF NOT EXISTS scrape_reports (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                report TEXT NOT NULL
            );
        "#,
        )?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
        Ok(RawRecord {
            url: row.get(0)?,
            http_status: row.get::<_, i64>(1)?,
            raw_html: row.get(2)?,
            text_content: row.get(3)?,
            metadata: row.get(4)?,
            structured_data: row.get(5)?,
            content_hash: row.get(6)?,
            fetch_strategy: row.get(7)?,
            page_type: row.get(8)?,
            fetched_at: row.get(9)?,
        })
    }
}

/// Timestamps are stored in one fixed format so text comparison orders them.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Column values as read, before decoding.
struct RawRecord {
    url: String,
    http_status: i64,
    raw_html: Option<String>,
    text_content: Option<String>,
    metadata: String,
    structured_data: String,
    content_hash: Option<String>,
    fetch_strategy: String,
    page_type: String,
    fetched_at: String,
}

impl TryFrom<RawRecord> for CrawlRecord {
    type Error = RepositoryError;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let fetch_strategy = FetchStrategyKind::from_str(&raw.fetch_strategy).ok_or_else(|| {
            RepositoryError::InvalidData(format!("fetch strategy {:?}", raw.fetch_strategy))
        })?;
        let page_type = PageType::from_str(&raw.page_type)
            .ok_or_else(|| RepositoryError::InvalidData(format!("page type {:?}", raw.page_type)))?;
        let fetched_at = DateTime::parse_from_rfc3339(&raw.fetched_at)
            .map_err(|e| RepositoryError::InvalidData(format!("fetched_at: {}", e)))?
            .with_timezone(&Utc);
        let http_status = u16::try_from(raw.http_status)
            .map_err(|_| RepositoryError::InvalidData(format!("http status {}", raw.http_status)))?;

        Ok(CrawlRecord {
            url: raw.url,
            http_status,
            raw_html: raw.raw_html,
            text_content: raw.text_content,
            metadata: serde_json::from_str(&raw.metadata)?,
            structured_data: serde_json::from_str(&raw.structured_data)?,
            content_hash: raw.content_hash,
            fetch_strategy,
            page_type,
            fetched_at,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert(&self, record: &CrawlRecord) -> Result<()> {
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let structured_json = serde_json::to_string(&record.structured_data)?;
        let fetched_at = format_timestamp(&record.fetched_at);
        let conn = self.lock()?;

        conn.execute(
            r#"INSERT INTO crawl_records (url, http_status, raw_html, text_content, metadata,
                   structured_data, content_hash, fetch_strategy, page_type, success, fetched_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
               ON CONFLICT(url) DO UPDATE SET
                   http_status = excluded.http_status,
                   raw_html = excluded.raw_html,
                   text_content = excluded.text_content,
                   metadata = excluded.metadata,
                   structured_data = excluded.structured_data,
                   content_hash = excluded.content_hash,
                   fetch_strategy = excluded.fetch_strategy,
                   page_type = excluded.page_type,
                   success = excluded.success,
                   fetched_at = excluded.fetched_at"#,
            params![
                record.url,
                record.http_status as i64,
                record.raw_html,
                record.text_content,
                metadata_json,
                structured_json,
                record.content_hash,
                record.fetch_strategy.as_str(),
                record.page_type.as_str(),
                record.is_success() as i32,
                fetched_at,
            ],
        )?;

        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Option<CrawlRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM crawl_records WHERE url = ?", RECORD_COLUMNS),
                params![url],
                Self::row_to_record,
            )
            .optional()?;

        raw.map(CrawlRecord::try_from).transpose()
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<CrawlRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(min) = filter.min_status {
            clauses.push("http_status >= ?");
            values.push(Value::Integer(min as i64));
        }
        if let Some(max) = filter.max_status {
            clauses.push("http_status <= ?");
            values.push(Value::Integer(max as i64));
        }
        if let Some(ref needle) = filter.url_contains {
            clauses.push("instr(url, ?) > 0");
            values.push(Value::Text(needle.clone()));
        }
        if let Some(ref needle) = filter.text_contains {
            clauses.push("instr(text_content, ?) > 0");
            values.push(Value::Text(needle.clone()));
        }
        if let Some(ref after) = filter.fetched_after {
            clauses.push("fetched_at > ?");
            values.push(Value::Text(format_timestamp(after)));
        }
        if let Some(success) = filter.success {
            clauses.push("success = ?");
            values.push(Value::Integer(success as i64));
        }

        let mut sql = format!("SELECT {} FROM crawl_records", RECORD_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY fetched_at DESC, url ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(CrawlRecord::try_from).collect()
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM crawl_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn insert_report(&self, report: &ScrapeReport) -> Result<()> {
        let report_json = serde_json::to_string(report)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO scrape_reports (id, created_at, report) VALUES (?1, ?2, ?3)",
            params![
                report.id.to_string(),
                format_timestamp(&report.timestamp),
                report_json
            ],
        )?;

        Ok(())
    }

    async fn latest_report(&self) -> Result<Option<ScrapeReport>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT report FROM scrape_reports ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::extract::extract_structured_data;
    use crate::models::{ErrorType, RecordPayload, ReportSummary};
    use tempfile::tempdir;

    fn fetched(url: &str, html: &str) -> CrawlRecord {
        CrawlRecord::fetched(
            url.to_string(),
            200,
            html.to_string(),
            "text".to_string(),
            BTreeMap::from([("title".to_string(), "Title".to_string())]),
            extract_structured_data(html, url),
            FetchStrategyKind::EnhancedDirect,
            PageType::General,
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SqliteRecordStore::new(&dir.path().join("crawl.db")).unwrap();

        let record = fetched("https://example.com/", "<p>hello</p>");
        store.upsert(&record).await.unwrap();
        store.upsert(&record).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.content_hash, record.content_hash);
        assert_eq!(stored.metadata.get("title").map(String::as_str), Some("Title"));
        assert!(stored.is_success());
    }

    #[tokio::test]
    async fn test_page_with_nan_rating_reads_back() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let html = r#"<script type="application/ld+json">
            {"aggregateRating": {"ratingValue": "NaN", "bestRating": 5}}</script>"#;
        store
            .upsert(&fetched("https://example.com/nan", html))
            .await
            .unwrap();

        let stored = store.get("https://example.com/nan").await.unwrap().unwrap();
        match stored.structured_data {
            RecordPayload::Extracted(payload) => {
                assert!(!payload.ratings.contains_key("rating_value"));
                assert_eq!(payload.ratings.get("best_rating"), Some(&5.0));
            }
            RecordPayload::Failure { .. } => panic!("expected extracted payload"),
        }
        assert_eq!(store.query(&RecordFilter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_overwrites_success() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .upsert(&fetched("https://example.com/a", "<p>a</p>"))
            .await
            .unwrap();
        store
            .upsert(&CrawlRecord::failed(
                "https://example.com/a".to_string(),
                0,
                "Request timeout after 30s".to_string(),
                ErrorType::Timeout,
                FetchStrategyKind::AllMethodsFailed,
                PageType::General,
            ))
            .await
            .unwrap();

        let stored = store.get("https://example.com/a").await.unwrap().unwrap();
        assert!(!stored.is_success());
        assert!(stored.raw_html.is_none());
        assert_eq!(stored.fetch_strategy, FetchStrategyKind::AllMethodsFailed);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .upsert(&fetched("https://example.com/brokers/a", "<p>a</p>"))
            .await
            .unwrap();
        store
            .upsert(&fetched("https://example.com/news/b", "<p>b</p>"))
            .await
            .unwrap();
        store
            .upsert(&CrawlRecord::failed(
                "https://example.com/brokers/c".to_string(),
                503,
                "Rejected HTTP status 503".to_string(),
                ErrorType::HttpStatus,
                FetchStrategyKind::AllMethodsFailed,
                PageType::General,
            ))
            .await
            .unwrap();

        let brokers = store
            .query(&RecordFilter::new().url_contains("/brokers/"))
            .await
            .unwrap();
        assert_eq!(brokers.len(), 2);

        let ok = store.query(&RecordFilter::new().successes()).await.unwrap();
        assert_eq!(ok.len(), 2);

        let errors = store
            .query(&RecordFilter::new().status_between(500, 599))
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error(), Some("Rejected HTTP status 503"));

        let limited = store.query(&RecordFilter::new().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        let texts = store
            .query(&RecordFilter::new().text_contains("text"))
            .await
            .unwrap();
        assert_eq!(texts.len(), 2);
    }

    #[tokio::test]
    async fn test_reports_roundtrip() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        assert!(store.latest_report().await.unwrap().is_none());

        let report = ScrapeReport::new(
            ReportSummary {
                total_urls: 10,
                successful: 9,
                failed: 1,
                success_rate_pct: "90.00".to_string(),
                duration_ms: 1200,
            },
            BTreeMap::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        store.insert_report(&report).await.unwrap();

        let latest = store.latest_report().await.unwrap().unwrap();
        assert_eq!(latest.id, report.id);
        assert_eq!(latest.summary.success_rate_pct, "90.00");
    }
}
