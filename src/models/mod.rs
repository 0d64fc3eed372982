//! Data models shared across fetching, extraction, persistence, and orchestration.

mod crawl;
mod job;
mod report;
mod review;

pub use crawl::{
    ContactInfo, CrawlRecord, ErrorType, FetchStrategyKind, PageType, RecordPayload,
    StructuredPayload,
};
pub use job::{ScrapeJob, UrlCategory};
pub use report::{
    CategoryReport, ErrorCount, Recommendation, RecommendationPriority, ReportSummary,
    ScrapeReport,
};
pub use review::ReviewData;
