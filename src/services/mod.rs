//! Service layer for brokercrawl business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be used by the CLI or embedded in another process.

pub mod crawl;
pub mod orchestrator;
pub mod report;
pub mod scheduler;

use thiserror::Error;

pub use crawl::{BulkConfig, BulkResult, CrawlService, ScrapeOutcome};
pub use orchestrator::{OrchestratorStatus, ScrapeOptions, ScrapeOrchestrator};
pub use report::{build_report, format_rate, CategoryBatch};
pub use scheduler::Scheduler;

/// Errors from the crawl service.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid crawl configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("A scrape run is already in progress")]
    AlreadyRunning,
    #[error("No URLs to scrape for the selected categories")]
    NoTargets,
    #[error(transparent)]
    Crawl(#[from] CrawlError),
}
