//! Run report archived after every orchestrator run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_urls: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage formatted with two decimals, e.g. "82.00".
    pub success_rate_pct: String,
    pub duration_ms: u64,
}

/// Totals for one category batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate_pct: String,
    pub review_pages: usize,
    pub method_stats: BTreeMap<String, usize>,
    pub duration_ms: u64,
}

/// An error string and how often it occurred during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub error: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    /// Category the recommendation is about, if any.
    pub category: Option<String>,
    pub message: String,
}

/// Immutable report of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    pub summary: ReportSummary,
    pub per_category: BTreeMap<String, CategoryReport>,
    /// Most frequent error strings, descending.
    pub top_errors: Vec<ErrorCount>,
    pub recommendations: Vec<Recommendation>,
    pub next_steps: Vec<String>,
}

impl ScrapeReport {
    /// Build a report stamped with a fresh id and the current time.
    pub fn new(
        summary: ReportSummary,
        per_category: BTreeMap<String, CategoryReport>,
        top_errors: Vec<ErrorCount>,
        recommendations: Vec<Recommendation>,
        next_steps: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            summary,
            per_category,
            top_errors,
            recommendations,
            next_steps,
        }
    }

    /// Whether any recommendation is flagged high priority.
    pub fn has_high_priority(&self) -> bool {
        self.recommendations
            .iter()
            .any(|r| r.priority == RecommendationPriority::High)
    }
}
