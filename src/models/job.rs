//! URL categories and the transient job tracked while a batch runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse URL grouping that drives per-group fetch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlCategory {
    Priority,
    Broker,
    Review,
    Regulatory,
    News,
}

impl UrlCategory {
    /// Batch order used by the orchestrator.
    pub const RUN_ORDER: [UrlCategory; 5] = [
        UrlCategory::Priority,
        UrlCategory::Broker,
        UrlCategory::Review,
        UrlCategory::Regulatory,
        UrlCategory::News,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Broker => "broker",
            Self::Review => "review",
            Self::Regulatory => "regulatory",
            Self::News => "news",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "priority" => Some(Self::Priority),
            "broker" | "brokers" => Some(Self::Broker),
            "review" | "reviews" => Some(Self::Review),
            "regulatory" | "regulation" => Some(Self::Regulatory),
            "news" => Some(Self::News),
            _ => None,
        }
    }

    /// Parse a category name, treating unknown names as broker pages.
    pub fn from_str_or_broker(s: &str) -> Self {
        Self::from_str(s).unwrap_or(Self::Broker)
    }

    /// Guess a category from the shape of a discovered URL.
    pub fn classify(url: &str) -> Self {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_else(|_| url.to_lowercase());

        if path.contains("/broker-reviews/") || path.contains("/review") {
            Self::Review
        } else if path.contains("regulat") || path.contains("/license") {
            Self::Regulatory
        } else if path.contains("/news/") || path.contains("/blog/") {
            Self::News
        } else {
            Self::Broker
        }
    }
}

impl std::fmt::Display for UrlCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The batch currently being processed. One at a time per orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub category: UrlCategory,
    pub total_urls: usize,
    pub processed_urls: usize,
    pub start_time: DateTime<Utc>,
}

impl ScrapeJob {
    pub fn new(category: UrlCategory, total_urls: usize) -> Self {
        Self {
            category,
            total_urls,
            processed_urls: 0,
            start_time: Utc::now(),
        }
    }
}
