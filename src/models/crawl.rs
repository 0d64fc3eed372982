//! Crawl record models: the persisted outcome of one fetch attempt for one URL.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::content_hash;

/// Which tier of the fetch chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategyKind {
    /// Remote fetch-proxy service.
    PrimaryProxy,
    /// Direct GET with browser-like headers.
    EnhancedDirect,
    /// Direct GET with minimal headers.
    BasicDirect,
    /// Every tier was tried and none produced content.
    AllMethodsFailed,
}

impl FetchStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryProxy => "primary_proxy",
            Self::EnhancedDirect => "enhanced_direct",
            Self::BasicDirect => "basic_direct",
            Self::AllMethodsFailed => "all_methods_failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "primary_proxy" => Some(Self::PrimaryProxy),
            "enhanced_direct" => Some(Self::EnhancedDirect),
            "basic_direct" => Some(Self::BasicDirect),
            "all_methods_failed" => Some(Self::AllMethodsFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for FetchStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected kind of page, based on the URL shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Review,
    General,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "review" => Some(Self::Review),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Coarse classification of why a fetch or scrape failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Timeout,
    RateLimited,
    HttpStatus,
    EmptyResponse,
    Network,
    Panic,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::HttpStatus => "http_status",
            Self::EmptyResponse => "empty_response",
            Self::Network => "network",
            Self::Panic => "panic",
            Self::Unknown => "unknown",
        }
    }

    /// Classify a failure from its message and the last observed status.
    pub fn classify(message: &str, status: u16) -> Self {
        let lower = message.to_lowercase();
        if status == 429 || lower.contains("429") || lower.contains("rate limit") {
            Self::RateLimited
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout
        } else if lower.contains("empty") {
            Self::EmptyResponse
        } else if lower.contains("panic") {
            Self::Panic
        } else if status >= 400 || lower.contains("http status") {
            Self::HttpStatus
        } else if lower.contains("connect") || lower.contains("network") || lower.contains("dns") {
            Self::Network
        } else {
            Self::Unknown
        }
    }
}

/// Contact details found on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    /// Platform name -> profile links.
    pub social_links: BTreeMap<String, Vec<String>>,
}

/// Structured data extracted from a successfully fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPayload {
    pub url: String,
    pub extracted_at: DateTime<Utc>,
    /// Every JSON-LD block that parsed, in document order.
    pub json_ld: Vec<serde_json::Value>,
    /// Signal category -> context snippets around keyword hits.
    pub broker_signals: BTreeMap<String, Vec<String>>,
    pub contact: ContactInfo,
    pub ratings: BTreeMap<String, f64>,
}

/// What gets stored in a record's structured data column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Extracted(StructuredPayload),
    Failure { error: String, error_type: ErrorType },
}

/// Persisted outcome of the latest fetch attempt for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// Unique key in the record store.
    pub url: String,
    /// Observed HTTP status, 0 when no response was received.
    pub http_status: u16,
    pub raw_html: Option<String>,
    pub text_content: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub structured_data: RecordPayload,
    pub content_hash: Option<String>,
    pub fetch_strategy: FetchStrategyKind,
    pub page_type: PageType,
    pub fetched_at: DateTime<Utc>,
}

impl CrawlRecord {
    /// Create a record for a page that was fetched and extracted.
    #[allow(clippy::too_many_arguments)]
    pub fn fetched(
        url: String,
        http_status: u16,
        raw_html: String,
        text_content: String,
        metadata: BTreeMap<String, String>,
        payload: StructuredPayload,
        fetch_strategy: FetchStrategyKind,
        page_type: PageType,
    ) -> Self {
        let hash = content_hash(raw_html.as_bytes());
        Self {
            url,
            http_status,
            raw_html: Some(raw_html),
            text_content: Some(text_content),
            metadata,
            structured_data: RecordPayload::Extracted(payload),
            content_hash: Some(hash),
            fetch_strategy,
            page_type,
            fetched_at: Utc::now(),
        }
    }

    /// Create a record for a failed attempt. Content stays empty.
    pub fn failed(
        url: String,
        http_status: u16,
        error: String,
        error_type: ErrorType,
        fetch_strategy: FetchStrategyKind,
        page_type: PageType,
    ) -> Self {
        Self {
            url,
            http_status,
            raw_html: None,
            text_content: None,
            metadata: BTreeMap::new(),
            structured_data: RecordPayload::Failure { error, error_type },
            content_hash: None,
            fetch_strategy,
            page_type,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.structured_data, RecordPayload::Extracted(_))
    }

    /// Error message for failed records.
    pub fn error(&self) -> Option<&str> {
        match &self.structured_data {
            RecordPayload::Failure { error, .. } => Some(error),
            RecordPayload::Extracted(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_roundtrip() {
        for kind in [
            FetchStrategyKind::PrimaryProxy,
            FetchStrategyKind::EnhancedDirect,
            FetchStrategyKind::BasicDirect,
            FetchStrategyKind::AllMethodsFailed,
        ] {
            assert_eq!(FetchStrategyKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(FetchStrategyKind::from_str("bogus"), None);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(ErrorType::classify("request timed out", 0), ErrorType::Timeout);
        assert_eq!(ErrorType::classify("HTTP status 429", 429), ErrorType::RateLimited);
        assert_eq!(ErrorType::classify("Rate limit exceeded", 0), ErrorType::RateLimited);
        assert_eq!(ErrorType::classify("empty response body", 200), ErrorType::EmptyResponse);
        assert_eq!(ErrorType::classify("HTTP status 503", 503), ErrorType::HttpStatus);
        assert_eq!(ErrorType::classify("error trying to connect", 0), ErrorType::Network);
        assert_eq!(ErrorType::classify("something odd", 0), ErrorType::Unknown);
    }

    #[test]
    fn test_failed_record_has_no_content() {
        let record = CrawlRecord::failed(
            "https://example.com/".to_string(),
            0,
            "timeout".to_string(),
            ErrorType::Timeout,
            FetchStrategyKind::AllMethodsFailed,
            PageType::General,
        );
        assert!(!record.is_success());
        assert!(record.raw_html.is_none());
        assert!(record.content_hash.is_none());
        assert_eq!(record.error(), Some("timeout"));
    }
}
