//! Review page annotations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Best-effort fields pulled from a broker review page.
///
/// Produced only for URLs that pass the review-page heuristic and never
/// persisted on its own; it rides along with the scrape outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewData {
    pub url: String,
    pub title: Option<String>,
    pub rating: Option<f64>,
    pub last_updated: Option<String>,
    /// Normalized heading key -> text up to the next heading.
    pub sections: BTreeMap<String, String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

impl ReviewData {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}
