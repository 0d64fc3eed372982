//! Run report construction.

use std::collections::{BTreeMap, HashMap};

use super::crawl::BulkResult;
use crate::models::{
    CategoryReport, ErrorCount, Recommendation, RecommendationPriority, ReportSummary,
    ScrapeReport, UrlCategory,
};

/// Overall success rate below which a tuning recommendation is made.
pub const LOW_OVERALL_RATE_PCT: f64 = 80.0;

/// Per-category success rate below which the category is flagged.
pub const LOW_CATEGORY_RATE_PCT: f64 = 70.0;

/// Number of distinct error strings kept in a report.
pub const TOP_ERRORS: usize = 5;

const NEXT_STEPS: &[&str] = &[
    "Review failed URLs and re-queue any that should be retried",
    "Check review pages for missing ratings or pros/cons",
    "Compare content hashes with the previous run to find changed pages",
    "Adjust category timeouts and delays based on the recommendations",
    "Schedule the next full run",
];

/// One category's bulk result as it enters the report.
#[derive(Debug, Clone)]
pub struct CategoryBatch {
    pub category: UrlCategory,
    pub result: BulkResult,
}

/// `successful / total * 100`, or zero for an empty run.
pub fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64 * 100.0
    }
}

/// Success rate formatted with two decimals.
pub fn format_rate(successful: usize, total: usize) -> String {
    format!("{:.2}", success_rate(successful, total))
}

/// Assemble the report for a finished run.
pub fn build_report(batches: &[CategoryBatch], duration_ms: u64) -> ScrapeReport {
    let total: usize = batches.iter().map(|b| b.result.total).sum();
    let successful: usize = batches.iter().map(|b| b.result.successful).sum();

    let summary = ReportSummary {
        total_urls: total,
        successful,
        failed: total - successful,
        success_rate_pct: format_rate(successful, total),
        duration_ms,
    };

    let per_category: BTreeMap<String, CategoryReport> = batches
        .iter()
        .map(|b| {
            let r = &b.result;
            (
                b.category.as_str().to_string(),
                CategoryReport {
                    total: r.total,
                    successful: r.successful,
                    failed: r.failed,
                    success_rate_pct: r.success_rate_pct.clone(),
                    review_pages: r.review_pages,
                    method_stats: r.method_stats.clone(),
                    duration_ms: r.duration_ms,
                },
            )
        })
        .collect();

    let top_errors = top_errors(batches.iter().flat_map(|b| b.result.errors()));
    let recommendations = recommendations(batches, successful, total);

    ScrapeReport::new(
        summary,
        per_category,
        top_errors,
        recommendations,
        NEXT_STEPS.iter().map(|s| s.to_string()).collect(),
    )
}

/// Count identical error strings and keep the most frequent.
///
/// Ties are broken alphabetically so reports are reproducible.
fn top_errors<'a>(errors: impl Iterator<Item = &'a str>) -> Vec<ErrorCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for error in errors {
        *counts.entry(error).or_default() += 1;
    }

    let mut ranked: Vec<ErrorCount> = counts
        .into_iter()
        .map(|(error, count)| ErrorCount {
            error: error.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.error.cmp(&b.error)));
    ranked.truncate(TOP_ERRORS);
    ranked
}

fn recommendations(batches: &[CategoryBatch], successful: usize, total: usize) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if total > 0 && success_rate(successful, total) < LOW_OVERALL_RATE_PCT {
        recs.push(Recommendation {
            priority: RecommendationPriority::Medium,
            category: None,
            message: format!(
                "Success rate is {}%: reduce concurrency or raise timeout",
                format_rate(successful, total)
            ),
        });
    }

    let lowered: Vec<String> = batches
        .iter()
        .flat_map(|b| b.result.errors())
        .map(str::to_lowercase)
        .collect();

    if lowered.iter().any(|e| e.contains("timeout")) {
        recs.push(Recommendation {
            priority: RecommendationPriority::Medium,
            category: None,
            message: "Timeouts detected: raise per-category timeouts or lower concurrency"
                .to_string(),
        });
    }

    if lowered
        .iter()
        .any(|e| e.contains("rate limit") || e.contains("429"))
    {
        recs.push(Recommendation {
            priority: RecommendationPriority::High,
            category: None,
            message: "Rate limiting detected: increase delays between requests and batches"
                .to_string(),
        });
    }

    for batch in batches {
        let r = &batch.result;
        if r.total > 0 && success_rate(r.successful, r.total) < LOW_CATEGORY_RATE_PCT {
            recs.push(Recommendation {
                priority: RecommendationPriority::Medium,
                category: Some(batch.category.as_str().to_string()),
                message: format!(
                    "Category '{}' succeeded on only {}% of URLs; review its configuration",
                    batch.category, r.success_rate_pct
                ),
            });
        }
    }

    recs
}
