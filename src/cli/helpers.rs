//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::models::ScrapeReport;
use crate::repository::{RecordStore, SqliteRecordStore};
use crate::scrapers::PageFetcher;
use crate::services::CrawlService;

/// Open the SQLite record store under the data directory.
pub fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn RecordStore>> {
    settings.ensure_directories()?;
    let store = SqliteRecordStore::new(&settings.database_path())?;
    Ok(Arc::new(store))
}

/// Build the crawl service from settings.
pub fn crawl_service(settings: &Settings) -> anyhow::Result<Arc<CrawlService>> {
    let fetcher = PageFetcher::from_settings(settings)?;
    let store = open_store(settings)?;
    Ok(Arc::new(CrawlService::new(fetcher, store)))
}

/// Truncate a string for column display.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

/// Print a report summary with recommendations.
pub fn print_report(report: &ScrapeReport) {
    let summary = &report.summary;
    println!("\n{}", style("Scrape Report").bold());
    println!("{}", "-".repeat(60));
    println!("{:<20} {}", "Report:", report.id);
    println!(
        "{:<20} {}",
        "Finished:",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{:<20} {}", "URLs:", summary.total_urls);
    println!("{:<20} {}", "Successful:", style(summary.successful).green());
    println!("{:<20} {}", "Failed:", style(summary.failed).red());
    println!("{:<20} {}%", "Success rate:", summary.success_rate_pct);
    println!("{:<20} {}ms", "Duration:", summary.duration_ms);

    if !report.per_category.is_empty() {
        println!("\n{:<12} {:>6} {:>6} {:>6} {:>8}", "Category", "Total", "OK", "Fail", "Rate");
        for (name, category) in &report.per_category {
            println!(
                "{:<12} {:>6} {:>6} {:>6} {:>7}%",
                name,
                category.total,
                category.successful,
                category.failed,
                category.success_rate_pct
            );
        }
    }

    if !report.top_errors.is_empty() {
        println!("\n{}", style("Top errors").bold());
        for error in &report.top_errors {
            println!("  {:>4}  {}", error.count, truncate(&error.error, 70));
        }
    }

    if !report.recommendations.is_empty() {
        println!("\n{}", style("Recommendations").bold());
        for rec in &report.recommendations {
            let marker = match rec.priority {
                crate::models::RecommendationPriority::High => style("!").red(),
                _ => style("-").yellow(),
            };
            match &rec.category {
                Some(category) => println!("  {} [{}] {}", marker, category, rec.message),
                None => println!("  {} {}", marker, rec.message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer message", 10), "a much ...");
    }
}
