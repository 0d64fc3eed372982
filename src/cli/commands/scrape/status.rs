//! Status command for showing stored state.

use console::style;

use crate::cli::helpers::{open_store, print_report};
use crate::config::Settings;
use crate::repository::RecordFilter;

/// Show record counts and the most recent report.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    if !settings.database_path().exists() {
        println!(
            "{} No database yet. Run 'brokercrawl scrape' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let store = open_store(settings)?;
    let failures = store.query(&RecordFilter::new().failures()).await?.len();

    println!("\n{}", style("brokercrawl Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Data Directory:", settings.data_dir.display());
    println!("{:<20} {}", "Records:", store.count().await?);
    println!("{:<20} {}", "  failed:", failures);
    println!(
        "{:<20} {}",
        "Proxy:",
        if settings.proxy.is_some() { "configured" } else { "not configured" }
    );

    match store.latest_report().await? {
        Some(report) => print_report(&report),
        None => println!("\n{} No reports stored yet", style("!").yellow()),
    }

    Ok(())
}
