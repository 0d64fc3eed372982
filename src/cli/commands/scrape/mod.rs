//! Scrape run and scheduler commands.

pub mod status;

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tracing::info;

use crate::cli::helpers::{crawl_service, print_report};
use crate::config::Settings;
use crate::services::{ScrapeOptions, ScrapeOrchestrator};

/// Run one comprehensive scrape; Ctrl-C stops after the current batch.
pub async fn cmd_scrape(
    settings: &Settings,
    options: &ScrapeOptions,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = Arc::new(ScrapeOrchestrator::new(crawl_service(settings)?, settings));

    let stopper = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "{} Stopping after the current batch...",
                    style("!").yellow()
                );
                orchestrator.stop();
            }
        })
    };

    let result = orchestrator.start_comprehensive_scraping(options).await;
    stopper.abort();
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Run the priority and full schedules until Ctrl-C.
pub async fn cmd_schedule(
    settings: &Settings,
    priority_mins: u64,
    full_hours: u64,
) -> anyhow::Result<()> {
    let orchestrator = Arc::new(ScrapeOrchestrator::new(crawl_service(settings)?, settings));

    let priority_period = Duration::from_secs(priority_mins.max(1) * 60);
    let full_period = Duration::from_secs(full_hours.max(1) * 3600);
    let mut scheduler = orchestrator.start_scheduler(priority_period, full_period);

    println!(
        "{} Priority run every {} min, full run every {} h. Press Ctrl-C to stop.",
        style("→").cyan(),
        priority_mins.max(1),
        full_hours.max(1)
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler");
    orchestrator.stop();
    scheduler.cancel_all().await;

    let status = orchestrator.status();
    println!(
        "{} Stopped after {} runs ({} ok, {} failed)",
        style("✓").green(),
        status.total_runs,
        status.successful_runs,
        status.failed_runs
    );
    Ok(())
}
