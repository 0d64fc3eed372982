//! Single-page and sitemap commands.

use console::style;

use crate::cli::helpers::{crawl_service, truncate};
use crate::config::Settings;
use crate::models::UrlCategory;
use crate::scrapers::{FetchOptions, SitemapCollector};

/// Scrape one URL with its category's settings and print the outcome.
pub async fn cmd_fetch(settings: &Settings, url: &str, json: bool) -> anyhow::Result<()> {
    let service = crawl_service(settings)?;
    let category = UrlCategory::classify(url);
    let options = FetchOptions::from(&settings.category(category));

    let outcome = service.scrape_page(url, &options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.success {
        println!(
            "{} {} (HTTP {}, {}, {})",
            style("✓").green(),
            url,
            outcome.http_status,
            outcome.strategy,
            outcome.page_type.as_str()
        );
        if let Some(hash) = &outcome.content_hash {
            println!("  {:<12} {}", "hash:", hash);
        }
    } else {
        println!(
            "{} {}: {}",
            style("✗").red(),
            url,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(review) = &outcome.review {
        println!("\n{}", style("Review").bold());
        if let Some(title) = &review.title {
            println!("  {:<12} {}", "title:", title);
        }
        if let Some(rating) = review.rating {
            println!("  {:<12} {}", "rating:", rating);
        }
        if let Some(updated) = &review.last_updated {
            println!("  {:<12} {}", "updated:", updated);
        }
        for (heading, body) in &review.sections {
            println!("  {:<12} {}", format!("{}:", truncate(heading, 11)), truncate(body, 60));
        }
        for pro in &review.pros {
            println!("  {} {}", style("+").green(), pro);
        }
        for con in &review.cons {
            println!("  {} {}", style("-").red(), con);
        }
    }

    if !outcome.persisted {
        println!("{} Result was not saved to the database", style("!").yellow());
    }
    Ok(())
}

/// Print every page URL reachable from a sitemap.
pub async fn cmd_sitemap(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let collector = SitemapCollector::new(&settings.user_agent)?;
    let urls = collector.collect(url).await;

    for page in &urls {
        println!("{}", page);
    }
    eprintln!("{} {} URLs", style("✓").green(), urls.len());
    Ok(())
}
