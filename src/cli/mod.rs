//! Command-line interface.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::services::ScrapeOptions;

#[derive(Parser)]
#[command(name = "brokercrawl")]
#[command(about = "Fetch and extract broker and review pages on a schedule")]
#[command(version)]
pub struct Cli {
    /// Config file (JSON, or TOML by extension). Discovered automatically when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long, global = true, env = "BROKERCRAWL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Resolve relative config paths against the working directory
    #[arg(long, global = true)]
    pub cwd: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one comprehensive scrape over the configured targets
    Scrape(ScrapeArgs),

    /// Scrape a single URL and print what was extracted
    Fetch {
        /// Page URL
        url: String,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Walk a sitemap (or sitemap index) and print every page URL
    Sitemap {
        /// Sitemap URL
        url: String,
    },

    /// Run the priority and full schedules until Ctrl-C
    Schedule {
        /// Minutes between priority-only runs
        #[arg(long)]
        priority_mins: Option<u64>,

        /// Hours between full runs
        #[arg(long)]
        full_hours: Option<u64>,
    },

    /// Show stored record count and the latest report
    Status,
}

#[derive(Args)]
pub struct ScrapeArgs {
    /// Only scrape the priority list
    #[arg(long)]
    pub priority_only: bool,

    /// Skip broker pages
    #[arg(long)]
    pub no_brokers: bool,

    /// Skip review pages
    #[arg(long)]
    pub no_reviews: bool,

    /// Skip regulatory pages
    #[arg(long)]
    pub no_regulatory: bool,

    /// Skip news pages
    #[arg(long)]
    pub no_news: bool,

    /// Pages fetched at once
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,

    /// Pause between category batches in milliseconds
    #[arg(long)]
    pub batch_delay_ms: Option<u64>,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScrapeArgs {
    fn options(&self, defaults: ScrapeOptions) -> ScrapeOptions {
        ScrapeOptions {
            include_brokers: !self.no_brokers,
            include_reviews: !self.no_reviews,
            include_regulatory: !self.no_regulatory,
            include_news: !self.no_news,
            priority_only: self.priority_only,
            max_concurrent: self.max_concurrent.unwrap_or(defaults.max_concurrent),
            delay_between_batches_ms: self
                .batch_delay_ms
                .unwrap_or(defaults.delay_between_batches_ms),
        }
    }
}

impl Cli {
    /// Load settings and dispatch the chosen command.
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = load_settings_with_options(LoadOptions {
            config_path: self.config,
            use_cwd: self.cwd,
            data_dir: self.data_dir,
        })
        .await;

        match self.command {
            Commands::Scrape(args) => {
                let options = args.options(ScrapeOptions::from_settings(&settings));
                commands::scrape::cmd_scrape(&settings, &options, args.json).await
            }
            Commands::Fetch { url, json } => commands::fetch::cmd_fetch(&settings, &url, json).await,
            Commands::Sitemap { url } => commands::fetch::cmd_sitemap(&settings, &url).await,
            Commands::Schedule {
                priority_mins,
                full_hours,
            } => {
                commands::scrape::cmd_schedule(
                    &settings,
                    priority_mins.unwrap_or(settings.priority_interval_mins),
                    full_hours.unwrap_or(settings.full_interval_hours),
                )
                .await
            }
            Commands::Status => commands::scrape::status::cmd_status(&settings).await,
        }
    }
}
