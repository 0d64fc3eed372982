//! brokercrawl: tiered page fetching, content extraction, and scheduled
//! scrape runs over broker and review sites.

pub mod cli;
pub mod config;
pub mod extract;
pub mod hashing;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;
