//! Comprehensive scrape runs.
//!
//! A run resolves its URLs into categories, scrapes each category as one bulk
//! batch in [`UrlCategory::RUN_ORDER`], and finishes with a [`ScrapeReport`].
//! Only one run is active per orchestrator at a time.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::crawl::{BulkConfig, CrawlService};
use super::report::{build_report, CategoryBatch};
use super::scheduler::Scheduler;
use super::{CrawlError, OrchestratorError};
use crate::config::{Settings, DEFAULT_BATCH_DELAY_MS, DEFAULT_MAX_CONCURRENT};
use crate::models::{ScrapeJob, ScrapeReport, UrlCategory};
use crate::scrapers::SitemapCollector;

/// What a run covers and how hard it pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    pub include_brokers: bool,
    pub include_reviews: bool,
    pub include_regulatory: bool,
    pub include_news: bool,
    /// Only scrape the priority list; the include flags are ignored.
    pub priority_only: bool,
    pub max_concurrent: usize,
    pub delay_between_batches_ms: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            include_brokers: true,
            include_reviews: true,
            include_regulatory: true,
            include_news: true,
            priority_only: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            delay_between_batches_ms: DEFAULT_BATCH_DELAY_MS,
        }
    }
}

impl ScrapeOptions {
    /// Full-run options using the configured concurrency and batch delay.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent,
            delay_between_batches_ms: settings.delay_between_batches_ms,
            ..Default::default()
        }
    }

    /// The same options restricted to the priority list.
    pub fn priority(self) -> Self {
        Self {
            priority_only: true,
            ..self
        }
    }

    /// Whether URLs of `category` belong in this run.
    pub fn includes(&self, category: UrlCategory) -> bool {
        if self.priority_only {
            return category == UrlCategory::Priority;
        }
        match category {
            UrlCategory::Priority => false,
            UrlCategory::Broker => self.include_brokers,
            UrlCategory::Review => self.include_reviews,
            UrlCategory::Regulatory => self.include_regulatory,
            UrlCategory::News => self.include_news,
        }
    }
}

/// Snapshot returned by [`ScrapeOrchestrator::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub current_job: Option<ScrapeJob>,
    pub stop_requested: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct RunState {
    current_job: Option<ScrapeJob>,
    total_runs: u64,
    successful_runs: u64,
    failed_runs: u64,
    last_run_at: Option<DateTime<Utc>>,
}

/// Drives comprehensive runs over the configured targets.
pub struct ScrapeOrchestrator {
    crawl: Arc<CrawlService>,
    settings: Settings,
    sitemaps: Option<SitemapCollector>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    state: Mutex<RunState>,
}

/// Marks the orchestrator idle again however the run ends.
struct RunGuard<'a> {
    orchestrator: &'a ScrapeOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.state().current_job = None;
        self.orchestrator.running.store(false, Ordering::SeqCst);
    }
}

impl ScrapeOrchestrator {
    pub fn new(crawl: Arc<CrawlService>, settings: &Settings) -> Self {
        let sitemaps = match SitemapCollector::new(&settings.user_agent) {
            Ok(collector) => Some(collector),
            Err(e) => {
                warn!("Sitemap discovery disabled: {}", e);
                None
            }
        };

        Self {
            crawl,
            settings: settings.clone(),
            sitemaps,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            state: Mutex::new(RunState::default()),
        }
    }

    /// Replace the collector used to walk sitemap roots.
    pub fn with_sitemap_collector(mut self, collector: SitemapCollector) -> Self {
        self.sitemaps = Some(collector);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the active run to start no further batches.
    ///
    /// Returns false when no run is active. Pages already in flight finish.
    pub fn stop(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        info!("Stop requested; the current batch will finish");
        self.stop_requested.store(true, Ordering::SeqCst);
        true
    }

    pub fn status(&self) -> OrchestratorStatus {
        let state = self.state();
        OrchestratorStatus {
            is_running: self.is_running(),
            current_job: state.current_job.clone(),
            stop_requested: self.stop_requested.load(Ordering::SeqCst),
            total_runs: state.total_runs,
            successful_runs: state.successful_runs,
            failed_runs: state.failed_runs,
            last_run_at: state.last_run_at,
        }
    }

    /// Run every selected category and return the report.
    ///
    /// Fails with [`OrchestratorError::AlreadyRunning`] without touching any
    /// state if a run is active. A stopped run still returns a report for the
    /// batches that completed.
    pub async fn start_comprehensive_scraping(
        &self,
        options: &ScrapeOptions,
    ) -> Result<ScrapeReport, OrchestratorError> {
        if options.max_concurrent == 0 {
            return Err(CrawlError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            )
            .into());
        }

        let guard = self.acquire()?;
        let result = self.run(options).await;

        let mut state = self.state();
        state.current_job = None;
        state.last_run_at = Some(Utc::now());
        match &result {
            Ok(report) => {
                state.successful_runs += 1;
                info!(
                    "Run finished: {}/{} URLs succeeded ({}%)",
                    report.summary.successful,
                    report.summary.total_urls,
                    report.summary.success_rate_pct
                );
            }
            Err(e) => {
                state.failed_runs += 1;
                warn!("Run failed: {}", e);
            }
        }
        drop(state);
        drop(guard);

        result
    }

    /// Schedule a priority-only run every `priority_period` and a full run
    /// every `full_period`. A tick that finds a run active is skipped.
    pub fn start_scheduler(
        self: &Arc<Self>,
        priority_period: Duration,
        full_period: Duration,
    ) -> Scheduler {
        let full = ScrapeOptions::from_settings(&self.settings);
        let runs = [
            ("priority", priority_period, full.clone().priority()),
            ("full", full_period, full),
        ];

        let mut scheduler = Scheduler::new();
        for (name, period, options) in runs {
            let orchestrator = Arc::clone(self);
            scheduler.schedule_recurring(name, period, move || {
                let orchestrator = Arc::clone(&orchestrator);
                let options = options.clone();
                async move { orchestrator.run_scheduled(name, &options).await }
            });
        }
        scheduler
    }

    async fn run_scheduled(&self, name: &str, options: &ScrapeOptions) {
        if self.is_running() {
            info!("Skipping scheduled {} run: a run is already active", name);
            return;
        }
        match self.start_comprehensive_scraping(options).await {
            Ok(_) => {}
            Err(OrchestratorError::AlreadyRunning) => {
                debug!("Scheduled {} run lost the race to another run", name);
            }
            Err(e) => warn!("Scheduled {} run failed: {}", name, e),
        }
    }

    fn acquire(&self) -> Result<RunGuard<'_>, OrchestratorError> {
        if self.is_running() {
            return Err(OrchestratorError::AlreadyRunning);
        }
        // Cleared before the flag flips so a stop() aimed at this run sticks.
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| OrchestratorError::AlreadyRunning)?;

        self.state().total_runs += 1;
        Ok(RunGuard { orchestrator: self })
    }

    async fn run(&self, options: &ScrapeOptions) -> Result<ScrapeReport, OrchestratorError> {
        let groups = self.resolve_targets(options).await;
        if groups.is_empty() {
            return Err(OrchestratorError::NoTargets);
        }

        let start = Instant::now();
        let batch_delay = Duration::from_millis(options.delay_between_batches_ms);
        let mut batches = Vec::with_capacity(groups.len());

        for (index, (category, urls)) in groups.iter().enumerate() {
            if index > 0 && !batch_delay.is_zero() {
                debug!("Waiting {:?} before the next batch", batch_delay);
                sleep(batch_delay).await;
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("Run stopped before the {} batch", category);
                break;
            }

            info!("Starting {} batch ({} URLs)", category, urls.len());
            self.state().current_job = Some(ScrapeJob::new(*category, urls.len()));

            let config =
                BulkConfig::from_category(&self.settings.category(*category), options.max_concurrent);
            let result = self
                .crawl
                .bulk_with_progress(urls, &config, |_| {
                    if let Some(job) = self.state().current_job.as_mut() {
                        job.processed_urls += 1;
                    }
                })
                .await?;
            batches.push(CategoryBatch {
                category: *category,
                result,
            });
        }

        let report = build_report(&batches, start.elapsed().as_millis() as u64);
        if let Err(e) = self.crawl.store().insert_report(&report).await {
            warn!("Failed to save report {}: {}", report.id, e);
        }
        Ok(report)
    }

    /// Selected URLs grouped by category in run order, without duplicates.
    ///
    /// A URL listed under several categories stays in the earliest one.
    async fn resolve_targets(&self, options: &ScrapeOptions) -> Vec<(UrlCategory, Vec<String>)> {
        let targets = &self.settings.targets;
        let mut candidates: Vec<(UrlCategory, String)> = Vec::new();

        if options.priority_only {
            candidates.extend(
                targets
                    .priority
                    .iter()
                    .map(|url| (UrlCategory::Priority, url.clone())),
            );
        } else {
            for (name, urls) in &targets.groups {
                let category = UrlCategory::from_str_or_broker(name);
                candidates.extend(urls.iter().map(|url| (category, url.clone())));
            }

            match &self.sitemaps {
                Some(collector) => {
                    for root in &targets.sitemaps {
                        let found = collector.collect(root).await;
                        debug!("Sitemap {} yielded {} URLs", root, found.len());
                        candidates.extend(
                            found
                                .into_iter()
                                .map(|url| (UrlCategory::classify(&url), url)),
                        );
                    }
                }
                None if !targets.sitemaps.is_empty() => {
                    warn!("Skipping {} sitemap roots: no collector", targets.sitemaps.len());
                }
                None => {}
            }
        }

        candidates.retain(|(category, url)| options.includes(*category) && !url.trim().is_empty());
        // Stable: explicit groups stay ahead of sitemap discoveries within a category.
        candidates.sort_by_key(|(category, _)| *category);

        let mut seen = HashSet::new();
        let mut grouped: BTreeMap<UrlCategory, Vec<String>> = BTreeMap::new();
        for (category, url) in candidates {
            if seen.insert(url.clone()) {
                grouped.entry(category).or_default().push(url);
            }
        }

        UrlCategory::RUN_ORDER
            .iter()
            .filter_map(|c| grouped.remove(c).map(|urls| (*c, urls)))
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScrapeTargets;
    use crate::models::FetchStrategyKind;
    use crate::repository::{InMemoryRecordStore, RecordStore};
    use crate::scrapers::{FetchError, FetchOptions, FetchStrategy, FetchedPage, PageFetcher};
    use async_trait::async_trait;

    /// Serves a small page after a delay; URLs containing "fail" get a 503.
    struct SlowStrategy {
        delay: Duration,
    }

    #[async_trait]
    impl FetchStrategy for SlowStrategy {
        fn kind(&self) -> FetchStrategyKind {
            FetchStrategyKind::BasicDirect
        }

        async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchedPage, FetchError> {
            sleep(self.delay).await;
            if url.contains("fail") {
                return Err(FetchError::Status(503));
            }
            Ok(FetchedPage {
                status: 200,
                body: "<html><body><h1>Broker</h1></body></html>".to_string(),
            })
        }
    }

    fn settings(targets: ScrapeTargets) -> Settings {
        let mut settings = Settings::default();
        settings.delay_between_batches_ms = 0;
        for config in settings.categories.values_mut() {
            config.delay_ms = 0;
        }
        settings.targets = targets;
        settings
    }

    fn orchestrator(
        targets: ScrapeTargets,
        delay: Duration,
    ) -> (Arc<ScrapeOrchestrator>, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let fetcher = PageFetcher::with_strategies(vec![
            Arc::new(SlowStrategy { delay }) as Arc<dyn FetchStrategy>
        ]);
        let crawl = Arc::new(CrawlService::new(fetcher, store.clone()));
        let orchestrator = ScrapeOrchestrator::new(crawl, &settings(targets));
        (Arc::new(orchestrator), store)
    }

    fn options() -> ScrapeOptions {
        ScrapeOptions {
            delay_between_batches_ms: 0,
            ..Default::default()
        }
    }

    fn groups(entries: &[(&str, &[&str])]) -> ScrapeTargets {
        ScrapeTargets {
            groups: entries
                .iter()
                .map(|(name, urls)| {
                    (
                        name.to_string(),
                        urls.iter().map(|u| u.to_string()).collect(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_produces_and_saves_report() {
        let targets = groups(&[
            ("brokers", &["https://example.com/a", "https://example.com/fail"]),
            ("news", &["https://example.com/news/1"]),
        ]);
        let (orchestrator, store) = orchestrator(targets, Duration::ZERO);

        let report = orchestrator
            .start_comprehensive_scraping(&options())
            .await
            .unwrap();

        assert_eq!(report.summary.total_urls, 3);
        assert_eq!(report.summary.successful, 2);
        assert_eq!(report.summary.success_rate_pct, "66.67");
        assert_eq!(report.per_category.len(), 2);
        assert_eq!(report.per_category["broker"].failed, 1);

        let saved = store.latest_report().await.unwrap().unwrap();
        assert_eq!(saved.id, report.id);
        assert_eq!(store.count().await.unwrap(), 3);

        let status = orchestrator.status();
        assert!(!status.is_running);
        assert!(status.current_job.is_none());
        assert_eq!(status.total_runs, 1);
        assert_eq!(status.successful_runs, 1);
        assert!(status.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_second_start_fails_while_running() {
        let targets = groups(&[("brokers", &["https://example.com/a"])]);
        let (orchestrator, _store) = orchestrator(targets, Duration::from_millis(150));

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.start_comprehensive_scraping(&options()).await })
        };
        sleep(Duration::from_millis(30)).await;

        assert!(orchestrator.is_running());
        let current = orchestrator.status().current_job.unwrap();
        assert_eq!(current.category, UrlCategory::Broker);
        assert_eq!(current.total_urls, 1);

        let second = orchestrator.start_comprehensive_scraping(&options()).await;
        assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));
        assert_eq!(orchestrator.status().total_runs, 1);

        assert!(first.await.unwrap().is_ok());
        let status = orchestrator.status();
        assert_eq!(status.successful_runs, 1);
        assert_eq!(status.failed_runs, 0);
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_no_targets_fails_and_stays_restartable() {
        let (orchestrator, _store) = orchestrator(ScrapeTargets::default(), Duration::ZERO);

        let result = orchestrator.start_comprehensive_scraping(&options()).await;
        assert!(matches!(result, Err(OrchestratorError::NoTargets)));

        let status = orchestrator.status();
        assert!(!status.is_running);
        assert_eq!(status.failed_runs, 1);

        let again = orchestrator.start_comprehensive_scraping(&options()).await;
        assert!(matches!(again, Err(OrchestratorError::NoTargets)));
        assert_eq!(orchestrator.status().total_runs, 2);
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected_without_side_effects() {
        let targets = groups(&[("brokers", &["https://example.com/a"])]);
        let (orchestrator, _store) = orchestrator(targets, Duration::ZERO);

        let opts = ScrapeOptions {
            max_concurrent: 0,
            ..options()
        };
        let result = orchestrator.start_comprehensive_scraping(&opts).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::Crawl(CrawlError::InvalidConfig(_)))
        ));
        assert_eq!(orchestrator.status().total_runs, 0);
    }

    #[tokio::test]
    async fn test_stop_skips_remaining_batches() {
        let targets = groups(&[
            ("brokers", &["https://example.com/a"]),
            ("reviews", &["https://example.com/review/b/"]),
            ("news", &["https://example.com/news/c"]),
        ]);
        let (orchestrator, _store) = orchestrator(targets, Duration::from_millis(100));

        let run = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.start_comprehensive_scraping(&options()).await })
        };
        sleep(Duration::from_millis(30)).await;
        assert!(orchestrator.stop());
        assert!(orchestrator.status().stop_requested);

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.per_category.len(), 1);
        assert!(report.per_category.contains_key("broker"));
        assert!(!orchestrator.stop());
    }

    #[tokio::test]
    async fn test_targets_ordered_and_deduplicated() {
        let targets = groups(&[
            ("news", &["https://example.com/shared"]),
            ("reviews", &["https://example.com/review/x/", "https://example.com/shared"]),
            ("crypto", &["https://example.com/c"]),
        ]);
        let (orchestrator, _store) = orchestrator(targets, Duration::ZERO);

        let resolved = orchestrator.resolve_targets(&options()).await;
        assert_eq!(
            resolved,
            vec![
                (UrlCategory::Broker, vec!["https://example.com/c".to_string()]),
                (
                    UrlCategory::Review,
                    vec![
                        "https://example.com/review/x/".to_string(),
                        "https://example.com/shared".to_string()
                    ]
                ),
            ]
        );

        let no_reviews = ScrapeOptions {
            include_reviews: false,
            ..options()
        };
        let resolved = orchestrator.resolve_targets(&no_reviews).await;
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].0, UrlCategory::News);
    }

    #[tokio::test]
    async fn test_priority_only_uses_priority_list() {
        let mut targets = groups(&[("brokers", &["https://example.com/a"])]);
        targets.priority = vec!["https://example.com/top".to_string()];
        let (orchestrator, _store) = orchestrator(targets, Duration::ZERO);

        let report = orchestrator
            .start_comprehensive_scraping(&options().priority())
            .await
            .unwrap();
        assert_eq!(report.summary.total_urls, 1);
        assert!(report.per_category.contains_key("priority"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_counts_pages_as_they_finish() {
        let targets = groups(&[(
            "brokers",
            &[
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c",
            ],
        )]);
        let (orchestrator, _store) = orchestrator(targets, Duration::from_millis(100));
        let opts = ScrapeOptions {
            max_concurrent: 1,
            ..options()
        };

        let run = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.start_comprehensive_scraping(&opts).await })
        };

        sleep(Duration::from_millis(150)).await;
        let job = orchestrator.status().current_job.unwrap();
        assert_eq!(job.total_urls, 3);
        assert_eq!(job.processed_urls, 1);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(orchestrator.status().current_job.unwrap().processed_urls, 2);

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.summary.total_urls, 3);
        assert!(orchestrator.status().current_job.is_none());
    }

    #[tokio::test]
    async fn test_stop_right_after_start_is_kept() {
        let targets = groups(&[
            ("brokers", &["https://example.com/a"]),
            ("news", &["https://example.com/news/c"]),
        ]);
        let (orchestrator, store) = orchestrator(targets, Duration::ZERO);

        let guard = orchestrator.acquire().unwrap();
        assert!(orchestrator.stop());
        assert!(matches!(
            orchestrator.acquire(),
            Err(OrchestratorError::AlreadyRunning)
        ));
        assert!(orchestrator.status().stop_requested);

        let report = orchestrator.run(&options()).await.unwrap();
        assert!(report.per_category.is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
        drop(guard);

        // A stale stop does not leak into the next run.
        let report = orchestrator
            .start_comprehensive_scraping(&options())
            .await
            .unwrap();
        assert_eq!(report.per_category.len(), 2);
        assert!(!orchestrator.status().stop_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_tick_skipped_while_running() {
        let mut targets = groups(&[("brokers", &["https://example.com/a"])]);
        targets.priority = vec!["https://example.com/top".to_string()];
        // Each run takes 25 minutes, longer than either period.
        let (orchestrator, _store) = orchestrator(targets, Duration::from_secs(25 * 60));

        let mut scheduler = orchestrator.start_scheduler(
            Duration::from_secs(10 * 60),
            Duration::from_secs(15 * 60),
        );

        // Priority starts at 10 and holds the run until 35; full ticks at 15
        // and 30 find it active.
        sleep(Duration::from_secs(31 * 60)).await;
        assert!(orchestrator.is_running());
        assert_eq!(orchestrator.status().total_runs, 1);

        sleep(Duration::from_secs(6 * 60)).await;
        let status = orchestrator.status();
        assert!(!status.is_running);
        assert_eq!(status.total_runs, 1);
        assert_eq!(status.successful_runs, 1);

        // Both timers are due again at 45; only one of them gets the run.
        sleep(Duration::from_secs(9 * 60)).await;
        assert!(orchestrator.is_running());
        assert_eq!(orchestrator.status().total_runs, 2);

        scheduler.cancel_all().await;
        let status = orchestrator.status();
        assert_eq!(status.total_runs, 2);
        assert_eq!(status.successful_runs, 2);
        assert_eq!(status.failed_runs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_tick_runs_priority_list_only() {
        let mut targets = groups(&[
            ("brokers", &["https://example.com/a"]),
            ("news", &["https://example.com/news/c"]),
        ]);
        targets.priority = vec!["https://example.com/top".to_string()];
        let (orchestrator, store) = orchestrator(targets, Duration::ZERO);

        let mut scheduler =
            orchestrator.start_scheduler(Duration::from_secs(60), Duration::from_secs(3600));
        sleep(Duration::from_secs(90)).await;
        scheduler.cancel_all().await;

        let status = orchestrator.status();
        assert_eq!(status.total_runs, 1);
        assert_eq!(status.successful_runs, 1);

        let report = store.latest_report().await.unwrap().unwrap();
        assert_eq!(report.summary.total_urls, 1);
        assert_eq!(
            report.per_category.keys().collect::<Vec<_>>(),
            vec!["priority"]
        );
        assert!(store.get("https://example.com/top").await.unwrap().is_some());
        assert!(store.get("https://example.com/a").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_both_timers() {
        let mut targets = groups(&[("brokers", &["https://example.com/a"])]);
        targets.priority = vec!["https://example.com/top".to_string()];
        let (orchestrator, _store) = orchestrator(targets, Duration::ZERO);

        let mut scheduler =
            orchestrator.start_scheduler(Duration::from_secs(60), Duration::from_secs(150));
        assert_eq!(scheduler.tasks().len(), 2);

        // Priority at 60 and 120, full at 150.
        sleep(Duration::from_secs(170)).await;
        assert_eq!(orchestrator.status().total_runs, 3);

        scheduler.cancel_all().await;
        assert!(scheduler.is_empty());

        sleep(Duration::from_secs(3600)).await;
        let status = orchestrator.status();
        assert_eq!(status.total_runs, 3);
        assert_eq!(status.successful_runs, 3);
        assert!(!status.is_running);
    }

    #[test]
    fn test_options_includes() {
        let full = ScrapeOptions::default();
        assert!(full.includes(UrlCategory::Broker));
        assert!(!full.includes(UrlCategory::Priority));

        let priority = full.priority();
        assert!(priority.includes(UrlCategory::Priority));
        assert!(!priority.includes(UrlCategory::News));
    }
}
