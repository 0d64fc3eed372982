//! Configuration management for brokercrawl using the prefer crate.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use prefer::{ConfigValue, FromValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::UrlCategory;
use crate::scrapers::ProxyConfig;

/// Default number of pages fetched at once within a batch.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default pause between category batches (milliseconds).
pub const DEFAULT_BATCH_DELAY_MS: u64 = 5000;

/// Default period of the priority-only scheduled run (minutes).
pub const DEFAULT_PRIORITY_INTERVAL_MINS: u64 = 60;

/// Default period of the full scheduled run (hours).
pub const DEFAULT_FULL_INTERVAL_HOURS: u64 = 24;

/// Environment variables read by [`Settings::with_env_overrides`].
pub const ENV_PROXY_ENDPOINT: &str = "BROKERCRAWL_PROXY_ENDPOINT";
pub const ENV_PROXY_API_KEY: &str = "BROKERCRAWL_PROXY_API_KEY";
pub const ENV_PROXY_ZONE: &str = "BROKERCRAWL_PROXY_ZONE";

/// Fetch behaviour for one URL category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Pause after each page, while still holding the concurrency slot.
    pub delay_ms: u64,
    /// Timeout for each fetch attempt.
    pub timeout_ms: u64,
    /// Attempts given to the retrying proxy tier.
    pub max_retries: u32,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self::for_category(UrlCategory::Broker)
    }
}

impl CategoryConfig {
    /// Built-in defaults for a category.
    pub fn for_category(category: UrlCategory) -> Self {
        let (delay_ms, timeout_ms, max_retries) = match category {
            UrlCategory::Priority => (1500, 30_000, 5),
            UrlCategory::Broker => (2000, 30_000, 3),
            UrlCategory::Review => (3000, 45_000, 3),
            UrlCategory::Regulatory => (5000, 60_000, 2),
            UrlCategory::News => (1000, 20_000, 2),
        };

        let mut headers = BTreeMap::new();
        if category == UrlCategory::Review {
            headers.insert("Referer".to_string(), "https://www.google.com/".to_string());
        }

        Self {
            delay_ms,
            timeout_ms,
            max_retries,
            headers,
        }
    }
}

/// Partial category settings from a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromValue)]
pub struct CategoryOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Merged over the built-in headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[prefer(default)]
    pub headers: HashMap<String, String>,
}

impl CategoryOverride {
    fn apply_to(&self, config: &mut CategoryConfig) {
        if let Some(delay) = self.delay_ms {
            config.delay_ms = delay;
        }
        if let Some(timeout) = self.timeout_ms {
            config.timeout_ms = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        config
            .headers
            .extend(self.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// The URLs a run works from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTargets {
    /// URLs fetched by priority-only runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority: Vec<String>,
    /// Category name -> URLs. Unknown names are treated as broker pages.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Sitemap roots walked during full runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sitemaps: Vec<String>,
}

impl FromValue for ScrapeTargets {
    fn from_value(value: &ConfigValue) -> prefer::Result<Self> {
        let Some(obj) = value.as_object() else {
            return Ok(Self::default());
        };
        let field = |key: &str| -> prefer::Result<Vec<String>> {
            obj.get(key)
                .map(Vec::<String>::from_value)
                .transpose()
                .map(Option::unwrap_or_default)
                .map_err(|e| e.with_key(key))
        };
        let groups: HashMap<String, Vec<String>> = obj
            .get("groups")
            .map(HashMap::from_value)
            .transpose()
            .map_err(|e| e.with_key("groups"))?
            .unwrap_or_default();

        Ok(Self {
            priority: field("priority")?,
            groups: groups.into_iter().collect(),
            sitemaps: field("sitemaps")?,
        })
    }
}

impl ScrapeTargets {
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty()
            && self.groups.values().all(Vec::is_empty)
            && self.sitemaps.is_empty()
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// User agent for direct HTTP requests.
    pub user_agent: String,
    /// Fetch-proxy service; the proxy tier is skipped when unset.
    pub proxy: Option<ProxyConfig>,
    /// Pages fetched at once within a batch.
    pub max_concurrent: usize,
    /// Pause between category batches in milliseconds.
    pub delay_between_batches_ms: u64,
    /// Period of the priority-only scheduled run.
    pub priority_interval_mins: u64,
    /// Period of the full scheduled run.
    pub full_interval_hours: u64,
    /// Per-category fetch behaviour.
    pub categories: BTreeMap<UrlCategory, CategoryConfig>,
    /// URLs to scrape.
    pub targets: ScrapeTargets,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/.local/share/brokercrawl (or platform equivalent)
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("brokercrawl");

        Self {
            data_dir,
            database_filename: "brokercrawl.db".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            proxy: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            delay_between_batches_ms: DEFAULT_BATCH_DELAY_MS,
            priority_interval_mins: DEFAULT_PRIORITY_INTERVAL_MINS,
            full_interval_hours: DEFAULT_FULL_INTERVAL_HOURS,
            categories: UrlCategory::RUN_ORDER
                .iter()
                .map(|c| (*c, CategoryConfig::for_category(*c)))
                .collect(),
            targets: ScrapeTargets::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }

    /// Fetch configuration for a category, falling back to built-in defaults.
    pub fn category(&self, category: UrlCategory) -> CategoryConfig {
        self.categories
            .get(&category)
            .cloned()
            .unwrap_or_else(|| CategoryConfig::for_category(category))
    }

    /// Apply proxy settings from the environment.
    ///
    /// Endpoint and API key must both be set to enable the proxy; the zone
    /// alone only adjusts an already configured proxy.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let endpoint = lookup(ENV_PROXY_ENDPOINT).filter(|v| !v.trim().is_empty());
        let api_key = lookup(ENV_PROXY_API_KEY).filter(|v| !v.trim().is_empty());
        let zone = lookup(ENV_PROXY_ZONE).filter(|v| !v.trim().is_empty());

        if let (Some(endpoint), Some(api_key)) = (endpoint, api_key) {
            self.proxy = Some(ProxyConfig {
                endpoint,
                api_key,
                zone: zone.clone(),
            });
        }
        if let (Some(proxy), Some(zone)) = (self.proxy.as_mut(), zone) {
            proxy.zone = Some(zone);
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Fetch-proxy service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    /// Pages fetched at once within a batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    /// Pause between category batches in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_between_batches_ms: Option<u64>,
    /// Period of the priority-only scheduled run in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_interval_mins: Option<u64>,
    /// Period of the full scheduled run in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_interval_hours: Option<u64>,
    /// Per-category overrides keyed by category name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub categories: HashMap<String, CategoryOverride>,
    /// URLs to scrape.
    #[serde(default)]
    pub targets: ScrapeTargets,

    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers brokercrawl config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("brokercrawl").await {
            Ok(pref_config) => Self::from_prefer(&pref_config),
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Read every known key from a loaded prefer config; missing or invalid keys stay unset.
    pub fn from_prefer(pref_config: &prefer::Config) -> Self {
        let target: Option<String> = pref_config.get("target").ok();
        let database: Option<String> = pref_config.get("database").ok();
        let user_agent: Option<String> = pref_config.get("user_agent").ok();
        let proxy: Option<ProxyConfig> = match pref_config.get("proxy") {
            Ok(proxy) => Some(proxy),
            Err(prefer::Error::KeyNotFound(_)) => None,
            Err(e) => {
                warn!("Ignoring proxy config: {}", e);
                None
            }
        };
        let max_concurrent: Option<usize> = pref_config.get("max_concurrent").ok();
        let delay_between_batches_ms: Option<u64> =
            pref_config.get("delay_between_batches_ms").ok();
        let priority_interval_mins: Option<u64> = pref_config.get("priority_interval_mins").ok();
        let full_interval_hours: Option<u64> = pref_config.get("full_interval_hours").ok();
        let categories: HashMap<String, CategoryOverride> =
            pref_config.get("categories").unwrap_or_default();
        let targets: ScrapeTargets = pref_config.get("targets").unwrap_or_default();

        Config {
            target,
            database,
            user_agent,
            proxy,
            max_concurrent,
            delay_between_batches_ms,
            priority_interval_mins,
            full_interval_hours,
            categories,
            targets,
            source_path: pref_config.source_path().cloned(),
        }
    }

    /// Load configuration from a specific file path (JSON, or TOML for `.toml`).
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let mut config: Config = if is_toml {
            toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))?
        } else {
            serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse config file: {}", e))?
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref target) = self.target {
            settings.data_dir = self.resolve_path(target, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(ref proxy) = self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        if let Some(max) = self.max_concurrent {
            settings.max_concurrent = max;
        }
        if let Some(delay) = self.delay_between_batches_ms {
            settings.delay_between_batches_ms = delay;
        }
        if let Some(mins) = self.priority_interval_mins {
            settings.priority_interval_mins = mins;
        }
        if let Some(hours) = self.full_interval_hours {
            settings.full_interval_hours = hours;
        }
        for (name, overrides) in &self.categories {
            let Some(category) = UrlCategory::from_str(name) else {
                warn!("Ignoring config for unknown category '{}'", name);
                continue;
            };
            let config = settings
                .categories
                .entry(category)
                .or_insert_with(|| CategoryConfig::for_category(category));
            overrides.apply_to(config);
        }
        if !self.targets.is_empty() {
            settings.targets = self.targets.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Override data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
pub async fn load_settings_with_options(options: LoadOptions) -> Settings {
    // Load config from explicit path or auto-discover
    let config = match &options.config_path {
        Some(path) => match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Config::default()
            }
        },
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    // Determine base directory for resolving relative paths
    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        // Default: use config file's directory, fall back to CWD
        config.base_dir().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    };

    config.apply_to_settings(&mut settings, &base_dir);

    // --data-dir override takes precedence
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }

    settings.with_env_overrides()
}
