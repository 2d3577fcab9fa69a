//! Configuration management.
//!
//! Configuration comes from an optional TOML file layered with environment
//! variables prefixed `PAPER_SCOUT__` (sections separated by `__`, e.g.
//! `PAPER_SCOUT__SEARCH__MAX_RESULTS=20`). Everything has a default.
//!
//! ```toml
//! [search]
//! max_results = 100
//! sources = ["arxiv", "openreview"]
//!
//! [filter]
//! enabled = true
//! exclude = ["hardware"]
//! require = []
//!
//! [downloads]
//! directory = "~/Downloads/papers_20240101"
//! timeout_secs = 60
//!
//! [scholar]
//! block_wait_secs = 120
//! poll_interval_ms = 3000
//! headless = false
//!
//! [translation]
//! api_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
//! model = "qwen-plus"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const APP_DIR: &str = "paper-scout";
const ENV_PREFIX: &str = "PAPER_SCOUT";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub downloads: DownloadConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub scholar: ScholarConfig,

    #[serde(default)]
    pub translation: TranslationConfig,
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum results requested from each source
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Sources used when none are given on the command line
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Per-request timeout for the API sources
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            sources: default_sources(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_results() -> usize {
    100
}

fn default_sources() -> Vec<String> {
    vec!["arxiv".to_string(), "openreview".to_string()]
}

fn default_request_timeout() -> u64 {
    30
}

/// Keyword filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub require: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude: Vec::new(),
            require: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory PDFs are written to
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,

    /// Whole-request timeout for a single PDF
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
            timeout_secs: default_download_timeout(),
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `~/Downloads/papers_YYYYMMDD`
fn default_download_dir() -> PathBuf {
    let base = dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("./downloads"));
    base.join(format!("papers_{}", chrono::Local::now().format("%Y%m%d")))
}

fn default_download_timeout() -> u64 {
    60
}

/// Locations of the persisted history documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_download_history")]
    pub download_history: PathBuf,

    #[serde(default = "default_search_history")]
    pub search_history: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            download_history: default_download_history(),
            search_history: default_search_history(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_download_history() -> PathBuf {
    data_dir().join("download_history.json")
}

fn default_search_history() -> PathBuf {
    data_dir().join("search_history.json")
}

/// Browser-driven Google Scholar settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default = "default_scholar_url")]
    pub base_url: String,

    /// Upper bound on waiting for a CAPTCHA or rate-limit page to clear
    #[serde(default = "default_block_wait")]
    pub block_wait_secs: u64,

    /// How often the page is re-checked while blocked
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Randomized delay after navigation before the page is inspected
    #[serde(default = "default_settle_min")]
    pub settle_min_ms: u64,

    #[serde(default = "default_settle_max")]
    pub settle_max_ms: u64,

    /// Timeout for a single page navigation
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Run Chrome without a window. A visible window lets a human solve CAPTCHAs.
    #[serde(default)]
    pub headless: bool,

    /// Snippets shorter than this trigger a full-abstract fetch
    #[serde(default = "default_abstract_min_chars")]
    pub abstract_min_chars: usize,
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            base_url: default_scholar_url(),
            block_wait_secs: default_block_wait(),
            poll_interval_ms: default_poll_interval(),
            settle_min_ms: default_settle_min(),
            settle_max_ms: default_settle_max(),
            navigation_timeout_secs: default_navigation_timeout(),
            headless: false,
            abstract_min_chars: default_abstract_min_chars(),
        }
    }
}

impl ScholarConfig {
    pub fn block_wait(&self) -> Duration {
        Duration::from_secs(self.block_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

fn default_scholar_url() -> String {
    "https://scholar.google.com/scholar".to_string()
}

fn default_block_wait() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_settle_min() -> u64 {
    2000
}

fn default_settle_max() -> u64 {
    4000
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_abstract_min_chars() -> usize {
    200
}

/// Chat-completion translation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Translate titles and abstracts of every search result
    #[serde(default)]
    pub auto_translate: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            api_url: default_api_url(),
            model: default_model(),
            auto_translate: false,
        }
    }
}

fn default_api_key() -> Option<String> {
    std::env::var("QWEN_API_KEY").ok().filter(|k| !k.is_empty())
}

fn default_api_url() -> String {
    std::env::var("QWEN_API_URL")
        .unwrap_or_else(|_| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string())
}

fn default_model() -> String {
    "qwen-plus".to_string()
}

/// Shared, runtime-adjustable cap on results per source.
///
/// Every source holds a clone and reads it on each search, so a change made
/// through any clone applies to the next search everywhere.
#[derive(Debug, Clone)]
pub struct MaxResults(Arc<AtomicUsize>);

impl MaxResults {
    pub fn new(value: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(value)))
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: usize) {
        self.0.store(value, Ordering::Relaxed);
    }
}

impl Default for MaxResults {
    fn default() -> Self {
        Self::new(default_max_results())
    }
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Load configuration from environment variables and defaults only
pub fn load_from_env() -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Find a configuration file in the usual places
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("paper-scout.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .filter(|path| path.is_file())
}
