use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for Site-Scribe
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteEntry>,
}

/// Crawler behavior configuration, used as defaults for every job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from the root URL
    pub max_depth: u32,

    /// Maximum number of pages attempted per job
    pub max_pages: u32,

    /// Minimum spacing between two fetches of the same job (seconds)
    pub delay_seconds: f64,

    /// Persist the crawl state after this many pages
    pub checkpoint_every: u32,

    /// Follow links into subdomains of the root host
    pub allow_subdomains: bool,

    /// Upper bound for a single extraction call (seconds)
    pub extraction_timeout_seconds: u64,

    /// Fail the job once failed/attempted exceeds this ratio
    pub max_failure_ratio: f64,

    /// Attempts required before the failure ratio is enforced
    pub min_attempts_before_failure: u32,

    /// Extra attempts for a checkpoint write before the job fails
    pub store_retries: u32,

    /// Base backoff between checkpoint retries (milliseconds)
    pub store_retry_backoff_ms: u64,

    /// Documents scoring below this quality signal are skipped
    pub min_quality: f32,

    /// Path suffixes that are never enqueued
    pub exclude_extensions: Vec<String>,

    /// Path fragments that are never enqueued
    pub exclude_paths: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            delay_seconds: 2.0,
            checkpoint_every: 1,
            allow_subdomains: false,
            extraction_timeout_seconds: 60,
            max_failure_ratio: 0.5,
            min_attempts_before_failure: 10,
            store_retries: 3,
            store_retry_backoff_ms: 200,
            min_quality: 0.0,
            exclude_extensions: [".pdf", ".jpg", ".png", ".gif", ".zip", ".exe", ".mp4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_paths: ["/login", "/logout", "/admin", "/api/", "/assets/", "/static/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Which backend holds job checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    Sqlite,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Directory that receives the generated documents
    pub output_dir: String,

    /// SQLite database file, or directory of JSON records
    pub state_path: String,

    /// Storage backend for checkpoints
    pub state_backend: StateBackend,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "docs".to_string(),
            state_path: "docs/.scribe-state.db".to_string(),
            state_backend: StateBackend::Sqlite,
        }
    }
}

/// A website to document, with optional per-site overrides
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteEntry {
    pub root_url: String,
    pub max_depth: Option<u32>,
    pub max_pages: Option<u32>,
    pub delay_seconds: Option<f64>,
}

/// Per-job crawl policy knobs beyond the four required job fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlPolicy {
    pub checkpoint_every: u32,
    pub allow_subdomains: bool,
    pub extraction_timeout_seconds: u64,
    pub max_failure_ratio: f64,
    pub min_attempts_before_failure: u32,
    pub store_retries: u32,
    pub store_retry_backoff_ms: u64,
    pub min_quality: f32,
    pub exclude_extensions: Vec<String>,
    pub exclude_paths: Vec<String>,
}

impl CrawlPolicy {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_seconds)
    }

    pub fn store_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.store_retry_backoff_ms)
    }
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        CrawlPolicy::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            checkpoint_every: config.checkpoint_every,
            allow_subdomains: config.allow_subdomains,
            extraction_timeout_seconds: config.extraction_timeout_seconds,
            max_failure_ratio: config.max_failure_ratio,
            min_attempts_before_failure: config.min_attempts_before_failure,
            store_retries: config.store_retries,
            store_retry_backoff_ms: config.store_retry_backoff_ms,
            min_quality: config.min_quality,
            exclude_extensions: config.exclude_extensions.clone(),
            exclude_paths: config.exclude_paths.clone(),
        }
    }
}

/// Validated parameters of a single crawl job
///
/// Build one with [`JobConfig::new`] (or [`Config::job_configs`]) and call
/// [`JobConfig::validate`] before handing it to the job manager; the manager
/// validates again on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub root_url: String,
    pub max_depth: u32,
    pub max_pages: u32,
    pub delay_seconds: f64,
    pub policy: CrawlPolicy,
}

impl JobConfig {
    /// Creates a job configuration with default policy
    pub fn new(root_url: impl Into<String>, max_depth: u32, max_pages: u32, delay_seconds: f64) -> Self {
        Self {
            root_url: root_url.into(),
            max_depth,
            max_pages,
            delay_seconds,
            policy: CrawlPolicy::default(),
        }
    }
}

impl Config {
    /// Builds one job configuration per `[[site]]` entry
    pub fn job_configs(&self) -> Vec<JobConfig> {
        let policy = CrawlPolicy::from(&self.crawler);
        self.sites
            .iter()
            .map(|site| JobConfig {
                root_url: site.root_url.clone(),
                max_depth: site.max_depth.unwrap_or(self.crawler.max_depth),
                max_pages: site.max_pages.unwrap_or(self.crawler.max_pages),
                delay_seconds: site.delay_seconds.unwrap_or(self.crawler.delay_seconds),
                policy: policy.clone(),
            })
            .collect()
    }
}
