//! Site-Scribe: a resumable website documentation crawler
//!
//! This crate crawls a website breadth-first, hands every page to a content
//! extraction service, writes the resulting documents, and checkpoints its
//! progress so an interrupted job can resume without reprocessing pages.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Scribe operations
#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("State store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("Output error: {0}")]
    Write(#[from] output::WriteError),

    #[error("Too many failed pages: {failed} of {attempted} attempts failed")]
    ExcessFailures { failed: u32, attempted: u32 },

    #[error("Job not found: {0}")]
    JobNotFound(jobs::JobId),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition {
        from: jobs::JobState,
        to: jobs::JobState,
    },

    #[error("Job {0} was torn down before it started")]
    RunAborted(jobs::JobId),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Site-Scribe operations
pub type Result<T> = std::result::Result<T, ScribeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, JobConfig};
pub use jobs::{JobId, JobManager, JobState, JobStatus};
pub use state::{CrawlState, CrawlTarget, PageOutcome};
pub use url::{normalize_url, ScopePolicy};
