//! Configuration module for Site-Scribe
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turns each `[[site]]` entry into a validated [`JobConfig`].
//!
//! # Example
//!
//! ```no_run
//! use site_scribe::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scribe.toml")).unwrap();
//! println!("Jobs to run: {}", config.job_configs().len());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlPolicy, CrawlerConfig, JobConfig, OutputConfig, SiteEntry, StateBackend,
    UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
