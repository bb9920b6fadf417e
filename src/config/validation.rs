use crate::config::types::{Config, CrawlPolicy, CrawlerConfig, JobConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    for job in config.job_configs() {
        job.validate()?;
    }
    Ok(())
}

impl JobConfig {
    /// Checks the job parameters before any crawl state is created
    ///
    /// The root URL must be an absolute http(s) URL with a host, `max_pages`
    /// must be at least 1 and `delay_seconds` a finite, non-negative number.
    /// `max_depth` is unsigned, so it is never negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let root = Url::parse(&self.root_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid root URL '{}': {}", self.root_url, e))
        })?;

        if root.scheme() != "http" && root.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Root URL '{}' must use http or https",
                self.root_url
            )));
        }

        if root.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidUrl(format!(
                "Root URL '{}' has no host",
                self.root_url
            )));
        }

        if self.max_pages < 1 {
            return Err(ConfigError::Validation(format!(
                "max_pages must be >= 1, got {}",
                self.max_pages
            )));
        }

        if !self.delay_seconds.is_finite() || self.delay_seconds < 0.0 {
            return Err(ConfigError::Validation(format!(
                "delay_seconds must be a non-negative number, got {}",
                self.delay_seconds
            )));
        }

        validate_policy(&self.policy)
    }
}

/// Validates crawler defaults
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if !config.delay_seconds.is_finite() || config.delay_seconds < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay_seconds must be a non-negative number, got {}",
            config.delay_seconds
        )));
    }

    validate_policy(&CrawlPolicy::from(config))
}

fn validate_policy(policy: &CrawlPolicy) -> Result<(), ConfigError> {
    if policy.checkpoint_every < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_every must be >= 1".to_string(),
        ));
    }

    if policy.extraction_timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "extraction_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&policy.max_failure_ratio) {
        return Err(ConfigError::Validation(format!(
            "max_failure_ratio must be between 0 and 1, got {}",
            policy.max_failure_ratio
        )));
    }

    if !(0.0..=1.0).contains(&policy.min_quality) {
        return Err(ConfigError::Validation(format!(
            "min_quality must be between 0 and 1, got {}",
            policy.min_quality
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if config.state_path.is_empty() {
        return Err(ConfigError::Validation(
            "state_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
