//! HTTP fetcher and the default content extractor
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Error classification
//! - Turning a fetched page into an `ExtractedDocument`

use crate::config::UserAgentConfig;
use crate::crawler::extractor::{
    quality_from_word_count, ContentExtractor, ExtractedDocument, ExtractionError,
};
use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// A successfully fetched HTML page
#[derive(Debug)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: String,
    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use site_scribe::config::UserAgentConfig;
/// use site_scribe::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SiteScribe".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches an HTML page
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with HTML body | `Ok(FetchedPage)` |
/// | Non-2xx status | `Http(status)` |
/// | Non-HTML Content-Type | `NotContent` |
/// | Timeout | `Timeout` |
/// | Connection / body errors | `Network` |
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, ExtractionError> {
    let response = client.get(url.clone()).send().await.map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExtractionError::Http(status.as_u16()));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return Err(ExtractionError::NotContent(content_type));
    }

    let body = response.text().await.map_err(classify)?;

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    })
}

fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn classify(e: reqwest::Error) -> ExtractionError {
    if e.is_timeout() {
        ExtractionError::Timeout
    } else if e.is_connect() {
        ExtractionError::Network(format!("Connection failed: {}", e))
    } else {
        ExtractionError::Network(e.to_string())
    }
}

/// Default extractor: fetch over HTTP and parse the HTML
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    pub fn new(user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(user_agent)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(&self, url: &Url) -> Result<ExtractedDocument, ExtractionError> {
        let page = fetch_page(&self.client, url).await?;
        tracing::trace!(
            "Fetched {} ({}, {})",
            page.final_url,
            page.status_code,
            page.content_type
        );

        let parsed = parse_html(&page.body, &page.final_url);
        let quality_signal = quality_from_word_count(parsed.word_count());

        Ok(ExtractedDocument {
            source_url: url.clone(),
            title: parsed.title.unwrap_or_default(),
            body_text: parsed.body_text,
            discovered_links: parsed.links,
            quality_signal,
        })
    }
}
