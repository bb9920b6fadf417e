//! Content extraction contract
//!
//! The crawl loop hands every dequeued URL to a [`ContentExtractor`] and
//! only consumes the returned [`ExtractedDocument`]. Extractors perform no
//! retries; a failed call is recorded against the URL and the crawl moves on.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Structured content of one page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    /// The URL that was extracted
    pub source_url: Url,

    pub title: String,

    pub body_text: String,

    /// Absolute URLs found on the page, in document order
    pub discovered_links: Vec<String>,

    /// Content quality in `[0, 1]`; pages below the job's threshold are skipped
    pub quality_signal: f32,
}

/// Per-page extraction failures
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Not a content page (Content-Type: {0})")]
    NotContent(String),

    #[error("Failed to parse page: {0}")]
    Parse(String),

    #[error("Extractor error: {0}")]
    Extractor(String),
}

/// Converts a URL into a structured document
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &Url) -> Result<ExtractedDocument, ExtractionError>;
}

/// Maps a body word count to a quality signal, saturating at 300 words
pub fn quality_from_word_count(words: usize) -> f32 {
    const SATURATION: usize = 300;
    words.min(SATURATION) as f32 / SATURATION as f32
}
