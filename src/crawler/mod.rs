//! Crawler module for page extraction and the per-job crawl loop
//!
//! This module contains the core crawling logic, including:
//! - The content extraction contract and its HTTP implementation
//! - HTML parsing into title, body text and links
//! - Per-job rate limiting
//! - The crawl loop that ties frontier, writer and store together

mod crawl_loop;
mod extractor;
mod fetcher;
mod parser;
mod rate_limiter;

pub use crawl_loop::{Control, CrawlLoop};
pub use extractor::{quality_from_word_count, ContentExtractor, ExtractedDocument, ExtractionError};
pub use fetcher::{build_http_client, fetch_page, FetchedPage, HttpExtractor};
pub use parser::{parse_html, ParsedPage};
pub use rate_limiter::RateLimiter;
