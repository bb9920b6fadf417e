//! State module for tracking crawl progress
//!
//! This module provides the durable progress of a crawl job.
//!
//! # Components
//!
//! - `CrawlTarget`: A normalized URL with its discovery depth
//! - `PageOutcome`: The outcome tag recorded for every processed URL
//! - `CrawlState`: Frontier, visited set and counters of one job
//! - `EnqueueOutcome`: Why the frontier accepted or dropped a URL

mod crawl_state;
mod frontier;
mod page_outcome;

// Re-export main types
pub use crawl_state::{CrawlState, CrawlTarget, DocumentEntry, DropCounts, VisitedSet};
pub use frontier::EnqueueOutcome;
pub use page_outcome::PageOutcome;
