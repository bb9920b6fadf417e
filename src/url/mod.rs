//! URL handling module for Site-Scribe
//!
//! This module provides URL normalization, host extraction, wildcard host
//! matching and the scope policy that keeps a crawl on its website.

mod normalize;
mod scope;

pub use normalize::normalize_url;
pub use scope::{extract_host, matches_wildcard, ScopePolicy};
