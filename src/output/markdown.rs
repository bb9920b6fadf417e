//! Markdown document generation
//!
//! This module names and renders the documents written for each page, plus
//! the per-site index page listing them.

use crate::crawler::ExtractedDocument;
use crate::state::DocumentEntry;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use url::Url;

const MAX_SLUG_LEN: usize = 80;

/// Name of the index page written next to a site's documents
pub const INDEX_DOCUMENT: &str = "index.md";

/// Builds a deterministic file name for a (normalized) URL
///
/// Path segments are joined with `_` (`index` for the root), reduced to
/// `[A-Za-z0-9_-]`, truncated, and suffixed with 8 hex chars of the URL's
/// SHA-256 so distinct URLs never share a name.
///
/// ```
/// use site_scribe::output::document_id_for;
/// use url::Url;
///
/// let id = document_id_for(&Url::parse("https://example.com/guide/install").unwrap());
/// assert!(id.starts_with("guide_install_"));
/// assert!(id.ends_with(".md"));
/// ```
pub fn document_id_for(url: &Url) -> String {
    let joined = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>().join("_"))
        .unwrap_or_default();

    let mut slug: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_SLUG_LEN)
        .collect();
    if slug.is_empty() {
        slug.push_str("index");
    }

    let digest = Sha256::digest(url.as_str().as_bytes());
    let hash = hex::encode(digest);
    format!("{}_{}.md", slug, &hash[..8])
}

/// Directory that groups the documents of one site
pub fn site_dir(root: &Url) -> String {
    let host = root.host_str().unwrap_or("site");
    match root.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host.to_string(),
    }
}

/// Renders a document as markdown
///
/// # Arguments
///
/// * `doc` - The extracted page
/// * `generated_at` - Timestamp recorded in the header block
///
/// # Returns
///
/// A formatted markdown string
pub fn render_markdown(doc: &ExtractedDocument, generated_at: DateTime<Utc>) -> String {
    let mut md = String::new();

    let title = if doc.title.trim().is_empty() {
        "Untitled"
    } else {
        doc.title.trim()
    };
    md.push_str(&format!("# {}\n\n", title));

    md.push_str(&format!("> **Source:** {}  \n", doc.source_url));
    md.push_str(&format!("> **Generated:** {}\n\n", generated_at.to_rfc3339()));

    md.push_str("---\n\n");
    md.push_str(doc.body_text.trim());
    md.push('\n');

    md
}

/// Renders the index page of a site
pub fn render_index(root: &Url, documents: &[DocumentEntry], generated_at: DateTime<Utc>) -> String {
    let mut md = String::new();

    md.push_str("# Documentation Index\n\n");
    md.push_str(&format!("> **Website:** {}  \n", root));
    md.push_str(&format!("> **Generated:** {}  \n", generated_at.to_rfc3339()));
    md.push_str(&format!("> **Total Pages:** {}\n\n", documents.len()));

    md.push_str("## Pages\n\n");
    for doc in documents {
        let title = if doc.title.trim().is_empty() {
            doc.url.as_str()
        } else {
            doc.title.trim()
        };
        md.push_str(&format!("- [{}]({})\n", title, doc.document_id));
    }

    md
}
