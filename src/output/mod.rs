//! Output module for generated documents
//!
//! This module handles:
//! - Naming documents after their URL
//! - Rendering pages and the per-site index as markdown
//! - Writing documents through a `DocumentWriter`

mod fs_writer;
mod markdown;
mod traits;

pub use fs_writer::FsDocumentWriter;
pub use markdown::{document_id_for, render_index, render_markdown, site_dir, INDEX_DOCUMENT};
pub use traits::{DocumentWriter, WriteError, WriteResult};
