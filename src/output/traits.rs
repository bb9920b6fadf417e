//! Output writer trait and error types
//!
//! This module defines the trait interface for document writers and
//! associated error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while writing a document
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Invalid document id '{0}'")]
    InvalidId(String),

    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type WriteResult<T> = Result<T, WriteError>;

/// Destination for generated documents
///
/// `document_id` is a relative, `/`-separated name such as
/// `example.com/guide_1a2b3c4d.md`. Writing the same id twice replaces the
/// earlier content.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Writes `content` under `document_id`
    async fn write(&self, document_id: &str, content: &[u8]) -> WriteResult<()>;
}
