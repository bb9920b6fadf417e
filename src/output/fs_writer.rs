//! Filesystem document writer
//!
//! Writes each document to `<output_dir>/<document_id>`, creating parent
//! directories as needed.

use crate::output::traits::{DocumentWriter, WriteError, WriteResult};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Writes documents below an output directory
#[derive(Debug, Clone)]
pub struct FsDocumentWriter {
    root: PathBuf,
}

impl FsDocumentWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves an id to a path, refusing anything that escapes the root
    fn resolve(&self, document_id: &str) -> WriteResult<PathBuf> {
        let relative = Path::new(document_id);
        let is_plain = !document_id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(WriteError::InvalidId(document_id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentWriter for FsDocumentWriter {
    async fn write(&self, document_id: &str, content: &[u8]) -> WriteResult<()> {
        let path = self.resolve(document_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        tracing::debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }
}
