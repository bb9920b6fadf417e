//! Storage traits and error types
//!
//! This module defines the trait interface for state store backends and
//! associated error types.

use crate::jobs::JobId;
use crate::storage::JobRecord;
use thiserror::Error;

/// Errors that can occur during state store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No persisted state for job {0}")]
    NotFound(JobId),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record for job {job_id}: {reason}")]
    Corrupt { job_id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable, per-job storage of crawl checkpoints
///
/// Implementations must be safe to share between concurrently running jobs.
/// `save` is atomic: after a crash the store holds either the previous or
/// the new record for that job, never a mix of both.
pub trait StateStore: Send + Sync {
    /// Atomically replaces the persisted record of `record.job_id`
    fn save(&self, record: &JobRecord) -> StoreResult<()>;

    /// Loads the latest record of a job
    ///
    /// Returns `StoreError::NotFound` if the job was never saved.
    fn load(&self, job_id: JobId) -> StoreResult<JobRecord>;

    /// Returns true if a record exists for the job
    fn exists(&self, job_id: JobId) -> StoreResult<bool>;

    /// Loads every persisted record, oldest job first
    fn list(&self) -> StoreResult<Vec<JobRecord>>;

    /// Removes a job's record; deleting a missing job is not an error
    fn delete(&self, job_id: JobId) -> StoreResult<()>;
}
