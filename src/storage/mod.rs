//! Storage module for persisting crawl checkpoints
//!
//! This module handles durable job state, including:
//! - The `StateStore` contract shared by all backends
//! - A SQLite backend (one database, many jobs)
//! - A JSON-file backend (one file per job, atomic rename)

mod json_file;
mod schema;
mod sqlite;
mod traits;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStateStore;
pub use traits::{StateStore, StoreError, StoreResult};

use crate::config::{JobConfig, OutputConfig, StateBackend};
use crate::jobs::{JobId, JobState};
use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything persisted about one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobState,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub config: JobConfig,
    pub state: CrawlState,
}

/// Opens the state store selected by the output configuration
///
/// # Arguments
///
/// * `output` - Output section naming the backend and its path
///
/// # Returns
///
/// * `Ok(Arc<dyn StateStore>)` - Store ready to be shared between jobs
/// * `Err(StoreError)` - Failed to open the database or directory
pub fn open_store(output: &OutputConfig) -> StoreResult<Arc<dyn StateStore>> {
    let path = Path::new(&output.state_path);
    let store: Arc<dyn StateStore> = match output.state_backend {
        StateBackend::Sqlite => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStateStore::open(path)?)
        }
        StateBackend::Json => Arc::new(JsonFileStore::open(path)?),
    };
    Ok(store)
}

/// Saves a record, retrying failed writes with exponential backoff
///
/// Makes `1 + retries` attempts, sleeping `backoff · 2^attempt` between
/// them, and returns the last error once they are exhausted. Each attempt
/// runs on the blocking pool since both backends do synchronous I/O.
pub async fn save_with_retry(
    store: &Arc<dyn StateStore>,
    record: &JobRecord,
    retries: u32,
    backoff: Duration,
) -> StoreResult<()> {
    let record = Arc::new(record.clone());
    let mut attempt = 0u32;
    loop {
        let result = {
            let store = Arc::clone(store);
            let record = Arc::clone(&record);
            tokio::task::spawn_blocking(move || store.save(&record))
                .await
                .unwrap_or_else(|e| Err(StoreError::Database(format!("save task failed: {}", e))))
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries => {
                let wait = backoff.saturating_mul(2u32.saturating_pow(attempt));
                tracing::warn!(
                    "Checkpoint of job {} failed (attempt {}/{}): {}; retrying in {:?}",
                    record.job_id,
                    attempt + 1,
                    retries + 1,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
