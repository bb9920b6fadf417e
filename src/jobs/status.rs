//! Job status snapshots
//!
//! The crawl loop publishes its progress into a [`SharedStatus`]; callers
//! only ever read cloned [`JobStatus`] values from it, never the store.

use crate::jobs::{JobId, JobState};
use crate::state::CrawlState;
use crate::storage::JobRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub root_url: String,
    pub state: JobState,
    /// Pages attempted so far
    pub pages_processed: u32,
    pub pages_failed: u32,
    pub pages_total_estimate: u32,
    pub pending: usize,
    /// Page currently being extracted
    pub current_url: Option<String>,
    /// Set when the job is Failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobStatus {
    /// Status of a job that has not run yet
    pub fn queued(job_id: JobId, root_url: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            root_url: root_url.into(),
            state: JobState::Queued,
            pages_processed: 0,
            pages_failed: 0,
            pages_total_estimate: 0,
            pending: 0,
            current_url: None,
            error: None,
            created_at,
        }
    }

    /// Status reconstructed from a persisted record
    pub fn from_record(record: &JobRecord) -> Self {
        let mut status = Self::queued(record.job_id, record.config.root_url.clone(), record.created_at);
        status.state = record.status;
        status.error = record.error.clone();
        status.apply_progress(&record.state);
        status
    }

    /// Copies the counters of a crawl state
    pub fn apply_progress(&mut self, state: &CrawlState) {
        self.pages_processed = state.pages_processed;
        self.pages_failed = state.pages_failed;
        self.pages_total_estimate = state.pages_total_estimate();
        self.pending = state.pending_count();
    }

    /// True when some pages failed but the job itself did not
    pub fn has_page_failures(&self) -> bool {
        self.pages_failed > 0 && self.state != JobState::Failed
    }
}

/// Status cell shared between a job's crawl loop and its readers
#[derive(Debug, Clone)]
pub struct SharedStatus(Arc<RwLock<JobStatus>>);

impl SharedStatus {
    pub fn new(status: JobStatus) -> Self {
        Self(Arc::new(RwLock::new(status)))
    }

    /// Returns a consistent copy of the current status
    pub fn snapshot(&self) -> JobStatus {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Applies `f` under the write lock
    pub fn update(&self, f: impl FnOnce(&mut JobStatus)) {
        let mut guard = match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }

    pub fn state(&self) -> JobState {
        self.snapshot().state
    }
}
