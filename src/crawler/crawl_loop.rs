//! Crawl loop - drives one job's crawl state
//!
//! This module contains the per-job loop that coordinates:
//! - Pulling targets from the frontier in breadth-first order
//! - Spacing fetches with the job's rate limiter
//! - Extracting, writing and expanding each page
//! - Checkpointing through the state store
//! - Observing pause/stop requests and the failure ceiling

use crate::crawler::extractor::ContentExtractor;
use crate::crawler::rate_limiter::RateLimiter;
use crate::jobs::{JobState, JobStatus, SharedStatus};
use crate::output::{
    document_id_for, render_index, render_markdown, site_dir, DocumentWriter, INDEX_DOCUMENT,
};
use crate::state::{CrawlTarget, DocumentEntry, PageOutcome};
use crate::storage::{save_with_retry, JobRecord, StateStore, StoreResult};
use crate::url::{normalize_url, ScopePolicy};
use crate::ScribeError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Cooperative control signal sent to a running crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Run,
    Pause,
    Stop,
}

/// Why the loop stopped iterating
#[derive(Debug)]
enum Exit {
    Completed,
    Paused,
    Stopped,
    Failed(ScribeError),
}

/// One job's crawl loop
///
/// Owns the job's record (and therefore its `CrawlState`) for as long as it
/// runs; nothing else mutates the state in the meantime.
pub struct CrawlLoop {
    record: JobRecord,
    scope: ScopePolicy,
    limiter: RateLimiter,
    extractor: Arc<dyn ContentExtractor>,
    writer: Arc<dyn DocumentWriter>,
    store: Arc<dyn StateStore>,
    control: watch::Receiver<Control>,
    status: SharedStatus,
    site_dir: String,
    since_checkpoint: u32,
}

impl CrawlLoop {
    /// Creates a loop for a record whose state is already initialized or restored
    pub fn new(
        record: JobRecord,
        extractor: Arc<dyn ContentExtractor>,
        writer: Arc<dyn DocumentWriter>,
        store: Arc<dyn StateStore>,
        control: watch::Receiver<Control>,
        status: SharedStatus,
    ) -> Self {
        let root = &record.state.root_url;
        let scope = ScopePolicy::from_root(root, &record.config.policy);
        let site_dir = site_dir(root);
        let delay = Duration::try_from_secs_f64(record.state.delay_seconds).unwrap_or(Duration::ZERO);

        Self {
            record,
            scope,
            limiter: RateLimiter::new(delay),
            extractor,
            writer,
            store,
            control,
            status,
            site_dir,
            since_checkpoint: 0,
        }
    }

    /// Runs until the job completes, fails, or is paused or stopped
    ///
    /// Never returns an error: job-level failures end up in the returned
    /// status (and in the shared status) as `Failed` with an error message.
    pub async fn run(mut self) -> JobStatus {
        let state = &self.record.state;
        info!(
            "Job {} crawling {} (max depth {}, max pages {}, {} pending, {} visited)",
            self.record.job_id,
            state.root_url,
            state.max_depth,
            state.max_pages,
            state.pending_count(),
            state.visited.len()
        );

        let exit = self.drive().await;
        self.finish(exit).await
    }

    async fn drive(&mut self) -> Exit {
        loop {
            let signal = *self.control.borrow();
            match signal {
                Control::Pause => return Exit::Paused,
                Control::Stop => return Exit::Stopped,
                Control::Run => {}
            }

            if self.record.state.frontier.is_empty() || self.record.state.budget_exhausted() {
                return self.exhausted();
            }

            if let Some(signal) = self.wait_turn().await {
                return match signal {
                    Control::Stop => Exit::Stopped,
                    _ => Exit::Paused,
                };
            }

            let Some(target) = self.record.state.dequeue() else {
                continue;
            };
            if self.record.state.is_visited(target.key()) {
                trace!("Skipping already visited {}", target.url);
                continue;
            }

            self.status
                .update(|s| s.current_url = Some(target.url.to_string()));
            let outcome = self.process(&target).await;
            debug!(
                "[{}/{}] {} at depth {}: {}",
                self.record.state.pages_processed,
                self.record.state.max_pages,
                target.url,
                target.depth,
                outcome
            );

            self.since_checkpoint += 1;
            if self.since_checkpoint >= self.record.config.policy.checkpoint_every {
                if let Err(e) = self.checkpoint(JobState::Running).await {
                    return Exit::Failed(e.into());
                }
            }
            self.publish_progress();

            if let Some(e) = self.ceiling_tripped() {
                return Exit::Failed(e);
            }
        }
    }

    /// Sleeps out the rate limit unless a pause or stop arrives first
    async fn wait_turn(&mut self) -> Option<Control> {
        tokio::select! {
            _ = self.limiter.wait() => None,
            signal = next_signal(&mut self.control) => Some(signal),
        }
    }

    /// Visits one page, records its outcome, then expands its links
    ///
    /// The page is counted before its links are enqueued so the page budget
    /// already includes it.
    async fn process(&mut self, target: &CrawlTarget) -> PageOutcome {
        let (outcome, links) = self.visit(target).await;
        self.record.state.record(target.key(), outcome);
        self.expand(&links, target.depth + 1);
        outcome
    }

    /// Extracts and writes one page, returning its outcome and links
    ///
    /// Failed pages yield no links.
    async fn visit(&mut self, target: &CrawlTarget) -> (PageOutcome, Vec<String>) {
        let timeout = self.record.config.policy.extraction_timeout();
        let doc = match tokio::time::timeout(timeout, self.extractor.extract(&target.url)).await {
            Ok(Ok(doc)) => doc,
            Ok(Err(e)) => {
                warn!("Failed to extract {}: {}", target.url, e);
                return (PageOutcome::Failed, Vec::new());
            }
            Err(_) => {
                warn!("Extraction of {} timed out after {:?}", target.url, timeout);
                return (PageOutcome::Failed, Vec::new());
            }
        };

        let outcome = if doc.quality_signal < self.record.config.policy.min_quality {
            debug!(
                "Skipping {}: quality {:.2} below threshold",
                target.url, doc.quality_signal
            );
            PageOutcome::Skipped
        } else {
            let document_id = document_id_for(&target.url);
            let content = render_markdown(&doc, Utc::now());
            let path = format!("{}/{}", self.site_dir, document_id);
            if let Err(e) = self.writer.write(&path, content.as_bytes()).await {
                warn!("Failed to write {} for {}: {}", path, target.url, e);
                return (PageOutcome::Failed, Vec::new());
            }
            self.record.state.documents.push(DocumentEntry {
                url: target.key().to_string(),
                document_id,
                title: doc.title.clone(),
            });
            PageOutcome::Success
        };

        (outcome, doc.discovered_links)
    }

    /// Enqueues the in-scope links of a page at `depth`
    fn expand(&mut self, links: &[String], depth: u32) {
        let mut queued = 0usize;
        for link in links {
            match normalize_url(link) {
                Ok(url) if !self.scope.in_scope(&url) => {
                    trace!("Out of scope: {}", url);
                    self.record.state.dropped.out_of_scope += 1;
                }
                Ok(url) => {
                    if self.record.state.enqueue(url.as_str(), depth).is_queued() {
                        queued += 1;
                    }
                }
                Err(e) => {
                    trace!("Dropping link {}: {}", link, e);
                    self.record.state.dropped.invalid += 1;
                }
            }
        }
        if !links.is_empty() {
            debug!("Queued {} of {} links at depth {}", queued, links.len(), depth);
        }
    }

    fn exhausted(&self) -> Exit {
        let state = &self.record.state;
        if state.all_attempts_failed() {
            Exit::Failed(ScribeError::ExcessFailures {
                failed: state.pages_failed,
                attempted: state.pages_processed,
            })
        } else {
            Exit::Completed
        }
    }

    fn ceiling_tripped(&self) -> Option<ScribeError> {
        let state = &self.record.state;
        let policy = &self.record.config.policy;
        let tripped = state.pages_processed >= policy.min_attempts_before_failure
            && state.failure_ratio() > policy.max_failure_ratio;

        tripped.then(|| ScribeError::ExcessFailures {
            failed: state.pages_failed,
            attempted: state.pages_processed,
        })
    }

    async fn checkpoint(&mut self, status: JobState) -> StoreResult<()> {
        self.record.status = status;
        self.record.state.last_checkpoint_at = Some(Utc::now());

        let retries = self.record.config.policy.store_retries;
        let backoff = self.record.config.policy.store_retry_backoff();
        save_with_retry(&self.store, &self.record, retries, backoff).await?;

        self.since_checkpoint = 0;
        trace!("Checkpointed job {}", self.record.job_id);
        Ok(())
    }

    fn publish_progress(&self) {
        let state = &self.record.state;
        self.status.update(|s| {
            s.apply_progress(state);
            s.current_url = None;
        });
    }

    async fn write_index(&self) {
        let state = &self.record.state;
        let content = render_index(&state.root_url, &state.documents, Utc::now());
        let path = format!("{}/{}", self.site_dir, INDEX_DOCUMENT);
        if let Err(e) = self.writer.write(&path, content.as_bytes()).await {
            warn!("Failed to write index {}: {}", path, e);
        }
    }

    /// Records the final state durably and publishes it
    async fn finish(mut self, exit: Exit) -> JobStatus {
        let (mut final_state, mut final_error) = match exit {
            Exit::Completed => (JobState::Completed, None),
            Exit::Paused => (JobState::Paused, None),
            Exit::Stopped => (JobState::Stopped, None),
            Exit::Failed(e) => (JobState::Failed, Some(e.to_string())),
        };

        if final_state == JobState::Completed {
            self.write_index().await;
        }

        self.record.error = final_error.clone();
        if let Err(e) = self.checkpoint(final_state).await {
            error!(
                "Job {}: could not persist final state {}: {}",
                self.record.job_id, final_state, e
            );
            if final_error.is_none() {
                final_error = Some(ScribeError::from(e).to_string());
            }
            final_state = JobState::Failed;
        }

        let state = &self.record.state;
        match &final_error {
            Some(e) => error!("Job {} failed: {}", self.record.job_id, e),
            None => info!(
                "Job {} {}: {} pages processed, {} failed, {} documents written",
                self.record.job_id,
                final_state,
                state.pages_processed,
                state.pages_failed,
                state.documents.len()
            ),
        }

        self.status.update(|s| {
            s.state = final_state;
            s.error = final_error;
            s.current_url = None;
            s.apply_progress(state);
        });
        self.status.snapshot()
    }
}

/// Resolves with the next non-`Run` control value
///
/// Never resolves if every sender is gone.
async fn next_signal(control: &mut watch::Receiver<Control>) -> Control {
    loop {
        if control.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        let signal = *control.borrow_and_update();
        if signal != Control::Run {
            return signal;
        }
    }
}
