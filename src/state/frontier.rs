//! Frontier operations on a `CrawlState`
//!
//! The frontier is a FIFO of normalized URLs; together with the visited set
//! it guarantees each URL is dequeued at most once per job.

use crate::state::{CrawlState, CrawlTarget, PageOutcome};
use crate::url::normalize_url;
use tracing::trace;

/// What `enqueue` did with a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    AlreadyVisited,
    AlreadyPending,
    DepthExceeded,
    BudgetExhausted,
    Invalid,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

impl CrawlState {
    /// Normalizes and appends a URL to the frontier
    ///
    /// Drops the URL (and counts the drop) if it is already visited or
    /// pending, deeper than `max_depth`, or if the page budget is already
    /// covered by processed plus pending pages. A pending URL keeps the depth
    /// it was first seen at.
    pub fn enqueue(&mut self, url: &str, depth: u32) -> EnqueueOutcome {
        let outcome = self.try_enqueue(url, depth);
        match outcome {
            EnqueueOutcome::Queued => {}
            EnqueueOutcome::AlreadyVisited => self.dropped.already_visited += 1,
            EnqueueOutcome::AlreadyPending => self.dropped.already_pending += 1,
            EnqueueOutcome::DepthExceeded => self.dropped.depth_exceeded += 1,
            EnqueueOutcome::BudgetExhausted => self.dropped.budget_exhausted += 1,
            EnqueueOutcome::Invalid => self.dropped.invalid += 1,
        }
        if !outcome.is_queued() {
            trace!("Dropped {} at depth {}: {:?}", url, depth, outcome);
        }
        outcome
    }

    fn try_enqueue(&mut self, url: &str, depth: u32) -> EnqueueOutcome {
        let Ok(normalized) = normalize_url(url) else {
            return EnqueueOutcome::Invalid;
        };
        let key = normalized.as_str();

        if self.visited.contains_key(key) {
            return EnqueueOutcome::AlreadyVisited;
        }
        if self.pending.contains(key) {
            return EnqueueOutcome::AlreadyPending;
        }
        if depth > self.max_depth {
            return EnqueueOutcome::DepthExceeded;
        }
        if self.pages_processed as usize + self.frontier.len() >= self.max_pages as usize {
            return EnqueueOutcome::BudgetExhausted;
        }

        self.pending.insert(key.to_string());
        self.frontier.push_back(CrawlTarget {
            url: normalized,
            depth,
            root: self.root_url.clone(),
        });
        EnqueueOutcome::Queued
    }

    /// Pops the oldest frontier entry
    pub fn dequeue(&mut self) -> Option<CrawlTarget> {
        let target = self.frontier.pop_front()?;
        self.pending.remove(target.key());
        Some(target)
    }

    /// Moves a URL into the visited set with the given outcome
    ///
    /// Marking an already visited URL again just replaces its outcome. A URL
    /// still pending is taken out of the frontier.
    pub fn mark(&mut self, key: &str, outcome: PageOutcome) {
        if self.pending.remove(key) {
            self.frontier.retain(|t| t.key() != key);
        }
        self.visited.insert(key.to_string(), outcome);
    }

    /// Marks a processed page and updates the attempt counters
    ///
    /// Counters only move the first time a URL is recorded.
    pub fn record(&mut self, key: &str, outcome: PageOutcome) {
        if self.visited.contains_key(key) {
            return;
        }
        self.mark(key, outcome);
        self.pages_processed += 1;
        if outcome.is_failure() {
            self.pages_failed += 1;
        }
    }

    /// Ratio of failed pages to attempted pages
    pub fn failure_ratio(&self) -> f64 {
        if self.pages_processed == 0 {
            0.0
        } else {
            self.pages_failed as f64 / self.pages_processed as f64
        }
    }

    /// True when pages were attempted and none of them succeeded or was skipped
    pub fn all_attempts_failed(&self) -> bool {
        self.pages_failed > 0 && self.pages_failed == self.pages_processed
    }
}
