use crate::state::PageOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use url::Url;

/// A normalized URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    /// Normalized URL (the deduplication key)
    pub url: Url,

    /// Discovery depth; the root is 0
    pub depth: u32,

    /// The depth-0 root this target was reached from
    pub root: Url,
}

impl CrawlTarget {
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

/// Normalized URL → outcome, for every URL that left the frontier
pub type VisitedSet = BTreeMap<String, PageOutcome>;

/// A written document, in processing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub url: String,
    pub document_id: String,
    pub title: String,
}

/// Counters for links that `enqueue` silently dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub already_visited: u64,
    pub already_pending: u64,
    pub depth_exceeded: u64,
    pub budget_exhausted: u64,
    pub out_of_scope: u64,
    pub invalid: u64,
}

impl DropCounts {
    pub fn total(&self) -> u64 {
        self.already_visited
            + self.already_pending
            + self.depth_exceeded
            + self.budget_exhausted
            + self.out_of_scope
            + self.invalid
    }
}

/// Durable progress of one crawl job
///
/// Owned by exactly one job and mutated only by its crawl loop. The whole
/// value is what gets checkpointed; `pending` is an index over `frontier`
/// and is rebuilt after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlState {
    pub root_url: Url,
    pub max_depth: u32,
    pub max_pages: u32,
    pub delay_seconds: f64,
    pub frontier: VecDeque<CrawlTarget>,
    pub visited: VisitedSet,
    /// Pages attempted, whatever their outcome
    pub pages_processed: u32,
    pub pages_failed: u32,
    pub documents: Vec<DocumentEntry>,
    pub dropped: DropCounts,
    pub started_at: DateTime<Utc>,
    pub last_checkpoint_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) pending: HashSet<String>,
}

impl PartialEq for CrawlState {
    fn eq(&self, other: &Self) -> bool {
        self.root_url == other.root_url
            && self.max_depth == other.max_depth
            && self.max_pages == other.max_pages
            && self.delay_seconds == other.delay_seconds
            && self.frontier == other.frontier
            && self.visited == other.visited
            && self.pages_processed == other.pages_processed
            && self.pages_failed == other.pages_failed
            && self.documents == other.documents
            && self.dropped == other.dropped
            && self.started_at == other.started_at
            && self.last_checkpoint_at == other.last_checkpoint_at
    }
}

impl CrawlState {
    /// Creates a fresh state with the root enqueued at depth 0
    ///
    /// The root is expected to be normalized already.
    pub fn new(root_url: Url, max_depth: u32, max_pages: u32, delay_seconds: f64) -> Self {
        let mut state = Self {
            root_url: root_url.clone(),
            max_depth,
            max_pages,
            delay_seconds,
            frontier: VecDeque::new(),
            visited: VisitedSet::new(),
            pages_processed: 0,
            pages_failed: 0,
            documents: Vec::new(),
            dropped: DropCounts::default(),
            started_at: Utc::now(),
            last_checkpoint_at: None,
            pending: HashSet::new(),
        };
        state.enqueue(root_url.as_str(), 0);
        state
    }

    /// Rebuilds the pending index after the frontier was restored
    ///
    /// Frontier entries that were already visited (possible only for a
    /// snapshot written by an older or foreign writer) are dropped here so
    /// they can never be dequeued.
    pub fn restore(mut self) -> Self {
        let visited = &self.visited;
        let mut pending = HashSet::with_capacity(self.frontier.len());
        self.frontier
            .retain(|t| !visited.contains_key(t.key()) && pending.insert(t.key().to_string()));
        self.pending = pending;
        self
    }

    pub fn pending_count(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains(key)
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.visited.contains_key(key)
    }

    pub fn outcome(&self, key: &str) -> Option<PageOutcome> {
        self.visited.get(key).copied()
    }

    pub fn pages_succeeded(&self) -> usize {
        self.visited.values().filter(|o| o.is_success()).count()
    }

    pub fn pages_skipped(&self) -> usize {
        self.visited
            .values()
            .filter(|o| matches!(o, PageOutcome::Skipped))
            .count()
    }

    /// True once the page budget is spent
    pub fn budget_exhausted(&self) -> bool {
        self.pages_processed >= self.max_pages
    }

    /// Best guess of the total pages this job will attempt
    pub fn pages_total_estimate(&self) -> u32 {
        let projected = self.pages_processed as u64 + self.frontier.len() as u64;
        projected.min(self.max_pages as u64) as u32
    }
}
