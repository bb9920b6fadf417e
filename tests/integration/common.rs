//! Shared test doubles

use async_trait::async_trait;
use site_scribe::config::JobConfig;
use site_scribe::crawler::{ContentExtractor, ExtractedDocument, ExtractionError};
use site_scribe::jobs::{JobId, JobManager};
use site_scribe::output::{DocumentWriter, WriteResult};
use site_scribe::storage::{JobRecord, SqliteStateStore, StateStore, StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use url::Url;

/// Extractor serving a fixed link graph
///
/// URLs missing from the graph fail with HTTP 404. Every call is recorded
/// with the (tokio) instant it started at.
#[derive(Default)]
pub struct SiteMap {
    pages: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<(String, Instant)>>,
    gate: Option<Arc<Semaphore>>,
}

impl SiteMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages
            .insert(url.to_string(), links.iter().map(|l| l.to_string()).collect());
        self
    }

    /// A root page linking to `count` leaf pages `/p0 .. /p{count-1}`
    pub fn fan_out(root: &str, count: usize) -> Self {
        let base = root.trim_end_matches('/');
        let leaves: Vec<String> = (0..count).map(|i| format!("{}/p{}", base, i)).collect();
        let mut site = Self::new();
        site.pages.insert(root.to_string(), leaves.clone());
        for leaf in leaves {
            site.pages.insert(leaf, Vec::new());
        }
        site
    }

    /// Every extraction first takes a permit from `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl ContentExtractor for SiteMap {
    async fn extract(&self, url: &Url) -> Result<ExtractedDocument, ExtractionError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ExtractionError::Extractor(e.to_string()))?
                .forget();
        }

        let links = self
            .pages
            .get(url.as_str())
            .ok_or(ExtractionError::Http(404))?;
        Ok(ExtractedDocument {
            source_url: url.clone(),
            title: format!("Title of {}", url.path()),
            body_text: format!("Body of {}", url),
            discovered_links: links.clone(),
            quality_signal: 1.0,
        })
    }
}

/// Extractor that panics on every page
pub struct PanickingExtractor;

#[async_trait]
impl ContentExtractor for PanickingExtractor {
    async fn extract(&self, url: &Url) -> Result<ExtractedDocument, ExtractionError> {
        panic!("extractor exploded on {}", url);
    }
}

/// Writer keeping documents in memory
#[derive(Default)]
pub struct MemoryWriter {
    docs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryWriter {
    pub fn ids(&self) -> Vec<String> {
        self.docs.lock().unwrap().keys().cloned().collect()
    }

    pub fn content(&self, document_id: &str) -> Option<String> {
        self.docs
            .lock()
            .unwrap()
            .get(document_id)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[async_trait]
impl DocumentWriter for MemoryWriter {
    async fn write(&self, document_id: &str, content: &[u8]) -> WriteResult<()> {
        self.docs
            .lock()
            .unwrap()
            .insert(document_id.to_string(), content.to_vec());
        Ok(())
    }
}

/// Store wrapper that can be told to reject the next few saves
pub struct FlakyStore {
    inner: Arc<dyn StateStore>,
    failures: AtomicU32,
}

impl FlakyStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(SqliteStateStore::open_in_memory().unwrap()),
            failures: AtomicU32::new(0),
        }
    }

    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn failures_left(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

impl StateStore for FlakyStore {
    fn save(&self, record: &JobRecord) -> StoreResult<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Database("injected failure".to_string()));
        }
        self.inner.save(record)
    }

    fn load(&self, job_id: JobId) -> StoreResult<JobRecord> {
        self.inner.load(job_id)
    }

    fn exists(&self, job_id: JobId) -> StoreResult<bool> {
        self.inner.exists(job_id)
    }

    fn list(&self) -> StoreResult<Vec<JobRecord>> {
        self.inner.list()
    }

    fn delete(&self, job_id: JobId) -> StoreResult<()> {
        self.inner.delete(job_id)
    }
}

/// A manager over an in-memory SQLite store
pub struct Setup {
    pub site: Arc<SiteMap>,
    pub writer: Arc<MemoryWriter>,
    pub store: Arc<dyn StateStore>,
    pub manager: JobManager,
}

impl Setup {
    pub fn new(site: SiteMap) -> Self {
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::open_in_memory().unwrap());
        Self::with_store(site, store)
    }

    pub fn with_store(site: SiteMap, store: Arc<dyn StateStore>) -> Self {
        let site = Arc::new(site);
        let writer = Arc::new(MemoryWriter::default());
        let manager = JobManager::new(store.clone(), site.clone(), writer.clone());
        Self {
            site,
            writer,
            store,
            manager,
        }
    }
}

/// Job configuration with no delay and a checkpoint after every page
pub fn job(root: &str, max_depth: u32, max_pages: u32) -> JobConfig {
    JobConfig::new(root, max_depth, max_pages, 0.0)
}
