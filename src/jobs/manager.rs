//! Job control surface
//!
//! The manager registers jobs, launches one crawl loop task per running job
//! and exposes submit/start/pause/stop/status to callers. Jobs share the
//! extractor, the writer and the state store, but never any crawl state.

use crate::config::JobConfig;
use crate::crawler::{ContentExtractor, Control, CrawlLoop};
use crate::jobs::{JobId, JobState, JobStatus, SharedStatus};
use crate::output::DocumentWriter;
use crate::state::CrawlState;
use crate::storage::{save_with_retry, JobRecord, StateStore};
use crate::url::normalize_url;
use crate::{Result, ScribeError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// Handle on a launched crawl loop
struct RunHandle {
    /// Distinguishes this run from later runs of the same job
    run_id: u64,
    control: watch::Sender<Control>,
    done: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

struct JobEntry {
    config: JobConfig,
    created_at: DateTime<Utc>,
    status: SharedStatus,
    run: Option<RunHandle>,
}

type Registry = Arc<Mutex<HashMap<JobId, JobEntry>>>;

fn lock(jobs: &Mutex<HashMap<JobId, JobEntry>>) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
    match jobs.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Everything the background task of one run needs
struct RunContext {
    job_id: JobId,
    run_id: u64,
    config: JobConfig,
    created_at: DateTime<Utc>,
    previous: JobState,
    status: SharedStatus,
    store: Arc<dyn StateStore>,
    extractor: Arc<dyn ContentExtractor>,
    writer: Arc<dyn DocumentWriter>,
    jobs: Registry,
}

impl RunContext {
    /// Checkpoints the Running transition, then drives the crawl loop
    ///
    /// `ready` receives the outcome of the initial checkpoint. A control
    /// signal sent before the loop starts is seen by its first iteration.
    async fn run(
        self,
        control: watch::Receiver<Control>,
        done: watch::Sender<bool>,
        ready: oneshot::Sender<Result<()>>,
    ) {
        let record = match prepare_run(&self.store, self.job_id, &self.config, self.created_at).await {
            Ok(record) => {
                let _ = ready.send(Ok(()));
                record
            }
            Err(e) => {
                warn!("Job {} could not start: {}", self.job_id, e);
                let previous = self.previous;
                self.status.update(|s| s.state = previous);
                let _ = ready.send(Err(e));
                self.release(done);
                return;
            }
        };

        self.status.update(|s| {
            s.error = None;
            s.current_url = None;
            s.apply_progress(&record.state);
        });

        let crawl = CrawlLoop::new(
            record,
            Arc::clone(&self.extractor),
            Arc::clone(&self.writer),
            Arc::clone(&self.store),
            control,
            self.status.clone(),
        );

        // the loop runs in its own task so a panicking collaborator is
        // reported here instead of leaving the job Running
        match tokio::spawn(crawl.run()).await {
            Ok(final_status) => {
                debug!("Job {} task finished as {}", self.job_id, final_status.state)
            }
            Err(e) => self.abort_run(e).await,
        }
        self.release(done);
    }

    /// Marks a job Failed after its crawl loop died, in memory and in the store
    async fn abort_run(&self, e: JoinError) {
        let message = if e.is_panic() {
            format!("Crawl loop panicked: {}", panic_message(e.into_panic()))
        } else {
            "Crawl loop was cancelled".to_string()
        };
        error!("Job {} failed: {}", self.job_id, message);

        self.status.update(|s| {
            s.state = JobState::Failed;
            s.error = Some(message.clone());
            s.current_url = None;
        });

        // best effort: keep the last checkpoint, only change its status
        let store = Arc::clone(&self.store);
        let job_id = self.job_id;
        let persisted = tokio::task::spawn_blocking(move || {
            let mut record = store.load(job_id)?;
            record.status = JobState::Failed;
            record.error = Some(message);
            store.save(&record)
        })
        .await;
        match persisted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Job {}: could not persist failure: {}", job_id, e),
            Err(e) => warn!("Job {}: could not persist failure: {}", job_id, e),
        }
    }

    /// Forgets this run's handle and wakes everyone waiting on it
    fn release(self, done: watch::Sender<bool>) {
        if let Some(entry) = lock(&self.jobs).get_mut(&self.job_id) {
            if entry.run.as_ref().is_some_and(|run| run.run_id == self.run_id) {
                entry.run = None;
            }
        }
        let _ = done.send(true);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Loads (or creates) the crawl state of a run and checkpoints it as Running
async fn prepare_run(
    store: &Arc<dyn StateStore>,
    job_id: JobId,
    config: &JobConfig,
    created_at: DateTime<Utc>,
) -> Result<JobRecord> {
    let state = match store.load(job_id) {
        Ok(record) => {
            info!(
                "Resuming job {} from checkpoint ({} visited, {} pending)",
                job_id,
                record.state.visited.len(),
                record.state.pending_count()
            );
            record.state
        }
        Err(e) if e.is_not_found() => {
            let root = normalize_url(&config.root_url)?;
            CrawlState::new(root, config.max_depth, config.max_pages, config.delay_seconds)
        }
        Err(e) => return Err(e.into()),
    };

    let record = JobRecord {
        job_id,
        status: JobState::Running,
        error: None,
        created_at,
        config: config.clone(),
        state,
    };
    let policy = &record.config.policy;
    save_with_retry(store, &record, policy.store_retries, policy.store_retry_backoff()).await?;
    Ok(record)
}

/// Registry and lifecycle controller for crawl jobs
pub struct JobManager {
    store: Arc<dyn StateStore>,
    extractor: Arc<dyn ContentExtractor>,
    writer: Arc<dyn DocumentWriter>,
    jobs: Registry,
    next_run: AtomicU64,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        extractor: Arc<dyn ContentExtractor>,
        writer: Arc<dyn DocumentWriter>,
    ) -> Self {
        Self {
            store,
            extractor,
            writer,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_run: AtomicU64::new(0),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        lock(&self.jobs)
    }

    fn register(&self, job_id: JobId, config: JobConfig, status: JobStatus) {
        let entry = JobEntry {
            created_at: status.created_at,
            config,
            status: SharedStatus::new(status),
            run: None,
        };
        self.jobs().insert(job_id, entry);
    }

    /// Validates a configuration and registers a Queued job
    ///
    /// Invalid configurations are rejected here and never create a job.
    pub fn submit(&self, config: JobConfig) -> Result<JobId> {
        config.validate()?;
        normalize_url(&config.root_url)?;

        let job_id = JobId::new();
        let status = JobStatus::queued(job_id, config.root_url.clone(), Utc::now());
        info!("Submitted job {} for {}", job_id, config.root_url);
        self.register(job_id, config, status);
        Ok(job_id)
    }

    /// Submits and immediately starts a job
    pub async fn launch(&self, config: JobConfig) -> Result<JobId> {
        let job_id = self.submit(config)?;
        self.start(job_id).await?;
        Ok(job_id)
    }

    /// Starts a Queued job or resumes a Paused one
    ///
    /// A job with a persisted record continues from it; otherwise a fresh
    /// state is created with the root enqueued at depth 0. Returns once the
    /// transition to Running is checkpointed. The job can be paused or
    /// stopped as soon as it reads Running, even before `start` returns.
    pub async fn start(&self, job_id: JobId) -> Result<()> {
        let ready = {
            let mut jobs = self.jobs();
            let entry = jobs
                .get_mut(&job_id)
                .ok_or(ScribeError::JobNotFound(job_id))?;
            let current = entry.status.state();
            if !current.can_start() {
                return Err(ScribeError::InvalidTransition {
                    from: current,
                    to: JobState::Running,
                });
            }

            // claim the transition and install the handle under one lock so
            // a concurrent start is rejected and pause/stop always find it
            entry.status.update(|s| s.state = JobState::Running);

            let (control_tx, control_rx) = watch::channel(Control::Run);
            let (done_tx, done_rx) = watch::channel(false);
            let (ready_tx, ready_rx) = oneshot::channel();
            let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);

            let context = RunContext {
                job_id,
                run_id,
                config: entry.config.clone(),
                created_at: entry.created_at,
                previous: current,
                status: entry.status.clone(),
                store: Arc::clone(&self.store),
                extractor: Arc::clone(&self.extractor),
                writer: Arc::clone(&self.writer),
                jobs: Arc::clone(&self.jobs),
            };
            let task = tokio::spawn(context.run(control_rx, done_tx, ready_tx));

            entry.run = Some(RunHandle {
                run_id,
                control: control_tx,
                done: done_rx,
                task,
            });
            ready_rx
        };

        // the task only drops `ready` unsent if it was torn down
        ready.await.unwrap_or(Err(ScribeError::RunAborted(job_id)))
    }

    /// Asks a Running job to pause and waits until it has checkpointed
    ///
    /// Returns the resulting status; a job that finished on its own in the
    /// meantime reports that terminal state instead. Pausing a Paused job
    /// is a no-op.
    pub async fn pause(&self, job_id: JobId) -> Result<JobStatus> {
        self.signal(job_id, Control::Pause).await
    }

    /// Stops a job for good
    ///
    /// A Running job is signalled and awaited like `pause`; a Paused job is
    /// marked Stopped in the store directly. Stopping a Stopped job is a
    /// no-op.
    pub async fn stop(&self, job_id: JobId) -> Result<JobStatus> {
        let status = self.status_cell(job_id)?;
        if status.state() != JobState::Paused {
            return self.signal(job_id, Control::Stop).await;
        }

        match self.store.load(job_id) {
            Ok(mut record) => {
                record.status = JobState::Stopped;
                let policy = &record.config.policy;
                save_with_retry(
                    &self.store,
                    &record,
                    policy.store_retries,
                    policy.store_retry_backoff(),
                )
                .await?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        status.update(|s| s.state = JobState::Stopped);
        info!("Job {} stopped while paused", job_id);
        Ok(status.snapshot())
    }

    async fn signal(&self, job_id: JobId, signal: Control) -> Result<JobStatus> {
        let target = match signal {
            Control::Stop => JobState::Stopped,
            _ => JobState::Paused,
        };

        let (mut done, status) = {
            let jobs = self.jobs();
            let entry = jobs.get(&job_id).ok_or(ScribeError::JobNotFound(job_id))?;
            let current = entry.status.state();
            if current == target {
                return Ok(entry.status.snapshot());
            }
            let run = match (&entry.run, current) {
                (Some(run), JobState::Running) => run,
                _ => {
                    return Err(ScribeError::InvalidTransition {
                        from: current,
                        to: target,
                    })
                }
            };

            // a pending Stop is never downgraded to Pause
            run.control.send_if_modified(|c| {
                let upgrade = *c == Control::Run || signal == Control::Stop;
                if upgrade {
                    *c = signal;
                }
                upgrade
            });
            (run.done.clone(), entry.status.clone())
        };

        info!("Requested {} of job {}", target, job_id);
        let _ = done.wait_for(|finished| *finished).await;
        Ok(status.snapshot())
    }

    /// Pauses every running job and waits for all of them
    pub async fn pause_all(&self) -> Vec<JobStatus> {
        let waits: Vec<_> = {
            let jobs = self.jobs();
            jobs.values()
                .filter(|entry| entry.status.state() == JobState::Running)
                .filter_map(|entry| {
                    let run = entry.run.as_ref()?;
                    run.control.send_if_modified(|c| {
                        let upgrade = *c == Control::Run;
                        if upgrade {
                            *c = Control::Pause;
                        }
                        upgrade
                    });
                    Some((run.done.clone(), entry.status.clone()))
                })
                .collect()
        };

        let mut statuses = Vec::with_capacity(waits.len());
        for (mut done, status) in waits {
            let _ = done.wait_for(|finished| *finished).await;
            statuses.push(status.snapshot());
        }
        statuses
    }

    fn status_cell(&self, job_id: JobId) -> Result<SharedStatus> {
        self.jobs()
            .get(&job_id)
            .map(|entry| entry.status.clone())
            .ok_or(ScribeError::JobNotFound(job_id))
    }

    /// Returns a consistent snapshot of a job's status
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        Ok(self.status_cell(job_id)?.snapshot())
    }

    /// Snapshots of every registered job, oldest first
    pub fn list(&self) -> Vec<JobStatus> {
        let mut statuses: Vec<JobStatus> = self
            .jobs()
            .values()
            .map(|entry| entry.status.snapshot())
            .collect();
        statuses.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        statuses
    }

    /// Waits for a job's crawl loop to end and returns its final status
    ///
    /// Returns immediately for a job that is not running.
    pub async fn wait(&self, job_id: JobId) -> Result<JobStatus> {
        let (done, status) = {
            let jobs = self.jobs();
            let entry = jobs.get(&job_id).ok_or(ScribeError::JobNotFound(job_id))?;
            (
                entry.run.as_ref().map(|run| run.done.clone()),
                entry.status.clone(),
            )
        };

        if let Some(mut done) = done {
            let _ = done.wait_for(|finished| *finished).await;
        }
        Ok(status.snapshot())
    }

    /// Stops (if needed), forgets and deletes a job
    pub async fn remove(&self, job_id: JobId) -> Result<()> {
        let registered = self.jobs().contains_key(&job_id);
        if !registered && !self.store.exists(job_id)? {
            return Err(ScribeError::JobNotFound(job_id));
        }

        if registered && self.status(job_id)?.state == JobState::Running {
            self.stop(job_id).await?;
        }

        if let Some(entry) = self.jobs().remove(&job_id) {
            if let Some(run) = entry.run {
                run.task.abort();
            }
        }
        self.store.delete(job_id)?;
        info!("Removed job {}", job_id);
        Ok(())
    }

    /// Registers every persisted job not yet known to this manager
    ///
    /// Jobs persisted as Running were interrupted by a crash or kill; they
    /// are registered (and re-persisted) as Paused so `start` resumes them.
    pub fn recover(&self) -> Result<Vec<JobId>> {
        let mut recovered = Vec::new();
        for mut record in self.store.list()? {
            if self.jobs().contains_key(&record.job_id) {
                continue;
            }

            if record.status == JobState::Running {
                warn!(
                    "Job {} was interrupted while running; recovering it as Paused",
                    record.job_id
                );
                record.status = JobState::Paused;
                self.store.save(&record)?;
            }

            debug!("Recovered job {} ({})", record.job_id, record.status);
            self.register(record.job_id, record.config.clone(), JobStatus::from_record(&record));
            recovered.push(record.job_id);
        }

        if !recovered.is_empty() {
            info!("Recovered {} persisted jobs", recovered.len());
        }
        Ok(recovered)
    }

    /// Creates a new Queued job seeded with a finished job's persisted state
    ///
    /// The new job keeps the source's visited set and frontier, so starting
    /// it never re-processes the source's pages. Only Stopped, Completed or
    /// Failed jobs can be used as a seed.
    pub async fn seed_from(&self, source: JobId) -> Result<JobId> {
        let record = match self.store.load(source) {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Err(ScribeError::JobNotFound(source)),
            Err(e) => return Err(e.into()),
        };

        let current = self
            .status_cell(source)
            .map(|status| status.state())
            .unwrap_or(record.status);
        if !current.is_terminal() {
            return Err(ScribeError::InvalidTransition {
                from: current,
                to: JobState::Queued,
            });
        }

        let job_id = JobId::new();
        let seeded = JobRecord {
            job_id,
            status: JobState::Queued,
            error: None,
            created_at: Utc::now(),
            config: record.config,
            state: record.state,
        };
        let policy = &seeded.config.policy;
        save_with_retry(
            &self.store,
            &seeded,
            policy.store_retries,
            policy.store_retry_backoff(),
        )
        .await?;

        info!("Seeded job {} from job {}", job_id, source);
        self.register(job_id, seeded.config.clone(), JobStatus::from_record(&seeded));
        Ok(job_id)
    }
}
