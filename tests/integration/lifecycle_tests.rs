//! Job state machine tests through the public manager API

use crate::common::{job, FlakyStore, MemoryWriter, PanickingExtractor, Setup, SiteMap};
use chrono::Utc;
use site_scribe::jobs::{JobId, JobManager, JobState};
use site_scribe::state::CrawlState;
use site_scribe::storage::{JobRecord, StateStore};
use site_scribe::url::normalize_url;
use site_scribe::ScribeError;
use std::sync::Arc;
use tokio::sync::Semaphore;

const ROOT: &str = "https://example.com/";

/// Yields until the extractor has been called `n` times
async fn until_calls(setup: &Setup, n: usize) {
    while setup.site.calls().len() < n {
        tokio::task::yield_now().await;
    }
}

/// Starts a gated job and pauses it right after its root page
async fn paused_after_root(setup: &Setup, gate: &Semaphore) -> JobId {
    let job_id = setup.manager.launch(job(ROOT, 1, 10)).await.unwrap();
    until_calls(setup, 1).await;

    let (paused, _) = tokio::join!(setup.manager.pause(job_id), async { gate.add_permits(1) });
    let status = paused.unwrap();
    assert_eq!(status.state, JobState::Paused);
    assert_eq!(status.pages_processed, 1);
    job_id
}

#[tokio::test]
async fn test_submit_rejects_invalid_config() {
    let setup = Setup::new(SiteMap::new());

    for config in [
        job("ftp://example.com/", 1, 10),
        job("not a url", 1, 10),
        job(ROOT, 1, 0),
        site_scribe::JobConfig::new(ROOT, 1, 10, -1.0),
    ] {
        let err = setup.manager.submit(config).unwrap_err();
        assert!(matches!(err, ScribeError::Config(_)), "unexpected error: {}", err);
    }

    assert!(setup.manager.list().is_empty());
}

#[tokio::test]
async fn test_submit_start_complete() {
    let setup = Setup::new(SiteMap::fan_out(ROOT, 2));

    let job_id = setup.manager.submit(job(ROOT, 1, 10)).unwrap();
    let queued = setup.manager.status(job_id).unwrap();
    assert_eq!(queued.state, JobState::Queued);
    assert_eq!(queued.pages_processed, 0);
    assert!(!setup.store.exists(job_id).unwrap());

    setup.manager.start(job_id).await.unwrap();
    let done = setup.manager.wait(job_id).await.unwrap();

    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.pages_processed, 3);
    assert_eq!(done.pages_failed, 0);
    assert_eq!(done.pending, 0);
    assert!(done.error.is_none());
    assert_eq!(setup.store.load(job_id).unwrap().status, JobState::Completed);
    assert!(setup
        .writer
        .content("example.com/index.md")
        .unwrap()
        .contains("Title of /p1"));
}

#[tokio::test]
async fn test_status_while_extraction_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 1).gated(gate.clone()));

    let job_id = setup.manager.launch(job(ROOT, 1, 10)).await.unwrap();
    until_calls(&setup, 1).await;

    let status = setup.manager.status(job_id).unwrap();
    assert_eq!(status.state, JobState::Running);
    assert_eq!(status.current_url.as_deref(), Some(ROOT));
    assert_eq!(status.pages_processed, 0);

    gate.add_permits(10);
    let done = setup.manager.wait(job_id).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert!(done.current_url.is_none());
}

#[tokio::test]
async fn test_invalid_transitions_rejected() {
    let gate = Arc::new(Semaphore::new(0));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 1).gated(gate.clone()));

    let job_id = setup.manager.submit(job(ROOT, 1, 10)).unwrap();
    let err = setup.manager.pause(job_id).await.unwrap_err();
    assert!(matches!(
        err,
        ScribeError::InvalidTransition {
            from: JobState::Queued,
            to: JobState::Paused
        }
    ));
    let err = setup.manager.stop(job_id).await.unwrap_err();
    assert!(matches!(err, ScribeError::InvalidTransition { .. }));

    setup.manager.start(job_id).await.unwrap();
    let err = setup.manager.start(job_id).await.unwrap_err();
    assert!(matches!(
        err,
        ScribeError::InvalidTransition {
            from: JobState::Running,
            to: JobState::Running
        }
    ));

    gate.add_permits(10);
    setup.manager.wait(job_id).await.unwrap();
    let err = setup.manager.start(job_id).await.unwrap_err();
    assert!(matches!(
        err,
        ScribeError::InvalidTransition {
            from: JobState::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_job() {
    let setup = Setup::new(SiteMap::new());
    let job_id = JobId::new();

    assert!(matches!(
        setup.manager.status(job_id),
        Err(ScribeError::JobNotFound(id)) if id == job_id
    ));
    assert!(matches!(
        setup.manager.start(job_id).await,
        Err(ScribeError::JobNotFound(_))
    ));
    assert!(matches!(
        setup.manager.remove(job_id).await,
        Err(ScribeError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_stop_running_job() {
    let gate = Arc::new(Semaphore::new(0));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 5).gated(gate.clone()));

    let job_id = setup.manager.launch(job(ROOT, 1, 10)).await.unwrap();
    until_calls(&setup, 1).await;

    let (stopped, _) = tokio::join!(setup.manager.stop(job_id), async { gate.add_permits(10) });
    let status = stopped.unwrap();

    assert_eq!(status.state, JobState::Stopped);
    assert_eq!(status.pages_processed, 1);
    assert_eq!(status.pending, 5);
    assert_eq!(setup.store.load(job_id).unwrap().status, JobState::Stopped);

    // stopping again is a no-op
    assert_eq!(setup.manager.stop(job_id).await.unwrap().state, JobState::Stopped);
}

#[tokio::test]
async fn test_pause_resume_and_stop_paused() {
    let gate = Arc::new(Semaphore::new(0));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 3).gated(gate.clone()));

    let job_id = paused_after_root(&setup, &gate).await;
    assert_eq!(setup.store.load(job_id).unwrap().status, JobState::Paused);

    // pausing a paused job is a no-op
    assert_eq!(setup.manager.pause(job_id).await.unwrap().state, JobState::Paused);

    let stopped = setup.manager.stop(job_id).await.unwrap();
    assert_eq!(stopped.state, JobState::Stopped);
    assert_eq!(setup.store.load(job_id).unwrap().status, JobState::Stopped);

    let err = setup.manager.start(job_id).await.unwrap_err();
    assert!(matches!(
        err,
        ScribeError::InvalidTransition {
            from: JobState::Stopped,
            to: JobState::Running
        }
    ));
}

#[tokio::test]
async fn test_resume_paused_job_in_same_process() {
    let gate = Arc::new(Semaphore::new(0));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 3).gated(gate.clone()));

    let job_id = paused_after_root(&setup, &gate).await;
    gate.add_permits(10);
    setup.manager.start(job_id).await.unwrap();
    let done = setup.manager.wait(job_id).await.unwrap();

    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.pages_processed, 4);
    let calls = setup.site.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls.iter().filter(|url| url.as_str() == ROOT).count(), 1);
}

#[tokio::test]
async fn test_seed_from_stopped_job() {
    let gate = Arc::new(Semaphore::new(0));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 3).gated(gate.clone()));

    let source = paused_after_root(&setup, &gate).await;
    let err = setup.manager.seed_from(source).await.unwrap_err();
    assert!(matches!(err, ScribeError::InvalidTransition { from: JobState::Paused, .. }));

    setup.manager.stop(source).await.unwrap();
    let seeded = setup.manager.seed_from(source).await.unwrap();
    assert_ne!(seeded, source);

    let status = setup.manager.status(seeded).unwrap();
    assert_eq!(status.state, JobState::Queued);
    assert_eq!(status.pages_processed, 1);
    assert_eq!(status.pending, 3);

    gate.add_permits(10);
    setup.manager.start(seeded).await.unwrap();
    let done = setup.manager.wait(seeded).await.unwrap();

    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.pages_processed, 4);
    assert_eq!(setup.site.calls().len(), 4);
    assert_eq!(setup.manager.status(source).unwrap().state, JobState::Stopped);
}

#[tokio::test]
async fn test_remove_deletes_persisted_job() {
    let setup = Setup::new(SiteMap::fan_out(ROOT, 1));

    let job_id = setup.manager.launch(job(ROOT, 1, 10)).await.unwrap();
    setup.manager.wait(job_id).await.unwrap();
    assert!(setup.store.exists(job_id).unwrap());

    setup.manager.remove(job_id).await.unwrap();

    assert!(!setup.store.exists(job_id).unwrap());
    assert!(matches!(
        setup.manager.status(job_id),
        Err(ScribeError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_recover_interrupted_job_as_paused() {
    let setup = Setup::new(SiteMap::fan_out(ROOT, 2));

    let config = job(ROOT, 1, 10);
    let root = normalize_url(ROOT).unwrap();
    let record = JobRecord {
        job_id: JobId::new(),
        status: JobState::Running,
        error: None,
        created_at: Utc::now(),
        state: CrawlState::new(root, config.max_depth, config.max_pages, config.delay_seconds),
        config,
    };
    setup.store.save(&record).unwrap();

    let recovered = setup.manager.recover().unwrap();
    assert_eq!(recovered, vec![record.job_id]);
    assert_eq!(setup.manager.status(record.job_id).unwrap().state, JobState::Paused);
    assert_eq!(setup.store.load(record.job_id).unwrap().status, JobState::Paused);

    // already registered jobs are not recovered twice
    assert!(setup.manager.recover().unwrap().is_empty());

    setup.manager.start(record.job_id).await.unwrap();
    let done = setup.manager.wait(record.job_id).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.pages_processed, 3);
}

#[tokio::test]
async fn test_concurrent_jobs_are_independent() {
    let site = SiteMap::fan_out("https://example.com/", 3)
        .page("https://docs.example.org/", &["https://docs.example.org/a", "https://example.com/p0"])
        .page("https://docs.example.org/a", &[]);
    let setup = Setup::new(site);

    let first = setup.manager.launch(job("https://example.com/", 1, 10)).await.unwrap();
    let second = setup
        .manager
        .launch(job("https://docs.example.org/", 1, 10))
        .await
        .unwrap();

    let first = setup.manager.wait(first).await.unwrap();
    let second = setup.manager.wait(second).await.unwrap();

    assert_eq!(first.state, JobState::Completed);
    assert_eq!(first.pages_processed, 4);
    assert_eq!(second.state, JobState::Completed);
    assert_eq!(second.pages_processed, 2);

    let ids = setup.writer.ids();
    assert!(ids.contains(&"example.com/index.md".to_string()));
    assert!(ids.contains(&"docs.example.org/index.md".to_string()));

    let listed: Vec<JobId> = setup.manager.list().iter().map(|s| s.job_id).collect();
    assert_eq!(listed, vec![first.job_id, second.job_id]);
}

#[tokio::test]
async fn test_pause_all() {
    let gate = Arc::new(Semaphore::new(0));
    let site = SiteMap::fan_out("https://example.com/", 2)
        .page("https://example.org/", &[])
        .gated(gate.clone());
    let setup = Setup::new(site);

    let first = setup.manager.launch(job("https://example.com/", 1, 10)).await.unwrap();
    let second = setup.manager.launch(job("https://example.org/", 1, 10)).await.unwrap();
    until_calls(&setup, 2).await;

    let (paused, _) = tokio::join!(setup.manager.pause_all(), async { gate.add_permits(10) });

    assert_eq!(paused.len(), 2);
    assert!(paused.iter().all(|s| s.state == JobState::Paused));
    assert_eq!(setup.manager.status(first).unwrap().pending, 2);
    assert_eq!(setup.manager.status(second).unwrap().pages_processed, 1);
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_manager_is_shareable() {
    assert_send_sync::<JobManager>();
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_start_checkpoint_retries() {
    let store = Arc::new(FlakyStore::in_memory());
    let setup = Setup::with_store(SiteMap::fan_out(ROOT, 2), store.clone());
    let job_id = setup.manager.submit(job(ROOT, 1, 10)).unwrap();
    store.fail_next(1);

    let (started, paused) = tokio::join!(setup.manager.start(job_id), async {
        tokio::task::yield_now().await;
        setup.manager.pause(job_id).await
    });

    started.unwrap();
    let paused = paused.unwrap();
    assert_eq!(store.failures_left(), 0);
    assert_eq!(paused.state, JobState::Paused);
    assert_eq!(paused.pages_processed, 0);
    assert!(setup.site.calls().is_empty());
    assert_eq!(setup.store.load(job_id).unwrap().status, JobState::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_resume_checkpoint_retries() {
    let gate = Arc::new(Semaphore::new(0));
    let store = Arc::new(FlakyStore::in_memory());
    let setup = Setup::with_store(SiteMap::fan_out(ROOT, 2).gated(gate.clone()), store.clone());
    let job_id = paused_after_root(&setup, &gate).await;
    store.fail_next(1);

    let (started, paused) = tokio::join!(setup.manager.start(job_id), async {
        tokio::task::yield_now().await;
        setup.manager.pause(job_id).await
    });

    started.unwrap();
    let paused = paused.unwrap();
    assert_eq!(store.failures_left(), 0);
    assert_eq!(paused.state, JobState::Paused);
    assert_eq!(paused.pages_processed, 1);
    assert_eq!(setup.site.calls().len(), 1);

    let stored = setup.store.load(job_id).unwrap();
    assert_eq!(stored.status, JobState::Paused);
    assert_eq!(stored.state.pending_count(), 2);

    // the job is still resumable afterwards
    gate.add_permits(2);
    setup.manager.start(job_id).await.unwrap();
    assert_eq!(setup.manager.wait(job_id).await.unwrap().state, JobState::Completed);
}

#[tokio::test]
async fn test_extractor_panic_fails_job() {
    let setup = Setup::new(SiteMap::new());
    let manager = JobManager::new(
        setup.store.clone(),
        Arc::new(PanickingExtractor),
        Arc::new(MemoryWriter::default()),
    );

    let job_id = manager.launch(job(ROOT, 1, 10)).await.unwrap();
    let status = manager.wait(job_id).await.unwrap();

    assert_eq!(status.state, JobState::Failed);
    assert!(status.error.as_deref().unwrap().contains("extractor exploded"));
    assert!(status.current_url.is_none());

    let stored = setup.store.load(job_id).unwrap();
    assert_eq!(stored.status, JobState::Failed);
    assert!(stored.error.is_some());

    let err = manager.start(job_id).await.unwrap_err();
    assert!(matches!(err, ScribeError::InvalidTransition { .. }));
}

