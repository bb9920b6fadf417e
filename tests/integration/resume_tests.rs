//! Checkpoint and resume across manager restarts

use crate::common::{job, Setup, SiteMap};
use site_scribe::jobs::JobState;
use site_scribe::storage::{JsonFileStore, SqliteStateStore, StateStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const ROOT: &str = "https://example.com/";

#[tokio::test(start_paused = true)]
async fn test_resume_after_restart_skips_processed_pages() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.db");

    // one page per second: the root and p0..p2 are done after 3.5s
    let config = site_scribe::JobConfig::new(ROOT, 1, 10, 1.0);
    let first = Setup::with_store(
        SiteMap::fan_out(ROOT, 9),
        Arc::new(SqliteStateStore::open(&db_path).unwrap()),
    );
    let job_id = first.manager.launch(config).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let paused = first.manager.pause(job_id).await.unwrap();
    assert_eq!(paused.state, JobState::Paused);
    assert_eq!(paused.pages_processed, 4);
    assert_eq!(paused.pending, 6);
    let first_calls = first.site.calls();
    drop(first);

    let second = Setup::with_store(
        SiteMap::fan_out(ROOT, 9),
        Arc::new(SqliteStateStore::open(&db_path).unwrap()),
    );
    assert_eq!(second.manager.recover().unwrap(), vec![job_id]);
    second.manager.start(job_id).await.unwrap();
    let done = second.manager.wait(job_id).await.unwrap();

    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.pages_processed, 10);
    assert_eq!(done.pages_failed, 0);

    let second_calls = second.site.calls();
    assert_eq!(second_calls.len(), 6);
    let before: HashSet<_> = first_calls.iter().collect();
    assert!(second_calls.iter().all(|url| !before.contains(url)));

    let record = second.store.load(job_id).unwrap();
    assert_eq!(record.state.visited.len(), 10);
    assert_eq!(record.state.documents.len(), 10);
}

#[tokio::test]
async fn test_checkpoint_reflects_progress_while_running() {
    let gate = Arc::new(tokio::sync::Semaphore::new(1));
    let setup = Setup::new(SiteMap::fan_out(ROOT, 3).gated(gate.clone()));

    let job_id = setup.manager.launch(job(ROOT, 1, 10)).await.unwrap();
    while setup.site.calls().len() < 2 {
        tokio::task::yield_now().await;
    }

    // the root is checkpointed before p0 is extracted
    let record = setup.store.load(job_id).unwrap();
    assert_eq!(record.status, JobState::Running);
    assert_eq!(record.state.pages_processed, 1);
    assert_eq!(record.state.pending_count(), 3);

    gate.add_permits(10);
    assert_eq!(setup.manager.wait(job_id).await.unwrap().state, JobState::Completed);
}

#[tokio::test]
async fn test_json_backend_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join("jobs");

    let first = Setup::with_store(
        SiteMap::fan_out(ROOT, 2),
        Arc::new(JsonFileStore::open(&state_dir).unwrap()),
    );
    let job_id = first.manager.launch(job(ROOT, 1, 10)).await.unwrap();
    let done = first.manager.wait(job_id).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert!(state_dir.join(format!("{}.json", job_id)).exists());

    let reopened = JsonFileStore::open(&state_dir).unwrap();
    let record = reopened.load(job_id).unwrap();
    assert_eq!(record.status, JobState::Completed);
    assert_eq!(record.state.pages_processed, 3);

    let second = Setup::with_store(SiteMap::new(), Arc::new(reopened));
    assert_eq!(second.manager.recover().unwrap(), vec![job_id]);
    assert_eq!(
        second.manager.status(job_id).unwrap().state,
        JobState::Completed
    );
}
