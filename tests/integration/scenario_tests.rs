//! End-to-end crawl scenarios

use crate::common::{job, Setup, SiteMap};
use site_scribe::jobs::JobState;
use site_scribe::storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[tokio::test]
async fn test_first_iteration_keeps_only_in_scope_links() {
    let gate = Arc::new(Semaphore::new(0));
    let site = SiteMap::new()
        .page(
            "https://example.com/",
            &[
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c",
                "https://elsewhere.net/d",
            ],
        )
        .gated(gate.clone());
    let setup = Setup::new(site);

    let job_id = setup
        .manager
        .launch(job("https://example.com", 1, 10))
        .await
        .unwrap();
    while setup.site.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    let (paused, _) = tokio::join!(setup.manager.pause(job_id), async { gate.add_permits(1) });
    assert_eq!(paused.unwrap().state, JobState::Paused);

    let state = setup.store.load(job_id).unwrap().state;
    let frontier: Vec<(&str, u32)> = state.frontier.iter().map(|t| (t.key(), t.depth)).collect();
    assert_eq!(
        frontier,
        vec![
            ("https://example.com/a", 1),
            ("https://example.com/b", 1),
            ("https://example.com/c", 1),
        ]
    );
    assert_eq!(state.dropped.out_of_scope, 1);
}

#[tokio::test]
async fn test_every_extraction_failing_fails_the_job() {
    let setup = Setup::new(SiteMap::new());

    let job_id = setup
        .manager
        .launch(job("https://example.com/", 2, 10))
        .await
        .unwrap();
    let status = setup.manager.wait(job_id).await.unwrap();

    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.pages_processed, 1);
    assert_eq!(status.pages_failed, 1);
    assert!(!status.error.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_failure_ceiling_counts_attempts() {
    // the root links to 20 pages that all 404
    let links: Vec<String> = (0..20).map(|i| format!("https://example.com/gone{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let setup = Setup::new(SiteMap::new().page("https://example.com/", &link_refs));

    let mut config = job("https://example.com/", 1, 50);
    config.policy.min_attempts_before_failure = 10;
    config.policy.max_failure_ratio = 0.5;
    let job_id = setup.manager.launch(config).await.unwrap();
    let status = setup.manager.wait(job_id).await.unwrap();

    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.pages_processed, 10);
    assert_eq!(status.pages_failed, 9);
    assert!(status.error.unwrap().contains("9 of 10"));
}

#[tokio::test]
async fn test_page_budget_is_respected() {
    let setup = Setup::new(SiteMap::fan_out("https://example.com/", 20));

    let job_id = setup
        .manager
        .launch(job("https://example.com/", 1, 5))
        .await
        .unwrap();
    let status = setup.manager.wait(job_id).await.unwrap();

    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.pages_processed, 5);
    assert_eq!(setup.site.calls().len(), 5);
    let state = setup.store.load(job_id).unwrap().state;
    assert_eq!(state.dropped.budget_exhausted, 16);
}

#[tokio::test]
async fn test_depth_limit_and_revisits() {
    let site = SiteMap::new()
        .page("https://example.com/", &["https://example.com/a", "https://example.com/a#top"])
        .page("https://example.com/a", &["https://example.com/", "https://example.com/a/deep"])
        .page("https://example.com/a/deep", &[]);
    let setup = Setup::new(site);

    let job_id = setup
        .manager
        .launch(job("https://example.com/", 1, 10))
        .await
        .unwrap();
    let status = setup.manager.wait(job_id).await.unwrap();

    assert_eq!(status.state, JobState::Completed);
    assert_eq!(
        setup.site.calls(),
        vec!["https://example.com/", "https://example.com/a"]
    );
    let dropped = setup.store.load(job_id).unwrap().state.dropped;
    assert_eq!(dropped.already_pending, 1);
    assert_eq!(dropped.already_visited, 1);
    assert_eq!(dropped.depth_exceeded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetches_are_spaced_by_delay() {
    let setup = Setup::new(SiteMap::fan_out("https://example.com/", 4));
    let config = site_scribe::JobConfig::new("https://example.com/", 1, 10, 2.5);

    let job_id = setup.manager.launch(config).await.unwrap();
    let status = setup.manager.wait(job_id).await.unwrap();
    assert_eq!(status.state, JobState::Completed);

    let times = setup.site.call_times();
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(2500));
    }
}
