use super::*;
use crate::cloud::RemoteTaskStatus;
use crate::config::FeedConfig;
use crate::error::RemoteError;
use crate::test_helpers::{ScriptedRemote, create_test_db, links_of, seed_link, seed_subscription};
use crate::types::DownloadState;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, magnet)| {
            format!(
                r#"<item><title>{}</title><enclosure url="{}" length="1024" type="application/x-bittorrent"/></item>"#,
                title,
                magnet.replace('&', "&amp;")
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title><link>https://example.com</link><description>d</description>{}</channel></rss>"#,
        items
    )
}

async fn serve_feed(server: &MockServer, feed_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn test_config() -> ReconcileConfig {
    ReconcileConfig {
        submit_batch_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn reconciler(db: &Arc<Database>, remote: &Arc<ScriptedRemote>, config: ReconcileConfig) -> Reconciler {
    let tracker = DownloadTracker::new(db.clone(), remote.clone(), config.claim_timeout);
    Reconciler::new(
        db.clone(),
        FeedParser::new(&FeedConfig::default()).unwrap(),
        tracker,
        config,
    )
}

#[tokio::test]
async fn new_feed_entry_becomes_pending_link() {
    let server = MockServer::start().await;
    serve_feed(&server, "/feed", rss(&[("Ep01", "magnet:?xt=urn:btih:AAA")])).await;

    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, &format!("{}/feed", server.uri())).await;

    let summary = reconciler(&db, &remote, test_config())
        .refresh_all(false)
        .await
        .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.total_new_items, 1);

    let links = links_of(&db, sub.id).await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].title, "Ep01");
    assert_eq!(links[0].magnet_uri, "magnet:?xt=urn:btih:AAA");
    assert_eq!(links[0].state, DownloadState::Pending);

    let refreshed = db.get_subscription(sub.id).await.unwrap().unwrap();
    assert!(refreshed.last_refresh.is_some());
}

#[tokio::test]
async fn unchanged_feed_yields_nothing_new_on_second_refresh() {
    let server = MockServer::start().await;
    serve_feed(
        &server,
        "/feed",
        rss(&[
            ("Ep01", "magnet:?xt=urn:btih:AAA"),
            ("Ep02", "magnet:?xt=urn:btih:BBB"),
        ]),
    )
    .await;

    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, &format!("{}/feed", server.uri())).await;
    let reconciler = reconciler(&db, &remote, test_config());

    let first = reconciler.refresh_subscription(&sub, true).await;
    assert_eq!(first.new_items, 2);

    let second = reconciler.refresh_subscription(&sub, true).await;
    assert!(second.success);
    assert!(!second.skipped);
    assert_eq!(second.new_items, 0);
    assert_eq!(links_of(&db, sub.id).await.len(), 2);
}

#[tokio::test]
async fn one_failing_feed_does_not_abort_the_others() {
    let server = MockServer::start().await;
    serve_feed(&server, "/good", rss(&[("Ep01", "magnet:?xt=urn:btih:AAA")])).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let good = seed_subscription(&db, 1, &format!("{}/good", server.uri())).await;
    let broken = seed_subscription(&db, 2, &format!("{}/broken", server.uri())).await;
    let recent = seed_subscription(&db, 3, &format!("{}/good", server.uri())).await;
    db.touch_last_refresh(recent.id, Utc::now()).await.unwrap();

    let summary = reconciler(&db, &remote, test_config())
        .refresh_all(false)
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total_new_items, 1);

    let by_id = |id| summary.results.iter().find(|r| r.subscription_id == id).unwrap();
    assert!(by_id(good.id).success);
    assert!(!by_id(broken.id).success);
    assert!(by_id(broken.id).error.as_deref().unwrap().contains("500"));
    assert!(by_id(recent.id).skipped);

    // A failed fetch never moves last_refresh
    let broken = db.get_subscription(broken.id).await.unwrap().unwrap();
    assert!(broken.last_refresh.is_none());
}

#[tokio::test]
async fn inactive_subscriptions_are_not_swept() {
    let server = MockServer::start().await;
    serve_feed(&server, "/feed", rss(&[("Ep01", "magnet:?xt=urn:btih:AAA")])).await;

    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, &format!("{}/feed", server.uri())).await;
    db.toggle_subscription(sub.owner_id, sub.id).await.unwrap();

    let summary = reconciler(&db, &remote, test_config())
        .refresh_all(true)
        .await
        .unwrap();

    assert_eq!(summary.total, 0);
    assert!(links_of(&db, sub.id).await.is_empty());
}

#[tokio::test]
async fn submission_failure_during_sweep_marks_link_failed() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    remote.fail_submit(
        "magnet:?xt=urn:btih:DEAD",
        RemoteError::Resolution("magnet is dead".to_string()),
    );
    let sub = seed_subscription(&db, 1, "http://127.0.0.1:9/feed").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:DEAD").await;

    let report = reconciler(&db, &remote, test_config())
        .process_downloads()
        .await
        .unwrap();

    assert_eq!(report.submit_failed, 1);
    assert_eq!(report.submitted, 0);

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    match stored.state {
        DownloadState::Failed {
            task_id, reason, ..
        } => {
            assert_eq!(task_id, None);
            assert!(reason.contains("resolution failed"));
        }
        other => panic!("expected failed, got {:?}", other),
    }
}

#[tokio::test]
async fn pending_batch_is_bounded_and_then_polled() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "http://127.0.0.1:9/feed").await;
    for i in 0..5 {
        seed_link(&db, sub.id, &format!("Ep0{}", i), &format!("magnet:?xt=urn:btih:{}", i)).await;
    }
    remote.set_status(1000, Ok(RemoteTaskStatus::Succeeded { file_id: 42 }));

    let config = ReconcileConfig {
        pending_batch_limit: 3,
        submit_concurrency: 2,
        ..test_config()
    };
    let report = reconciler(&db, &remote, config)
        .process_downloads()
        .await
        .unwrap();

    assert_eq!(report.submitted, 3);
    assert_eq!(report.polled, 3);
    assert_eq!(report.completed, 1);
    assert_eq!(report.in_progress, 2);

    let statuses: Vec<DownloadStatus> = links_of(&db, sub.id)
        .await
        .iter()
        .map(|l| l.state.status())
        .collect();
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == DownloadStatus::Pending)
            .count(),
        2
    );
}

#[tokio::test]
async fn poll_errors_are_counted_not_fatal() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "http://127.0.0.1:9/feed").await;
    seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;
    seed_link(&db, sub.id, "Ep02", "magnet:?xt=urn:btih:BBB").await;
    remote.set_status(
        1000,
        Err(RemoteError::Transport {
            endpoint: "status",
            reason: "timed out".to_string(),
        }),
    );
    remote.set_status(
        1001,
        Ok(RemoteTaskStatus::Failed {
            reason: Some("no seeders".into()),
        }),
    );

    // One submission at a time so task ids follow link order
    let config = ReconcileConfig {
        submit_concurrency: 1,
        ..test_config()
    };
    let report = reconciler(&db, &remote, config)
        .process_downloads()
        .await
        .unwrap();

    assert_eq!(report.submitted, 2);
    assert_eq!(report.poll_errors, 1);
    assert_eq!(report.failed, 1);

    let links = links_of(&db, sub.id).await;
    assert_eq!(links[0].state.status(), DownloadStatus::Downloading);
    assert_eq!(links[1].state.fail_reason(), Some("no seeders"));
}

#[tokio::test]
async fn overlapping_sweep_is_rejected() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "http://127.0.0.1:9/feed").await;
    seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;
    let reconciler = reconciler(&db, &remote, test_config());

    let permit = reconciler.guard.try_acquire().unwrap();
    assert!(reconciler.is_sweeping());

    let err = reconciler.sweep().await.unwrap_err();
    assert!(matches!(err, Error::SweepInProgress));
    assert!(remote.submitted().is_empty());

    drop(permit);
    assert!(!reconciler.is_sweeping());
}

#[tokio::test]
async fn sweep_refreshes_then_submits_new_links() {
    let server = MockServer::start().await;
    serve_feed(&server, "/feed", rss(&[("Ep01", "magnet:?xt=urn:btih:AAA")])).await;

    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, &format!("{}/feed", server.uri())).await;

    let reconciler = reconciler(&db, &remote, test_config());
    let report = reconciler.sweep().await.unwrap();

    assert_eq!(report.refresh.total_new_items, 1);
    assert_eq!(report.downloads.submitted, 1);
    assert_eq!(report.downloads.polled, 1);
    assert_eq!(report.downloads.in_progress, 1);
    assert_eq!(
        remote.submitted(),
        vec![(
            "magnet:?xt=urn:btih:AAA".to_string(),
            sub.cloud_folder_id.unwrap()
        )]
    );
    assert!(!reconciler.is_sweeping());

    // Second sweep: not due, nothing pending, one poll
    let report = reconciler.sweep().await.unwrap();
    assert_eq!(report.refresh.skipped, 1);
    assert_eq!(report.downloads.submitted, 0);
    assert_eq!(report.downloads.polled, 1);
}

#[tokio::test]
async fn submissions_never_exceed_submit_concurrency() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    remote.set_latency(Duration::from_millis(100));
    let sub = seed_subscription(&db, 1, "http://127.0.0.1:9/feed").await;
    for i in 0..5 {
        seed_link(&db, sub.id, &format!("Ep0{}", i), &format!("magnet:?xt=urn:btih:{}", i)).await;
    }

    let config = ReconcileConfig {
        pending_batch_limit: 5,
        submit_concurrency: 2,
        poll_concurrency: 2,
        ..test_config()
    };
    let report = reconciler(&db, &remote, config)
        .process_downloads()
        .await
        .unwrap();

    assert_eq!(report.submitted, 5);
    assert_eq!(report.polled, 5);

    let load = remote.load();
    assert_eq!(load.peak, 2);
    // Each chunk settles before the next one starts
    assert!(load.busiest_period <= 2, "{:?}", load);
}

#[tokio::test]
async fn polls_never_exceed_poll_concurrency() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "http://127.0.0.1:9/feed").await;
    for i in 0..7 {
        seed_link(&db, sub.id, &format!("Ep0{}", i), &format!("magnet:?xt=urn:btih:{}", i)).await;
    }

    let config = ReconcileConfig {
        pending_batch_limit: 7,
        poll_concurrency: 3,
        ..test_config()
    };
    let reconciler = reconciler(&db, &remote, config);
    assert_eq!(reconciler.process_downloads().await.unwrap().submitted, 7);

    remote.reset_load();
    remote.set_latency(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let report = reconciler.poll_links(&links_of(&db, sub.id).await).await;
    assert_eq!(report.polled, 7);
    assert_eq!(report.in_progress, 7);

    let load = remote.load();
    assert_eq!(load.peak, 3);
    assert!(load.busiest_period <= 3, "{:?}", load);
    // Three chunks: 3 + 3 + 1
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn refreshes_run_in_chunks_of_refresh_concurrency() {
    let server = MockServer::start().await;
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();

    for i in 0..6 {
        let feed_path = format!("/feed{}", i);
        let magnet = format!("magnet:?xt=urn:btih:{}", i);
        Mock::given(method("GET"))
            .and(path(feed_path.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss(&[("Ep01", magnet.as_str())]))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        seed_subscription(&db, 1, &format!("{}{}", server.uri(), feed_path)).await;
    }

    let config = ReconcileConfig {
        refresh_concurrency: 3,
        ..test_config()
    };
    let started = std::time::Instant::now();
    let summary = reconciler(&db, &remote, config)
        .refresh_all(false)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.success, 6);
    assert_eq!(summary.total_new_items, 6);
    // Two chunks of three: slower than all six at once, faster than one by one
    assert!(elapsed >= Duration::from_millis(600), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
}
