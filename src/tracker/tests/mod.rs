use super::*;
use crate::error::RemoteError;
use crate::test_helpers::{ScriptedRemote, create_test_db, seed_failed_link, seed_link, seed_subscription};

const CLAIM_TIMEOUT: Duration = Duration::from_secs(600);

fn tracker(db: &Arc<Database>, remote: &Arc<ScriptedRemote>) -> DownloadTracker {
    DownloadTracker::new(db.clone(), remote.clone(), CLAIM_TIMEOUT)
}

#[tokio::test]
async fn submit_moves_pending_to_downloading() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    let outcome = tracker(&db, &remote).submit(&link).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Submitted { task_id: 1000 });

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    match stored.state {
        DownloadState::Downloading {
            task_id,
            submitted_at,
        } => {
            assert_eq!(task_id, 1000);
            assert!(submitted_at.is_some());
        }
        other => panic!("expected downloading, got {:?}", other),
    }

    // Submitted into the subscription's folder
    assert_eq!(
        remote.submitted(),
        vec![("magnet:?xt=urn:btih:AAA".to_string(), 501)]
    );
}

#[tokio::test]
async fn submission_failure_marks_link_failed() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    remote.fail_submit(
        "magnet:?xt=urn:btih:DEAD",
        RemoteError::Resolution("dead magnet".to_string()),
    );
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:DEAD").await;

    let outcome = tracker(&db, &remote).submit(&link).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed { ref reason } if reason.contains("resolution failed")));

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    match stored.state {
        DownloadState::Failed {
            task_id,
            reason,
            completed_at: _,
            ..
        } => {
            assert_eq!(task_id, None);
            assert!(reason.contains("resolution failed"));
        }
        other => panic!("expected failed, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_task_id_is_a_terminal_failure() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    remote.fail_submit("magnet:?xt=urn:btih:AAA", RemoteError::MissingTaskId);
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    tracker(&db, &remote).submit(&link).await.unwrap();

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.state.status(), DownloadStatus::Failed);
    assert_eq!(stored.state.task_id(), None);
}

#[tokio::test]
async fn claimed_link_is_not_submitted_twice() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    assert!(db.claim_pending_link(link.id, CLAIM_TIMEOUT).await.unwrap());

    let outcome = tracker(&db, &remote).submit(&link).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::AlreadyClaimed);
    assert!(remote.submitted().is_empty());
}

#[tokio::test]
async fn poll_records_remote_verdicts() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let running = seed_link(&db, sub.id, "Running", "magnet:?xt=urn:btih:R").await;
    let done = seed_link(&db, sub.id, "Done", "magnet:?xt=urn:btih:D").await;
    let broken = seed_link(&db, sub.id, "Broken", "magnet:?xt=urn:btih:B").await;

    let tracker = tracker(&db, &remote);
    for link in [&running, &done, &broken] {
        tracker.submit(link).await.unwrap();
    }
    // Task ids are handed out in submission order
    remote.set_status(1001, Ok(RemoteTaskStatus::Succeeded { file_id: 77 }));
    remote.set_status(1002, Ok(RemoteTaskStatus::Failed { reason: None }));

    let reload = |id| {
        let db = db.clone();
        async move { db.get_link(id).await.unwrap().unwrap() }
    };

    assert_eq!(
        tracker.poll(&reload(running.id).await).await.unwrap(),
        PollOutcome::InProgress
    );
    assert_eq!(
        tracker.poll(&reload(done.id).await).await.unwrap(),
        PollOutcome::Completed { file_id: 77 }
    );
    assert_eq!(
        tracker.poll(&reload(broken.id).await).await.unwrap(),
        PollOutcome::Failed {
            reason: DEFAULT_FAIL_REASON.to_string()
        }
    );

    assert_eq!(reload(running.id).await.state.status(), DownloadStatus::Downloading);
    match reload(done.id).await.state {
        DownloadState::Completed {
            task_id, file_id, ..
        } => {
            assert_eq!(task_id, 1001);
            assert_eq!(file_id, 77);
        }
        other => panic!("expected completed, got {:?}", other),
    }
    match reload(broken.id).await.state {
        DownloadState::Failed { task_id, reason, .. } => {
            assert_eq!(task_id, Some(1002));
            assert_eq!(reason, DEFAULT_FAIL_REASON);
        }
        other => panic!("expected failed, got {:?}", other),
    }
}

#[tokio::test]
async fn poll_error_leaves_link_unchanged() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    let tracker = tracker(&db, &remote);
    tracker.submit(&link).await.unwrap();
    remote.set_status(
        1000,
        Err(RemoteError::HttpStatus {
            endpoint: "status",
            status: 502,
        }),
    );

    let downloading = db.get_link(link.id).await.unwrap().unwrap();
    let err = tracker.poll(&downloading).await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::HttpStatus { status: 502, .. })));

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.state, downloading.state);
}

#[tokio::test]
async fn poll_rejects_links_that_are_not_downloading() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    let err = tracker(&db, &remote).poll(&link).await.unwrap_err();
    assert!(matches!(err, Error::Link(LinkError::InvalidState { .. })));
    assert!(remote.polled().is_empty());
}

#[tokio::test]
async fn retry_resubmits_failed_link() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_failed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    let outcome = tracker(&db, &remote).retry(&link).await.unwrap();
    assert_eq!(outcome, RetryOutcome::Submitted { task_id: 1000 });

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.state.status(), DownloadStatus::Downloading);
    assert_eq!(stored.state.fail_reason(), None);
}

#[tokio::test]
async fn retry_that_fails_again_records_new_reason() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    remote.fail_submit("magnet:?xt=urn:btih:AAA", RemoteError::EmptyResolution);
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_failed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    let outcome = tracker(&db, &remote).retry(&link).await.unwrap();
    assert!(matches!(outcome, RetryOutcome::Failed { ref reason } if reason.contains("no files")));

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.state.status(), DownloadStatus::Failed);
    assert!(stored.state.fail_reason().unwrap().contains("no files"));
}

#[tokio::test]
async fn retry_rejects_downloading_and_completed_links() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let running = seed_link(&db, sub.id, "Running", "magnet:?xt=urn:btih:R").await;
    let done = seed_link(&db, sub.id, "Done", "magnet:?xt=urn:btih:D").await;

    let tracker = tracker(&db, &remote);
    tracker.submit(&running).await.unwrap();
    tracker.submit(&done).await.unwrap();
    db.mark_link_completed(done.id, 5, chrono::Utc::now())
        .await
        .unwrap();

    for (id, status) in [
        (running.id, DownloadStatus::Downloading),
        (done.id, DownloadStatus::Completed),
    ] {
        let before = db.get_link(id).await.unwrap().unwrap();
        let outcome = tracker.retry(&before).await.unwrap();
        assert_eq!(outcome, RetryOutcome::Rejected { status });

        let after = db.get_link(id).await.unwrap().unwrap();
        assert_eq!(after.state, before.state);
    }
    assert_eq!(remote.submitted().len(), 2);
}

#[tokio::test]
async fn retry_of_stale_snapshot_reports_current_state() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_failed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    let tracker = tracker(&db, &remote);
    tracker.retry(&link).await.unwrap();

    // Same failed snapshot again: the link is already downloading
    let outcome = tracker.retry(&link).await.unwrap();
    assert_eq!(
        outcome,
        RetryOutcome::Rejected {
            status: DownloadStatus::Downloading
        }
    );
    assert_eq!(remote.submitted().len(), 1);
}

#[tokio::test]
async fn subscription_without_folder_fails_submission() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    sqlx::query("UPDATE subscriptions SET cloud_folder_id = NULL WHERE id = ?")
        .bind(sub.id)
        .execute(db.pool())
        .await
        .unwrap();

    let outcome = tracker(&db, &remote).submit(&link).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed { ref reason } if reason.contains("no cloud folder")));
    assert!(remote.submitted().is_empty());
}

#[tokio::test]
async fn storage_error_during_submit_releases_claim() {
    let (db, _tmp) = create_test_db().await;
    let remote = ScriptedRemote::new();
    let sub = seed_subscription(&db, 1, "https://example.com/rss").await;
    let link = seed_link(&db, sub.id, "Ep01", "magnet:?xt=urn:btih:AAA").await;

    sqlx::query(
        r#"
        CREATE TRIGGER reject_downloading BEFORE UPDATE OF download_status ON links
        WHEN NEW.download_status = 'downloading'
        BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END
        "#,
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = tracker(&db, &remote).submit(&link).await;
    assert!(result.is_err());
    assert_eq!(remote.submitted().len(), 1);

    let stored = db.get_link(link.id).await.unwrap().unwrap();
    assert_eq!(stored.state, DownloadState::Pending);

    // Claimable right away, well inside the claim timeout
    assert!(db.claim_pending_link(link.id, CLAIM_TIMEOUT).await.unwrap());
}
