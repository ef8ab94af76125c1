//! Call-next, skip and status transitions end to end

use super::{drain, Harness, RecordingNotifier};
use crate::coordinator::api::*;
use crate::fanout::api::*;
use crate::store::api::*;

#[tokio::test]
async fn test_serving_order_and_idle() {
    let h = Harness::new().await;

    assert_eq!(h.admit("1111111111").await.token_number, "A-001");
    assert_eq!(h.admit("2222222222").await.token_number, "A-002");

    let first = h.coordinator.call_next(&h.queue_id).await.unwrap();
    assert_eq!(first.current.as_deref(), Some("A-001"));
    assert_eq!(first.waiting_count, 1);

    let second = h.coordinator.call_next(&h.queue_id).await.unwrap();
    assert_eq!(second.current.as_deref(), Some("A-002"));
    assert_eq!(second.waiting_count, 0);
    assert_eq!(h.token("A-001").await.status, TokenStatus::Served);

    let idle = h.coordinator.call_next(&h.queue_id).await.unwrap();
    assert_eq!(
        idle,
        CallNextOutcome {
            current: None,
            waiting_count: 0
        }
    );
    assert_eq!(h.token("A-002").await.status, TokenStatus::Served);
}

#[tokio::test]
async fn test_call_next_stamps_served_at() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    h.clock.advance(std::time::Duration::from_secs(7 * 60));
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    let served = h.token("A-001").await;
    assert_eq!(served.service_minutes(), Some(7.0));
}

#[tokio::test]
async fn test_call_next_with_only_current_goes_idle() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    let mut viewer = h.coordinator.subscribe(&h.queue_id, "display").await.unwrap();
    let outcome = h.coordinator.call_next(&h.queue_id).await.unwrap();

    assert_eq!(outcome.current, None);
    assert_eq!(outcome.waiting_count, 0);
    assert_eq!(h.token("A-001").await.status, TokenStatus::Served);
    assert_eq!(drain(&mut viewer), vec![QueueEvent::Idle]);

    let snapshot = h.coordinator.snapshot(&h.public_id).await.unwrap();
    assert_eq!(snapshot.now_serving, None);
}

#[tokio::test]
async fn test_events_follow_state_changes() {
    let h = Harness::new().await;
    let mut viewer = h.coordinator.subscribe(&h.queue_id, "patient").await.unwrap();

    h.admit("1111111111").await;
    h.admit("2222222222").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();
    h.coordinator.skip(&h.queue_id).await.unwrap();
    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Closed)
        .await
        .unwrap();

    assert_eq!(
        drain(&mut viewer),
        vec![
            QueueEvent::Update {
                now_serving: None,
                waiting_count: 1
            },
            QueueEvent::Update {
                now_serving: None,
                waiting_count: 2
            },
            QueueEvent::Update {
                now_serving: Some("A-001".to_string()),
                waiting_count: 1
            },
            QueueEvent::Skipped,
            QueueEvent::Closed {
                status: QueueStatus::Closed
            },
        ]
    );
}

#[tokio::test]
async fn test_admit_reports_current_token() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    let mut viewer = h.coordinator.subscribe(&h.queue_id, "kiosk").await.unwrap();
    let receipt = h.admit("2222222222").await;
    assert_eq!(receipt.waiting_count, 1);
    assert_eq!(
        drain(&mut viewer),
        vec![QueueEvent::Update {
            now_serving: Some("A-001".to_string()),
            waiting_count: 1
        }]
    );
}

#[tokio::test]
async fn test_skip_marks_current_skipped() {
    let h = Harness::new().await;
    let receipt = h.admit("1111111111").await;
    h.admit("2222222222").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    assert_eq!(h.coordinator.skip(&h.queue_id).await.unwrap(), "A-001");

    let skipped = h.store.find_token(&receipt.token_id).await.unwrap().unwrap();
    assert_eq!(skipped.status, TokenStatus::Skipped);
    assert_eq!(skipped.served_at, None);

    let snapshot = h.coordinator.snapshot(&h.public_id).await.unwrap();
    assert_eq!(snapshot.now_serving, None);
    assert_eq!(snapshot.waiting_count, 1);

    // the next call serves A-002 without touching the skipped token
    let next = h.coordinator.call_next(&h.queue_id).await.unwrap();
    assert_eq!(next.current.as_deref(), Some("A-002"));
    assert!(h.store.recent_served(&h.queue_id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_skip_without_current_changes_nothing() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    let mut viewer = h.coordinator.subscribe(&h.queue_id, "control-room").await.unwrap();

    let err = h.coordinator.skip(&h.queue_id).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidState");

    assert_eq!(h.token("A-001").await.status, TokenStatus::Waiting);
    assert!(drain(&mut viewer).is_empty());
}

#[tokio::test]
async fn test_skip_allowed_on_closed_queue() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();
    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Closed)
        .await
        .unwrap();

    assert_eq!(h.coordinator.skip(&h.queue_id).await.unwrap(), "A-001");
}

#[tokio::test]
async fn test_call_next_on_closed_or_missing_queue() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Closed)
        .await
        .unwrap();

    let err = h.coordinator.call_next(&h.queue_id).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidState");
    assert_eq!(h.token("A-001").await.status, TokenStatus::Waiting);

    let err = h.coordinator.call_next("que_missing").await.unwrap_err();
    assert_eq!(err, CoordinatorError::not_found("Queue"));
}

#[tokio::test]
async fn test_set_status_is_idempotent() {
    let h = Harness::new().await;
    let mut viewer = h.coordinator.subscribe(&h.queue_id, "display").await.unwrap();

    for _ in 0..2 {
        assert_eq!(
            h.coordinator
                .set_status(&h.queue_id, QueueStatus::Open)
                .await
                .unwrap(),
            QueueStatus::Open
        );
    }
    assert_eq!(
        drain(&mut viewer),
        vec![
            QueueEvent::Open {
                status: QueueStatus::Open
            },
            QueueEvent::Open {
                status: QueueStatus::Open
            },
        ]
    );

    let err = h
        .coordinator
        .set_status("que_missing", QueueStatus::Closed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[tokio::test]
async fn test_status_change_leaves_live_view_alone() {
    let h = Harness::new().await;
    h.admit("1111111111").await;
    h.admit("2222222222").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Closed)
        .await
        .unwrap();
    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Open)
        .await
        .unwrap();

    let snapshot = h.coordinator.snapshot(&h.public_id).await.unwrap();
    assert_eq!(snapshot.now_serving.as_deref(), Some("A-001"));
    assert_eq!(snapshot.waiting_count, 1);
}

#[tokio::test]
async fn test_serving_token_is_notified() {
    let h = Harness::new().await;
    h.coordinator
        .admit(&h.queue_id, "9876543210", Some("Asha"))
        .await
        .unwrap();
    h.coordinator.call_next(&h.queue_id).await.unwrap();
    h.settle_notifications(1).await;

    let seen = h.notifier.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].mobile, "9876543210");
    assert_eq!(seen[0].token_number, "A-001");
    assert_eq!(seen[0].queue_name, "Q");
    assert_eq!(seen[0].location_name, "City Hospital");
}

#[tokio::test]
async fn test_notifier_failure_does_not_affect_call_next() {
    let h = Harness::with_notifier(RecordingNotifier::new(true)).await;
    h.admit("1111111111").await;
    h.admit("2222222222").await;

    let first = h.coordinator.call_next(&h.queue_id).await.unwrap();
    let second = h.coordinator.call_next(&h.queue_id).await.unwrap();
    h.settle_notifications(2).await;

    assert_eq!(first.current.as_deref(), Some("A-001"));
    assert_eq!(second.current.as_deref(), Some("A-002"));
    assert_eq!(h.dispatch.statistics().failed(), 2);
    assert_eq!(h.notifier.token_numbers(), vec!["A-001", "A-002"]);
}
