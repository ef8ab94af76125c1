//! Admission checks, dedup cooldown and concurrent sequencing

use super::{drain, Harness};
use crate::coordinator::api::*;
use crate::store::api::*;
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_admit_returns_receipt() {
    let h = Harness::new().await;
    let receipt = h
        .coordinator
        .admit(&h.queue_id, " 9876543210 ", Some("  Asha "))
        .await
        .unwrap();

    assert_eq!(receipt.token_number, "A-001");
    assert_eq!(receipt.waiting_count, 1);

    let token = h.store.find_token(&receipt.token_id).await.unwrap().unwrap();
    assert_eq!(token.mobile, "9876543210");
    assert_eq!(token.patient_name.as_deref(), Some("Asha"));
    assert_eq!(token.status, TokenStatus::Waiting);
}

#[tokio::test]
async fn test_malformed_mobile_is_rejected() {
    let h = Harness::new().await;
    for mobile in ["", "12345", "98765x3210", "987654321012"] {
        let err = h.coordinator.admit(&h.queue_id, mobile, None).await.unwrap_err();
        assert_eq!(err.kind(), "Validation");
    }
    assert_eq!(h.store.token_count(&h.queue_id).await, 0);
}

#[tokio::test]
async fn test_unknown_queue_is_not_found() {
    let h = Harness::new().await;
    let err = h
        .coordinator
        .admit("que_missing", "9876543210", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[tokio::test]
async fn test_active_duplicate_returns_existing_token() {
    let h = Harness::new().await;
    h.admit("9876543210").await;

    // past the cooldown, so only the active-token check can fire
    h.clock.advance(Duration::from_secs(11));
    let err = h
        .coordinator
        .admit(&h.queue_id, "9876543210", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Conflict { ref token_number, .. } if token_number == "A-001"
    ));

    // still a conflict while the token is being served
    h.coordinator.call_next(&h.queue_id).await.unwrap();
    let err = h
        .coordinator
        .admit(&h.queue_id, "9876543210", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "Conflict");
    assert_eq!(h.store.token_count(&h.queue_id).await, 1);
}

#[tokio::test]
async fn test_conflict_reported_before_cooldown() {
    let h = Harness::new().await;
    h.admit("9876543210").await;

    let err = h
        .coordinator
        .admit(&h.queue_id, "9876543210", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "Conflict");
}

#[tokio::test]
async fn test_rejoin_after_served() {
    let h = Harness::new().await;
    h.admit("9876543210").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();
    h.coordinator.call_next(&h.queue_id).await.unwrap();

    h.clock.advance(Duration::from_secs(11));
    let receipt = h.admit("9876543210").await;
    assert_eq!(receipt.token_number, "A-002");
}

#[tokio::test]
async fn test_rapid_resubmit_is_rate_limited() {
    let h = Harness::new().await;
    h.admit("9876543210").await;
    h.coordinator.call_next(&h.queue_id).await.unwrap();
    h.coordinator.skip(&h.queue_id).await.unwrap();

    // no active token any more, but the cooldown marker is still live
    let err = h
        .coordinator
        .admit(&h.queue_id, "9876543210", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::RateLimited {
            retry_after_secs: 10,
            ..
        }
    ));

    h.clock.advance(Duration::from_secs(10));
    assert_eq!(h.admit("9876543210").await.token_number, "A-002");
}

#[tokio::test]
async fn test_closed_queue_rejects_then_reopens() {
    let h = Harness::new().await;
    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Closed)
        .await
        .unwrap();

    let err = h
        .coordinator
        .admit(&h.queue_id, "9876543210", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidState");

    h.coordinator
        .set_status(&h.queue_id, QueueStatus::Open)
        .await
        .unwrap();
    assert_eq!(h.admit("9876543210").await.token_number, "A-001");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_get_distinct_sequences() {
    let h = Harness::new().await;
    let mut viewer = h.coordinator.subscribe(&h.queue_id, "display").await.unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..40u64 {
        let coordinator = h.coordinator.clone();
        let queue_id = h.queue_id.clone();
        tasks.spawn(async move {
            coordinator
                .admit(&queue_id, &format!("{}", 9_000_000_000u64 + i), None)
                .await
                .unwrap()
        });
    }

    let mut numbers = HashSet::new();
    while let Some(receipt) = tasks.join_next().await {
        numbers.insert(receipt.unwrap().token_number);
    }
    let expected: HashSet<String> = (1..=40).map(|n| format_token_number("A", n)).collect();
    assert_eq!(numbers, expected);

    // waiting counts in published order are 1..=40
    let counts: Vec<usize> = drain(&mut viewer)
        .into_iter()
        .filter_map(|event| match event {
            crate::fanout::api::QueueEvent::Update { waiting_count, .. } => Some(waiting_count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, (1..=40).collect::<Vec<_>>());

    // FIFO by sequence
    for n in 1..=40 {
        let outcome = h.coordinator.call_next(&h.queue_id).await.unwrap();
        assert_eq!(outcome.current, Some(format_token_number("A", n)));
    }
}

#[tokio::test]
async fn test_failed_commit_clears_cooldown() {
    let h = Harness::new().await;

    h.store.inject_insert_fault(true);
    let err = h
        .coordinator
        .admit(&h.queue_id, "9876543210", None)
        .await
        .unwrap_err();
    assert_ne!(err.kind(), "RateLimited");
    assert_eq!(h.store.token_count(&h.queue_id).await, 0);

    h.store.inject_insert_fault(false);
    let receipt = h.admit("9876543210").await;
    assert_eq!(receipt.token_number, "A-001");
    assert_eq!(receipt.waiting_count, 1);
}
