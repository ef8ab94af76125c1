//! Subscriber attach/detach behaviour

use crate::fanout::api::*;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_drop_detaches_immediately() {
    let hub = FanoutHub::default();
    let sub = hub.subscribe("q1", "patient").unwrap();
    let other = hub.subscribe("q1", "display").unwrap();
    assert_eq!(hub.subscriber_count("q1"), 2);

    drop(sub);
    assert_eq!(hub.subscriber_count("q1"), 1);

    drop(other);
    assert_eq!(hub.subscriber_count("q1"), 0);
}

#[tokio::test]
async fn test_dropping_hub_ends_subscription() {
    let hub = FanoutHub::default();
    let mut sub = hub.subscribe("q1", "patient").unwrap();
    drop(hub);

    let next = timeout(Duration::from_millis(100), sub.recv()).await.unwrap();
    assert!(next.is_none());
    // Detaching after the hub is gone must not panic.
    drop(sub);
}

#[tokio::test]
async fn test_lagging_subscriber_is_detached() {
    let hub = FanoutHub::new(2);
    let mut slow = hub.subscribe("q1", "slow-display").unwrap();
    let mut fast = hub.subscribe("q1", "control-room").unwrap();

    for _ in 0..3 {
        hub.publish("q1", QueueEvent::Idle).unwrap();
        fast.recv().await.unwrap();
    }

    assert_eq!(hub.subscriber_count("q1"), 1);

    // The slow subscriber still drains what it was sent, then sees the end.
    assert!(slow.recv().await.is_some());
    assert!(slow.recv().await.is_some());
    assert!(slow.recv().await.is_none());
}
