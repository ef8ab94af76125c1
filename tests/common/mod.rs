//! Shared fixtures for the integration tests
//!
//! A `Deployment` wires the coordinator to in-memory collaborators and a
//! recording notifier, all driven by a manual clock.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use walkin::cache::api::MemoryCache;
use walkin::coordinator::api::*;
use walkin::core::time::MockClock;
use walkin::dispatch::api::*;
use walkin::fanout::api::*;
use walkin::store::api::*;

pub struct RecordingNotifier {
    seen: Mutex<Vec<NotificationRequest>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, request: &NotificationRequest) -> DispatchResult<()> {
        self.seen.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(DispatchError::Rejected { status: 503 });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub struct Deployment {
    pub coordinator: Arc<QueueCoordinator>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub hub: Arc<FanoutHub>,
    pub clock: MockClock,
    pub dispatch: DispatchHandle,
    pub worker: JoinHandle<()>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Deployment {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new())
    }

    pub fn with_notifier(notifier: Arc<RecordingNotifier>) -> Self {
        let clock = MockClock::new();
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::with_clock(Arc::new(clock.clone())));
        let hub = Arc::new(FanoutHub::with_clock(
            DEFAULT_HIGH_WATER_MARK,
            Arc::new(clock.clone()),
        ));
        let (dispatch, worker) =
            NotificationDispatcher::spawn(notifier.clone(), DispatchSettings::default(), None);

        let coordinator = Arc::new(QueueCoordinator::new(
            CoordinatorContext {
                store: store.clone(),
                cache: cache.clone(),
                fanout: hub.clone(),
                dispatcher: dispatch.clone(),
                clock: Arc::new(clock.clone()),
            },
            CoordinatorConfig::default(),
        ));

        Self {
            coordinator,
            store,
            cache,
            hub,
            clock,
            dispatch,
            worker,
            notifier,
        }
    }

    /// Enroll a queue and return `(queue_id, public_id)`
    pub async fn enroll(&self, queue_name: &str, prefix: &str) -> (String, String) {
        let receipt = self
            .coordinator
            .enroll(EnrollRequest {
                doctor_name: "Dr. Iyer".to_string(),
                location_name: "City Hospital".to_string(),
                location_address: "1 Main Street".to_string(),
                location_type: "Hospital".to_string(),
                queue_name: queue_name.to_string(),
                token_prefix: prefix.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (receipt.queue_id, receipt.public_id)
    }

    pub async fn settle_notifications(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.dispatch.statistics().settled() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notifications should settle");
    }
}

/// Every event already delivered to a subscription
pub fn drain(subscription: &mut Subscription) -> Vec<QueueEvent> {
    let mut events = Vec::new();
    while let Some(update) = subscription.try_recv() {
        events.push(update.event);
    }
    events
}
