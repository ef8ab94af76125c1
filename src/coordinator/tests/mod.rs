//! Tests for the queue coordinator

mod admission;
mod flow;

use crate::cache::api::MemoryCache;
use crate::coordinator::api::*;
use crate::core::time::MockClock;
use crate::dispatch::api::*;
use crate::fanout::api::*;
use crate::store::api::*;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Notifier double that remembers what it was asked to send
pub(super) struct RecordingNotifier {
    pub seen: Mutex<Vec<NotificationRequest>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            fail,
        })
    }

    pub fn token_numbers(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.token_number.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, request: &NotificationRequest) -> DispatchResult<()> {
        self.seen.lock().unwrap().push(request.clone());
        if self.fail {
            Err(DispatchError::Transport("connection reset".to_string()))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub(super) struct Harness {
    pub coordinator: Arc<QueueCoordinator>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub hub: Arc<FanoutHub>,
    pub clock: MockClock,
    pub dispatch: DispatchHandle,
    pub notifier: Arc<RecordingNotifier>,
    pub queue_id: String,
    pub public_id: String,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new(false)).await
    }

    pub async fn with_notifier(notifier: Arc<RecordingNotifier>) -> Self {
        let clock = MockClock::new();
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::with_clock(Arc::new(clock.clone())));
        let hub = Arc::new(FanoutHub::with_clock(
            DEFAULT_HIGH_WATER_MARK,
            Arc::new(clock.clone()),
        ));
        let (dispatch, _worker) = NotificationDispatcher::spawn(
            notifier.clone(),
            DispatchSettings {
                capacity: 16,
                timeout: Duration::from_secs(1),
            },
            None,
        );

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

        let enrolled = coordinator
            .enroll(EnrollRequest {
                doctor_name: "Dr. Rao".to_string(),
                location_name: "City Hospital".to_string(),
                location_address: "123 Main Street".to_string(),
                location_type: "Hospital".to_string(),
                queue_name: "Q".to_string(),
                token_prefix: "A".to_string(),
                ..EnrollRequest::default()
            })
            .await
            .unwrap();

        Self {
            coordinator,
            store,
            cache,
            hub,
            clock,
            dispatch,
            notifier,
            queue_id: enrolled.queue_id,
            public_id: enrolled.public_id,
        }
    }

    pub async fn admit(&self, mobile: &str) -> AdmitReceipt {
        self.coordinator
            .admit(&self.queue_id, mobile, None)
            .await
            .unwrap()
    }

    pub async fn token(&self, token_number: &str) -> Token {
        let waiting = self.store.waiting_tokens(&self.queue_id).await.unwrap();
        let serving = self.store.serving_token(&self.queue_id).await.unwrap();
        let served = self.store.recent_served(&self.queue_id, 100).await.unwrap();
        waiting
            .into_iter()
            .chain(serving)
            .chain(served)
            .find(|t| t.token_number == token_number)
            .unwrap_or_else(|| panic!("no token {}", token_number))
    }

    /// Wait until the dispatcher has finished with `expected` requests
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
pub(super) fn drain(subscription: &mut Subscription) -> Vec<QueueEvent> {
    let mut events = Vec::new();
    while let Some(update) = subscription.try_recv() {
        events.push(update.event);
    }
    events
}
