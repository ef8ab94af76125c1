//! FanoutHub: in-process per-queue topics
//!
//! Each subscriber owns an unbounded channel. A subscriber that stops reading
//! and reaches the high-water mark is detached rather than buffered without
//! limit; it will resync from a snapshot when it reconnects.

use crate::core::sync::handle_mutex_poison;
use crate::core::time::{Clock, SystemClock};
use crate::fanout::error::{FanoutError, FanoutResult};
use crate::fanout::event::{QueueEvent, QueueUpdate};
use crate::fanout::subscription::Subscription;
use crate::fanout::traits::{FanoutTransport, SubscriberStatistics};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

/// Undelivered events a subscriber may hold before it is detached
pub const DEFAULT_HIGH_WATER_MARK: usize = 256;

struct SubscriberInfo {
    source: String,
    sender: UnboundedSender<QueueUpdate>,
    statistics: Arc<SubscriberStatistics>,
}

#[derive(Default)]
struct Topic {
    next_sequence: u64,
    subscribers: HashMap<u64, SubscriberInfo>,
}

#[derive(Default)]
struct HubState {
    next_subscriber_id: u64,
    topics: HashMap<String, Topic>,
}

impl HubState {
    fn detach(&mut self, queue_id: &str, subscriber_id: u64) -> bool {
        let Some(topic) = self.topics.get_mut(queue_id) else {
            return false;
        };
        let removed = topic.subscribers.remove(&subscriber_id).is_some();
        if topic.subscribers.is_empty() {
            self.topics.remove(queue_id);
        }
        removed
    }
}

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sequence: u64,
    pub delivered: usize,
    /// Subscribers whose receiver was gone
    pub disconnected: usize,
    /// Subscribers detached for lagging past the high-water mark
    pub lagging: usize,
}

pub struct FanoutHub {
    state: Arc<Mutex<HubState>>,
    clock: Arc<dyn Clock>,
    high_water_mark: usize,
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER_MARK)
    }
}

impl FanoutHub {
    pub fn new(high_water_mark: usize) -> Self {
        Self::with_clock(high_water_mark, Arc::new(SystemClock))
    }

    pub fn with_clock(high_water_mark: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            clock,
            high_water_mark: high_water_mark.max(1),
        }
    }

    fn lock(&self) -> FanoutResult<MutexGuard<'_, HubState>> {
        handle_mutex_poison(self.state.lock(), FanoutError::Unavailable)
    }

    pub fn subscriber_count(&self, queue_id: &str) -> usize {
        self.lock()
            .map(|state| {
                state
                    .topics
                    .get(queue_id)
                    .map_or(0, |topic| topic.subscribers.len())
            })
            .unwrap_or(0)
    }
}

impl FanoutTransport for FanoutHub {
    fn publish(&self, queue_id: &str, event: QueueEvent) -> FanoutResult<PublishReport> {
        let published_at = self.clock.now();
        let mut state = self.lock()?;
        let Some(topic) = state.topics.get_mut(queue_id) else {
            return Ok(PublishReport::default());
        };

        topic.next_sequence += 1;
        let update = QueueUpdate {
            queue_id: queue_id.to_string(),
            sequence: topic.next_sequence,
            published_at,
            event,
        };

        let mut report = PublishReport {
            sequence: update.sequence,
            ..PublishReport::default()
        };
        let mut detached = Vec::new();

        for (subscriber_id, info) in &topic.subscribers {
            if info.statistics.queue_size() >= self.high_water_mark {
                log::warn!(
                    "Detaching lagging subscriber '{}' on queue {} ({} undelivered)",
                    info.source,
                    queue_id,
                    info.statistics.queue_size()
                );
                report.lagging += 1;
                detached.push(*subscriber_id);
                continue;
            }

            info.statistics.record_enqueued();
            if info.sender.send(update.clone()).is_err() {
                log::debug!(
                    "Subscriber '{}' on queue {} disconnected",
                    info.source,
                    queue_id
                );
                report.disconnected += 1;
                detached.push(*subscriber_id);
            } else {
                report.delivered += 1;
            }
        }

        for subscriber_id in detached {
            state.detach(queue_id, subscriber_id);
        }

        log::trace!(
            "Published {} #{} on queue {} to {} subscribers",
            update.event.kind(),
            update.sequence,
            queue_id,
            report.delivered
        );
        Ok(report)
    }

    fn subscribe(&self, queue_id: &str, source: &str) -> FanoutResult<Subscription> {
        let (sender, receiver) = unbounded_channel();
        let statistics = Arc::new(SubscriberStatistics::new());

        let subscriber_id = {
            let mut state = self.lock()?;
            state.next_subscriber_id += 1;
            let subscriber_id = state.next_subscriber_id;
            state
                .topics
                .entry(queue_id.to_string())
                .or_default()
                .subscribers
                .insert(
                    subscriber_id,
                    SubscriberInfo {
                        source: source.to_string(),
                        sender,
                        statistics: statistics.clone(),
                    },
                );
            subscriber_id
        };
        log::debug!(
            "Subscriber '{}' attached to queue {} (id {})",
            source,
            queue_id,
            subscriber_id
        );

        let weak: Weak<Mutex<HubState>> = Arc::downgrade(&self.state);
        let topic_key = queue_id.to_string();
        let detach = Box::new(move || {
            if let Some(state) = weak.upgrade() {
                if let Ok(mut state) = state.lock() {
                    if state.detach(&topic_key, subscriber_id) {
                        log::debug!(
                            "Subscriber {} detached from queue {}",
                            subscriber_id,
                            topic_key
                        );
                    }
                }
            }
        });

        Ok(Subscription::new(
            subscriber_id,
            queue_id.to_string(),
            receiver,
            statistics,
            detach,
        ))
    }
}
