//! Traits for the fan-out system

use crate::fanout::error::FanoutResult;
use crate::fanout::event::QueueEvent;
use crate::fanout::hub::PublishReport;
use crate::fanout::subscription::Subscription;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-subscriber delivery counters
pub struct SubscriberStatistics {
    queue_size: AtomicUsize,
    messages_delivered: AtomicUsize,
}

impl Default for SubscriberStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberStatistics {
    pub fn new() -> Self {
        Self {
            queue_size: AtomicUsize::new(0),
            messages_delivered: AtomicUsize::new(0),
        }
    }

    /// Events sent but not yet received by the subscriber
    pub fn queue_size(&self) -> usize {
        self.queue_size.load(Ordering::Relaxed)
    }

    pub fn record_enqueued(&self) {
        self.queue_size.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.queue_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            })
            .ok();
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_delivered(&self) -> usize {
        self.messages_delivered.load(Ordering::Relaxed)
    }
}

/// Per-queue topic transport
///
/// `subscribe` attaches a viewer to one queue; dropping the returned
/// [`Subscription`] detaches it.
pub trait FanoutTransport: Send + Sync {
    fn publish(&self, queue_id: &str, event: QueueEvent) -> FanoutResult<PublishReport>;

    fn subscribe(&self, queue_id: &str, source: &str) -> FanoutResult<Subscription>;
}
