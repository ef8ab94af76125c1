//! A viewer's attachment to one queue topic

use crate::fanout::event::QueueUpdate;
use crate::fanout::traits::SubscriberStatistics;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;

type DetachFn = Box<dyn FnOnce() + Send + Sync>;

/// Receiving end of a queue subscription
///
/// Events arrive in publish order. Dropping the subscription detaches it
/// from the transport immediately.
pub struct Subscription {
    id: u64,
    queue_id: String,
    receiver: UnboundedReceiver<QueueUpdate>,
    statistics: Arc<SubscriberStatistics>,
    detach: Option<DetachFn>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        queue_id: String,
        receiver: UnboundedReceiver<QueueUpdate>,
        statistics: Arc<SubscriberStatistics>,
        detach: DetachFn,
    ) -> Self {
        Self {
            id,
            queue_id,
            receiver,
            statistics,
            detach: Some(detach),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub fn statistics(&self) -> &SubscriberStatistics {
        &self.statistics
    }

    /// Wait for the next event; `None` once the transport dropped this subscriber
    pub async fn recv(&mut self) -> Option<QueueUpdate> {
        let update = self.receiver.recv().await;
        if update.is_some() {
            self.statistics.record_received();
        }
        update
    }

    /// Take an already delivered event without waiting
    pub fn try_recv(&mut self) -> Option<QueueUpdate> {
        let update = self.receiver.try_recv().ok();
        if update.is_some() {
            self.statistics.record_received();
        }
        update
    }
}

impl Stream for Subscription {
    type Item = QueueUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.receiver.poll_recv(cx);
        if let Poll::Ready(Some(_)) = &polled {
            self.statistics.record_received();
        }
        polled
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("queue_id", &self.queue_id)
            .finish()
    }
}
