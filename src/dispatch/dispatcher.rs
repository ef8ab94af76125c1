//! Background handoff of notification requests

use crate::dispatch::error::{DispatchError, DispatchResult};
use crate::dispatch::notifier::{NotificationRequest, Notifier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const DEFAULT_DISPATCH_CAPACITY: usize = 1024;
pub const DEFAULT_NOTIFIER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Requests that may wait for the worker before new ones are dropped
    pub capacity: usize,
    /// Upper bound on a single notifier call
    pub timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_DISPATCH_CAPACITY,
            timeout: DEFAULT_NOTIFIER_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
pub struct DispatchStatistics {
    queued: AtomicUsize,
    sent: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
}

impl DispatchStatistics {
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    /// Notifier errors and timeouts
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Requests never handed to the notifier
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Requests the worker has finished with, either way
    pub fn settled(&self) -> usize {
        self.sent() + self.failed()
    }
}

/// Cloneable sending side, held by the coordinator
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<NotificationRequest>,
    statistics: Arc<DispatchStatistics>,
}

impl DispatchHandle {
    /// Queue a request without waiting
    ///
    /// Never blocks. A full queue or a stopped worker drops the request and
    /// reports why; the caller only logs it.
    pub fn dispatch(&self, request: NotificationRequest) -> DispatchResult<()> {
        match self.sender.try_send(request) {
            Ok(()) => {
                self.statistics.queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.statistics.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.statistics.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DispatchError::Closed)
            }
        }
    }

    pub fn statistics(&self) -> &DispatchStatistics {
        &self.statistics
    }
}

pub struct NotificationDispatcher;

impl NotificationDispatcher {
    /// Start the worker task
    ///
    /// The worker stops when every [`DispatchHandle`] is dropped, or when
    /// `shutdown` fires; in the latter case requests already queued are
    /// still attempted.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        settings: DispatchSettings,
        shutdown: Option<broadcast::Receiver<()>>,
    ) -> (DispatchHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(settings.capacity.max(1));
        let statistics = Arc::new(DispatchStatistics::default());
        let handle = DispatchHandle {
            sender,
            statistics: statistics.clone(),
        };

        let worker = tokio::spawn(run_worker(
            notifier, settings, receiver, statistics, shutdown,
        ));
        (handle, worker)
    }
}

async fn run_worker(
    notifier: Arc<dyn Notifier>,
    settings: DispatchSettings,
    mut receiver: mpsc::Receiver<NotificationRequest>,
    statistics: Arc<DispatchStatistics>,
    shutdown: Option<broadcast::Receiver<()>>,
) {
    log::debug!("Notification dispatcher started ({} notifier)", notifier.name());
    let mut shutdown = shutdown;

    loop {
        let next = match shutdown.as_mut() {
            Some(signal) => {
                tokio::select! {
                    request = receiver.recv() => request,
                    _ = signal.recv() => {
                        log::debug!("Notification dispatcher draining for shutdown");
                        receiver.close();
                        shutdown = None;
                        continue;
                    }
                }
            }
            None => receiver.recv().await,
        };

        let Some(request) = next else {
            break;
        };
        deliver(notifier.as_ref(), &request, settings.timeout, &statistics).await;
    }

    log::debug!(
        "Notification dispatcher stopped: {} sent, {} failed, {} dropped",
        statistics.sent(),
        statistics.failed(),
        statistics.dropped()
    );
}

async fn deliver(
    notifier: &dyn Notifier,
    request: &NotificationRequest,
    limit: Duration,
    statistics: &DispatchStatistics,
) {
    match timeout(limit, notifier.notify(request)).await {
        Ok(Ok(())) => {
            statistics.sent.fetch_add(1, Ordering::Relaxed);
            log::debug!("Notified {} for token {}", request.mobile, request.token_number);
        }
        Ok(Err(e)) => {
            statistics.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "Notification for token {} failed: {}",
                request.token_number,
                e
            );
        }
        Err(_) => {
            statistics.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "Notification for token {} failed: {}",
                request.token_number,
                DispatchError::Timeout {
                    after_ms: limit.as_millis()
                }
            );
        }
    }
}
