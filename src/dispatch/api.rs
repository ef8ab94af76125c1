//! Public API for notification dispatch

pub use crate::dispatch::dispatcher::{
    DispatchHandle, DispatchSettings, DispatchStatistics, NotificationDispatcher,
};
pub use crate::dispatch::error::{DispatchError, DispatchResult};
pub use crate::dispatch::notifier::{
    ready_message, HttpNotifier, LogNotifier, NotificationRequest, Notifier,
};
