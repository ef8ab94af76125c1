//! Public API for the fan-out system

pub use crate::fanout::error::{FanoutError, FanoutResult};
pub use crate::fanout::event::{QueueEvent, QueueUpdate};
pub use crate::fanout::hub::{FanoutHub, PublishReport, DEFAULT_HIGH_WATER_MARK};
pub use crate::fanout::subscription::Subscription;
pub use crate::fanout::traits::{FanoutTransport, SubscriberStatistics};
