//! Public API for the queue coordinator

pub use crate::coordinator::config::{
    CoordinatorConfig, DEFAULT_APP_BASE_URL, DEFAULT_DEDUPE_WINDOW,
};
pub use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
pub use crate::coordinator::public_id::PUBLIC_ID_PREFIX;
pub use crate::coordinator::service::{CoordinatorContext, QueueCoordinator};
pub use crate::coordinator::types::{
    AdmitReceipt, CallNextOutcome, EnrollReceipt, EnrollRequest, QueueBrief, QueueSnapshot,
    QueueSummary, TokenLookup, TokenSummary,
};
