//! Notification dispatch
//!
//! When a token starts being served the coordinator hands a request to a
//! background worker and moves on. The contract is at-most-once and
//! best-effort: a full handoff queue drops the request, a failed or slow
//! notifier call is logged and never retried here, and nothing that happens
//! in the worker can affect the already committed state transition.

pub(crate) mod dispatcher;
pub(crate) mod error;
pub(crate) mod notifier;

pub mod api;
