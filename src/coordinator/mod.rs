//! Queue coordinator
//!
//! Owns the token state machine for every queue and the reconciliation
//! between the durable store and the fast-path cache. The store is the
//! source of truth; the cached waiting list and current pointer are a
//! projection that can be dropped and rebuilt at any time.
//!
//! Collaborators (store, cache, fan-out transport, notification dispatcher,
//! clock) are injected through [`api::CoordinatorContext`], so tests run the
//! same code against in-memory fakes.

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod live_view;
pub(crate) mod locks;
pub(crate) mod public_id;
pub(crate) mod service;
pub(crate) mod types;

pub mod api;

#[cfg(test)]
mod tests;
