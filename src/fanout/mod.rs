//! Live update fan-out
//!
//! Per-queue broadcast of state changes to patient pages, display boards and
//! the control room. Delivery is best-effort and at-most-once per connected
//! subscriber; a subscriber that misses events resyncs by fetching a fresh
//! snapshot.

pub(crate) mod error;
pub(crate) mod event;
pub(crate) mod hub;
pub(crate) mod subscription;
pub(crate) mod traits;

pub mod api;

#[cfg(test)]
mod tests;
