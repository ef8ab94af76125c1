//! Durable store: the system of record for locations, queues and tokens
//!
//! The coordinator depends only on the [`api::DurableStore`] trait. The
//! bundled [`api::MemoryStore`] is a transactional in-process implementation
//! used by the console binary and by tests.

pub(crate) mod error;
pub(crate) mod memory;
pub(crate) mod model;
pub(crate) mod traits;

pub mod api;

#[cfg(test)]
mod tests;
