//! Fast-path cache: the live waiting order and current pointer per queue
//!
//! The cache is a disposable accelerator. The coordinator only uses the
//! primitive set a key-value/list server offers (GET, SET [NX] [EX], DEL,
//! RPUSH, LPOP, LLEN), one primitive per step, and can rebuild everything
//! from the durable store.

pub(crate) mod error;
pub(crate) mod keys;
pub(crate) mod memory;
pub(crate) mod traits;

pub mod api;
