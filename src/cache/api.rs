//! Public API for the fast-path cache

pub use crate::cache::error::{CacheError, CacheResult};
pub use crate::cache::keys::QueueKeys;
pub use crate::cache::memory::MemoryCache;
pub use crate::cache::traits::{FastPathCache, SetOptions};
