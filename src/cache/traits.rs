//! Cache primitive contract

use crate::cache::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Modifiers for [`FastPathCache::set`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Only set when the key does not exist (NX)
    pub only_if_absent: bool,
    /// Expire the key after this long (EX)
    pub expire_after: Option<Duration>,
}

impl SetOptions {
    /// `SET key value NX EX seconds`
    pub fn nx_ex(expire_after: Duration) -> Self {
        Self {
            only_if_absent: true,
            expire_after: Some(expire_after),
        }
    }
}

/// Each method is one atomic primitive on the cache server
#[async_trait]
pub trait FastPathCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Returns false when NX was requested and the key already existed
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> CacheResult<bool>;

    /// Returns true if a key was removed
    async fn del(&self, key: &str) -> CacheResult<bool>;

    /// Append to the tail of a list; returns the new length
    async fn rpush(&self, key: &str, value: &str) -> CacheResult<usize>;

    /// Remove and return the head of a list
    async fn lpop(&self, key: &str) -> CacheResult<Option<String>>;

    async fn llen(&self, key: &str) -> CacheResult<usize>;
}
