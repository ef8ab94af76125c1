//! In-process cache with key expiry
//!
//! Mirrors the semantics of a Redis-style server closely enough for the
//! coordinator: strings and lists share one keyspace, list keys disappear
//! when emptied, and expired keys behave as absent. `set_available(false)`
//! simulates an outage so fallback paths can be exercised.

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::traits::{FastPathCache, SetOptions};
use crate::core::sync::handle_mutex_poison;
use crate::core::time::{Clock, SystemClock};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

enum Value {
    Text(String),
    List(VecDeque<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the cache server going away or coming back
    ///
    /// Contents survive an outage, as they would on a server that was only
    /// unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop every key, as after a cache server restart
    pub fn flush(&self) -> CacheResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, HashMap<String, Entry>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        handle_mutex_poison(self.entries.lock(), CacheError::Unavailable)
    }

    /// Remove `key` if it has expired, then return it
    fn live<'a>(
        &self,
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Option<&'a mut Entry> {
        let now = self.clock.instant();
        let expired = matches!(
            entries.get(key),
            Some(Entry { expires_at: Some(at), .. }) if *at <= now
        );
        if expired {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl FastPathCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> CacheResult<bool> {
        let mut entries = self.lock()?;
        if options.only_if_absent && self.live(&mut entries, key).is_some() {
            return Ok(false);
        }
        let expires_at = options
            .expire_after
            .map(|ttl| self.clock.instant() + ttl);
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.lock()?;
        let existed = self.live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn rpush(&self, key: &str, value: &str) -> CacheResult<usize> {
        let mut entries = self.lock()?;
        if self.live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::List(VecDeque::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                list.push_back(value.to_string());
                Ok(list.len())
            }
            _ => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn lpop(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.lock()?;
        let (popped, now_empty) = match self.live(&mut entries, key) {
            None => return Ok(None),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                let popped = list.pop_front();
                (popped, list.is_empty())
            }
            Some(_) => {
                return Err(CacheError::WrongType {
                    key: key.to_string(),
                })
            }
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> CacheResult<usize> {
        let mut entries = self.lock()?;
        match self.live(&mut entries, key) {
            None => Ok(0),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.len()),
            Some(_) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }
}
