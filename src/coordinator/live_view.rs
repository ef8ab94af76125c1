//! Live queue view reconciliation
//!
//! The waiting list and current pointer held in the fast-path cache are a
//! projection of the store's token rows. This module owns every read and
//! write of that projection:
//!
//! - the view is rebuilt only when the waiting list is empty AND no current
//!   pointer is set; an empty list with a pointer is one person being served
//! - a rebuild is a pure recomputation from the store, never a patch
//! - when a cache call fails the queue is marked degraded and reads come
//!   from the store until a later call reaches the cache again, at which
//!   point both keys are dropped and rebuilt
//!
//! Callers hold the queue's [`QueueGuard`](super::locks::QueueGuard) for the
//! whole operation. That lock only covers this process, so a rebuild also
//! takes the cache's `queue:{id}:rebuild` claim (SET NX EX). Only the holder
//! recomputes the view; other instances wait for it to finish and read the
//! store if it takes too long. The claim expires on its own if its holder
//! dies mid-rebuild.

use crate::cache::api::{CacheError, FastPathCache, QueueKeys, SetOptions};
use crate::coordinator::error::CoordinatorResult;
use crate::store::api::{DurableStore, Token, TokenStatus};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const REBUILD_CLAIM_TTL: Duration = Duration::from_secs(5);
const REBUILD_POLL_INTERVAL: Duration = Duration::from_millis(5);
const REBUILD_WAIT_ATTEMPTS: usize = 200;

enum Claim {
    Won,
    Busy,
}

pub(crate) struct LiveView {
    store: Arc<dyn DurableStore>,
    cache: Arc<dyn FastPathCache>,
    degraded: Mutex<HashSet<String>>,
}

impl LiveView {
    pub(crate) fn new(store: Arc<dyn DurableStore>, cache: Arc<dyn FastPathCache>) -> Self {
        Self {
            store,
            cache,
            degraded: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn is_degraded(&self, queue_id: &str) -> bool {
        self.degraded
            .lock()
            .map(|set| set.contains(queue_id))
            .unwrap_or(true)
    }

    /// Stop trusting the cached view until it has been rebuilt
    pub(crate) fn invalidate(&self, queue_id: &str) {
        if let Ok(mut set) = self.degraded.lock() {
            set.insert(queue_id.to_string());
        }
    }

    fn degrade(&self, queue_id: &str, operation: &str, err: &CacheError) {
        if !self.is_degraded(queue_id) {
            log::warn!(
                "Cache {} failed for queue {}, serving from store: {}",
                operation,
                queue_id,
                err
            );
        }
        self.invalidate(queue_id);
    }

    fn recovered(&self, queue_id: &str) {
        if let Ok(mut set) = self.degraded.lock() {
            if set.remove(queue_id) {
                log::info!("Cache view for queue {} rebuilt after outage", queue_id);
            }
        }
    }

    /// Make the cached view usable, rebuilding it if needed
    ///
    /// Never fails because of the cache; only store errors propagate.
    pub(crate) async fn ensure(&self, queue_id: &str) -> CoordinatorResult<()> {
        let keys = QueueKeys::new(queue_id);

        if self.is_degraded(queue_id) {
            return match self.claim_rebuild(&keys).await {
                Ok(Claim::Won) => self.rebuild_claimed(queue_id, &keys, true).await,
                // claim held elsewhere or cache still down: stay on the store
                Ok(Claim::Busy) | Err(_) => Ok(()),
            };
        }

        for _ in 0..REBUILD_WAIT_ATTEMPTS {
            match self.needs_rebuild(&keys).await {
                Ok(false) => return Ok(()),
                Ok(true) => {}
                Err(e) => {
                    self.degrade(queue_id, "read", &e);
                    return Ok(());
                }
            }
            match self.claim_rebuild(&keys).await {
                Ok(Claim::Won) => return self.rebuild_claimed(queue_id, &keys, false).await,
                Ok(Claim::Busy) => tokio::time::sleep(REBUILD_POLL_INTERVAL).await,
                Err(e) => {
                    self.degrade(queue_id, "claim", &e);
                    return Ok(());
                }
            }
        }

        log::warn!(
            "Rebuild of queue {} still held elsewhere, serving from store",
            queue_id
        );
        self.invalidate(queue_id);
        Ok(())
    }

    async fn claim_rebuild(&self, keys: &QueueKeys) -> Result<Claim, CacheError> {
        let won = self
            .cache
            .set(&keys.rebuild, "1", SetOptions::nx_ex(REBUILD_CLAIM_TTL))
            .await?;
        Ok(if won { Claim::Won } else { Claim::Busy })
    }

    /// Rebuild while holding the claim, then release it
    ///
    /// With `reset` both keys are dropped first. Without it the empty check is
    /// repeated; a previous holder may already have filled the view.
    async fn rebuild_claimed(
        &self,
        queue_id: &str,
        keys: &QueueKeys,
        reset: bool,
    ) -> CoordinatorResult<()> {
        let outcome = self.rebuild_step(queue_id, keys, reset).await;

        if let Err(e) = self.cache.del(&keys.rebuild).await {
            log::debug!("Could not release rebuild claim for {}: {}", queue_id, e);
        }

        match outcome? {
            Ok(()) => {
                if reset {
                    self.recovered(queue_id);
                }
                Ok(())
            }
            Err(e) => {
                self.degrade(queue_id, "rebuild", &e);
                Ok(())
            }
        }
    }

    async fn rebuild_step(
        &self,
        queue_id: &str,
        keys: &QueueKeys,
        reset: bool,
    ) -> CoordinatorResult<Result<(), CacheError>> {
        if reset {
            if let Err(e) = self.reset(keys).await {
                return Ok(Err(e));
            }
        } else {
            match self.needs_rebuild(keys).await {
                Ok(true) => {}
                Ok(false) => return Ok(Ok(())),
                Err(e) => return Ok(Err(e)),
            }
        }
        self.rebuild(queue_id, keys).await
    }

    async fn reset(&self, keys: &QueueKeys) -> Result<(), CacheError> {
        self.cache.del(&keys.waiting).await?;
        self.cache.del(&keys.current).await?;
        Ok(())
    }

    async fn needs_rebuild(&self, keys: &QueueKeys) -> Result<bool, CacheError> {
        if self.cache.llen(&keys.waiting).await? > 0 {
            return Ok(false);
        }
        Ok(self.cache.get(&keys.current).await?.is_none())
    }

    /// Push WAITING tokens in sequence order and point at the SERVING one
    ///
    /// Outer result is the store, inner result is the cache.
    async fn rebuild(
        &self,
        queue_id: &str,
        keys: &QueueKeys,
    ) -> CoordinatorResult<Result<(), CacheError>> {
        let waiting = self.store.waiting_tokens(queue_id).await?;
        let serving = self.store.serving_token(queue_id).await?;

        if waiting.is_empty() && serving.is_none() {
            return Ok(Ok(()));
        }
        log::debug!(
            "Rehydrating queue {}: {} waiting, current {}",
            queue_id,
            waiting.len(),
            serving.as_ref().map_or("none", |t| t.token_number.as_str())
        );

        let pushed: Result<(), CacheError> = async {
            if let Some(token) = &serving {
                self.cache
                    .set(&keys.current, &token.id, SetOptions::default())
                    .await?;
            }
            for token in &waiting {
                self.cache.rpush(&keys.waiting, &token.id).await?;
            }
            Ok(())
        }
        .await;
        Ok(pushed)
    }

    /// Number of tokens waiting
    pub(crate) async fn waiting_count(&self, queue_id: &str) -> CoordinatorResult<usize> {
        if !self.is_degraded(queue_id) {
            let keys = QueueKeys::new(queue_id);
            match self.cache.llen(&keys.waiting).await {
                Ok(len) => return Ok(len),
                Err(e) => self.degrade(queue_id, "llen", &e),
            }
        }
        Ok(self.store.waiting_tokens(queue_id).await?.len())
    }

    /// The token being served, read fresh from the store
    ///
    /// A pointer naming a token that is no longer SERVING is dropped and
    /// replaced from the store.
    pub(crate) async fn current(&self, queue_id: &str) -> CoordinatorResult<Option<Token>> {
        if self.is_degraded(queue_id) {
            return Ok(self.store.serving_token(queue_id).await?);
        }

        let keys = QueueKeys::new(queue_id);
        let pointer = match self.cache.get(&keys.current).await {
            Ok(pointer) => pointer,
            Err(e) => {
                self.degrade(queue_id, "get", &e);
                return Ok(self.store.serving_token(queue_id).await?);
            }
        };

        let stale = match pointer {
            Some(token_id) => {
                if let Some(token) = self.store.find_token(&token_id).await? {
                    if token.status == TokenStatus::Serving {
                        return Ok(Some(token));
                    }
                }
                log::debug!(
                    "Dropping stale current pointer {} for queue {}",
                    token_id,
                    queue_id
                );
                true
            }
            None => false,
        };

        let serving = self.store.serving_token(queue_id).await?;
        match &serving {
            Some(token) => self.set_current(queue_id, &token.id).await,
            None if stale => self.clear_current(queue_id).await,
            None => {}
        }
        Ok(serving)
    }

    pub(crate) async fn push(&self, queue_id: &str, token_id: &str) {
        if self.is_degraded(queue_id) {
            return;
        }
        let keys = QueueKeys::new(queue_id);
        if let Err(e) = self.cache.rpush(&keys.waiting, token_id).await {
            self.degrade(queue_id, "rpush", &e);
        }
    }

    /// Remove and return the id at the head of the waiting order
    ///
    /// The id may be stale; the caller confirms it against the store.
    pub(crate) async fn pop_next(&self, queue_id: &str) -> CoordinatorResult<Option<String>> {
        if !self.is_degraded(queue_id) {
            let keys = QueueKeys::new(queue_id);
            match self.cache.lpop(&keys.waiting).await {
                Ok(popped) => return Ok(popped),
                Err(e) => self.degrade(queue_id, "lpop", &e),
            }
        }
        Ok(self
            .store
            .waiting_tokens(queue_id)
            .await?
            .into_iter()
            .next()
            .map(|t| t.id))
    }

    pub(crate) async fn set_current(&self, queue_id: &str, token_id: &str) {
        if self.is_degraded(queue_id) {
            return;
        }
        let keys = QueueKeys::new(queue_id);
        if let Err(e) = self
            .cache
            .set(&keys.current, token_id, SetOptions::default())
            .await
        {
            self.degrade(queue_id, "set", &e);
        }
    }

    pub(crate) async fn clear_current(&self, queue_id: &str) {
        if self.is_degraded(queue_id) {
            return;
        }
        let keys = QueueKeys::new(queue_id);
        if let Err(e) = self.cache.del(&keys.current).await {
            self.degrade(queue_id, "del", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::api::MemoryCache;
    use crate::store::api::{MemoryStore, NewLocation, NewQueue, NewToken};
    use chrono::Utc;

    async fn seeded_queue(store: &MemoryStore) -> String {
        let location = store
            .create_location(NewLocation {
                name: "Clinic".to_string(),
                address: "1 High St".to_string(),
                location_type: "Clinic".to_string(),
            })
            .await
            .unwrap();
        store
            .create_queue(NewQueue {
                location_id: location.id,
                public_id: "q_view".to_string(),
                name: "OPD".to_string(),
                token_prefix: "A".to_string(),
                doctor_id: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn admit(store: &MemoryStore, queue_id: &str, mobile: &str) -> Token {
        store
            .admit_token(NewToken {
                queue_id: queue_id.to_string(),
                mobile: mobile.to_string(),
                patient_name: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    async fn drain(cache: &MemoryCache, key: &str) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(id) = cache.lpop(key).await.unwrap() {
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let queue_id = seeded_queue(&store).await;

        let first = admit(&store, &queue_id, "1111111111").await;
        let second = admit(&store, &queue_id, "2222222222").await;
        let third = admit(&store, &queue_id, "3333333333").await;
        store
            .transition_token(&third.id, TokenStatus::Waiting, TokenStatus::Serving, Utc::now())
            .await
            .unwrap();

        let view = LiveView::new(store.clone(), cache.clone());
        for _ in 0..3 {
            view.ensure(&queue_id).await.unwrap();
        }

        let keys = QueueKeys::new(&queue_id);
        assert_eq!(
            cache.get(&keys.current).await.unwrap(),
            Some(third.id.clone())
        );
        assert_eq!(drain(&cache, &keys.waiting).await, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_current_without_waiting_is_not_rebuilt() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let queue_id = seeded_queue(&store).await;
        admit(&store, &queue_id, "1111111111").await;

        let keys = QueueKeys::new(&queue_id);
        cache
            .set(&keys.current, "tok_pointer", SetOptions::default())
            .await
            .unwrap();

        let view = LiveView::new(store.clone(), cache.clone());
        view.ensure(&queue_id).await.unwrap();

        // the WAITING token is not re-pushed behind an existing pointer
        assert_eq!(cache.llen(&keys.waiting).await.unwrap(), 0);
        assert_eq!(view.waiting_count(&queue_id).await.unwrap(), 0);
        assert_eq!(store.waiting_tokens(&queue_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_pointer_replaced_from_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let queue_id = seeded_queue(&store).await;
        let token = admit(&store, &queue_id, "1111111111").await;

        let keys = QueueKeys::new(&queue_id);
        cache
            .set(&keys.current, &token.id, SetOptions::default())
            .await
            .unwrap();

        let view = LiveView::new(store.clone(), cache.clone());
        assert_eq!(view.current(&queue_id).await.unwrap(), None);
        assert_eq!(cache.get(&keys.current).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_outage_falls_back_then_resets() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let queue_id = seeded_queue(&store).await;
        let view = LiveView::new(store.clone(), cache.clone());

        let first = admit(&store, &queue_id, "1111111111").await;
        view.ensure(&queue_id).await.unwrap();

        cache.set_available(false);
        let second = admit(&store, &queue_id, "2222222222").await;
        view.ensure(&queue_id).await.unwrap();
        view.push(&queue_id, &second.id).await;
        assert!(view.is_degraded(&queue_id));
        assert_eq!(view.waiting_count(&queue_id).await.unwrap(), 2);
        assert_eq!(
            view.pop_next(&queue_id).await.unwrap(),
            Some(first.id.clone())
        );

        cache.set_available(true);
        view.ensure(&queue_id).await.unwrap();
        assert!(!view.is_degraded(&queue_id));

        let keys = QueueKeys::new(&queue_id);
        assert_eq!(drain(&cache, &keys.waiting).await, vec![first.id, second.id]);
    }
}
