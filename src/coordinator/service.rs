//! QueueCoordinator: the per-queue state machine
//!
//! Tokens move `WAITING -> SERVING -> {SERVED | SKIPPED}`. Every operation
//! that reads or changes the live view holds the queue's lock from the first
//! view read until its event has been published, so events on one queue are
//! published in the order the state changed.

use crate::cache::api::{FastPathCache, QueueKeys, SetOptions};
use crate::coordinator::config::CoordinatorConfig;
use crate::coordinator::error::{CoordinatorError, CoordinatorResult};
use crate::coordinator::live_view::LiveView;
use crate::coordinator::locks::QueueLocks;
use crate::coordinator::public_id::PublicIdGenerator;
use crate::coordinator::types::{
    AdmitReceipt, CallNextOutcome, EnrollReceipt, EnrollRequest, QueueBrief, QueueSnapshot,
    QueueSummary, TokenLookup, TokenSummary,
};
use crate::core::time::Clock;
use crate::core::validation::{require_field, validate_mobile, validate_token_prefix};
use crate::dispatch::api::{DispatchHandle, NotificationRequest};
use crate::estimator::WaitTimeEstimator;
use crate::fanout::api::{FanoutTransport, QueueEvent, Subscription};
use crate::store::api::{
    DurableStore, Location, NewDoctor, NewEnrollment, NewLocation, NewQueue, NewToken, Queue,
    QueueStatus, StoreError, StoreResult, Token, TokenStatus,
};
use std::future::Future;
use std::sync::Arc;

/// Attempts at finding an unused public id before giving up
const PUBLIC_ID_ATTEMPTS: usize = 5;

/// Collaborators injected into the coordinator
pub struct CoordinatorContext {
    pub store: Arc<dyn DurableStore>,
    pub cache: Arc<dyn FastPathCache>,
    pub fanout: Arc<dyn FanoutTransport>,
    pub dispatcher: DispatchHandle,
    pub clock: Arc<dyn Clock>,
}

pub struct QueueCoordinator {
    store: Arc<dyn DurableStore>,
    cache: Arc<dyn FastPathCache>,
    fanout: Arc<dyn FanoutTransport>,
    dispatcher: DispatchHandle,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    view: LiveView,
    locks: QueueLocks,
    estimator: WaitTimeEstimator,
    public_ids: PublicIdGenerator,
}

impl QueueCoordinator {
    pub fn new(context: CoordinatorContext, config: CoordinatorConfig) -> Self {
        let CoordinatorContext {
            store,
            cache,
            fanout,
            dispatcher,
            clock,
        } = context;

        Self {
            view: LiveView::new(store.clone(), cache.clone()),
            locks: QueueLocks::new(),
            estimator: WaitTimeEstimator::new(store.clone(), config.estimator_settings()),
            public_ids: PublicIdGenerator::new(clock.clone()),
            store,
            cache,
            fanout,
            dispatcher,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// True while the queue is being served from the store alone
    pub fn is_cache_degraded(&self, queue_id: &str) -> bool {
        self.view.is_degraded(queue_id)
    }

    async fn require_queue(&self, queue_id: &str) -> CoordinatorResult<Queue> {
        self.store
            .find_queue(queue_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Queue"))
    }

    async fn require_public_queue(&self, public_id: &str) -> CoordinatorResult<Queue> {
        self.store
            .find_queue_by_public_id(public_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Queue"))
    }

    /// Look a queue up by internal id or public id
    pub async fn resolve_queue(&self, key: &str) -> CoordinatorResult<Queue> {
        if let Some(queue) = self.store.find_queue(key).await? {
            return Ok(queue);
        }
        self.require_public_queue(key).await
    }

    fn publish(&self, queue_id: &str, event: QueueEvent) {
        let kind = event.kind();
        if let Err(e) = self.fanout.publish(queue_id, event) {
            log::warn!(
                "Could not publish {} event for queue {}: {}",
                kind,
                queue_id,
                e
            );
        }
    }

    /// Give a patient the next token in a queue
    pub async fn admit(
        &self,
        queue_id: &str,
        mobile: &str,
        patient_name: Option<&str>,
    ) -> CoordinatorResult<AdmitReceipt> {
        let mobile = validate_mobile(mobile)?;
        let patient_name = patient_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let queue = self.require_queue(queue_id).await?;
        if !queue.is_open() {
            return Err(CoordinatorError::invalid_state("Queue is closed"));
        }
        if let Some(existing) = self.store.find_active_token(queue_id, &mobile).await? {
            return Err(CoordinatorError::conflict(existing.token_number));
        }
        let dedupe_key = QueueKeys::new(queue_id).dedupe(&mobile);
        self.claim_admission_slot(queue_id, &dedupe_key).await?;

        let committed = async {
            let guard = self.locks.acquire(queue_id).await?;
            self.view.ensure(queue_id).await?;
            let token = self
                .store
                .admit_token(NewToken {
                    queue_id: queue_id.to_string(),
                    mobile,
                    patient_name,
                    created_at: self.clock.now(),
                })
                .await?;
            Ok::<_, CoordinatorError>((guard, token))
        }
        .await;
        let (_guard, token) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                // nothing was admitted, so the patient may retry at once
                if let Err(del_err) = self.cache.del(&dedupe_key).await {
                    log::debug!("Could not clear cooldown {}: {}", dedupe_key, del_err);
                }
                return Err(e);
            }
        };
        self.view.push(queue_id, &token.id).await;

        let waiting_count = self.view.waiting_count(queue_id).await?;
        let now_serving = self.view.current(queue_id).await?.map(|t| t.token_number);
        log::info!(
            "Admitted {} to queue {} ({} waiting)",
            token.token_number,
            queue.name,
            waiting_count
        );
        self.publish(
            queue_id,
            QueueEvent::Update {
                now_serving,
                waiting_count,
            },
        );

        Ok(AdmitReceipt {
            token_number: token.token_number,
            token_id: token.id,
            waiting_count,
        })
    }

    /// Atomic cooldown marker for `(queue, mobile)`
    ///
    /// Cleared again if the admission does not commit. Without a cache the store's active-token check is the only guard.
    async fn claim_admission_slot(&self, queue_id: &str, key: &str) -> CoordinatorResult<()> {
        match self
            .cache
            .set(key, "1", SetOptions::nx_ex(self.config.dedupe_window))
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::debug!("Admission cooldown hit on {}", key);
                Err(CoordinatorError::rate_limited(
                    self.config.dedupe_window_secs(),
                ))
            }
            Err(e) => {
                log::warn!(
                    "Admission cooldown unavailable for queue {}, relying on store: {}",
                    queue_id,
                    e
                );
                Ok(())
            }
        }
    }

    /// Finish the current token and call the lowest waiting sequence
    pub async fn call_next(&self, queue_id: &str) -> CoordinatorResult<CallNextOutcome> {
        let _guard = self.locks.acquire(queue_id).await?;
        let queue = self.require_queue(queue_id).await?;
        if !queue.is_open() {
            return Err(CoordinatorError::invalid_state("Queue is closed"));
        }
        self.view.ensure(queue_id).await?;

        let now = self.clock.now();
        if let Some(current) = self.view.current(queue_id).await? {
            match self
                .store
                .transition_token(&current.id, TokenStatus::Serving, TokenStatus::Served, now)
                .await
            {
                Ok(served) => log::info!("Served {} on queue {}", served.token_number, queue.name),
                Err(StoreError::StatusMismatch { .. }) => {
                    log::debug!("Token {} already left SERVING", current.token_number)
                }
                Err(e) => return Err(e.into()),
            }
        }

        let Some(next) = self.claim_next(queue_id, now).await? else {
            self.view.clear_current(queue_id).await;
            log::info!("Queue {} is idle", queue.name);
            self.publish(queue_id, QueueEvent::Idle);
            return Ok(CallNextOutcome {
                current: None,
                waiting_count: 0,
            });
        };

        self.view.set_current(queue_id, &next.id).await;
        let waiting_count = self.view.waiting_count(queue_id).await?;
        log::info!(
            "Now serving {} on queue {} ({} waiting)",
            next.token_number,
            queue.name,
            waiting_count
        );

        self.hand_off_notification(&queue, &next).await;
        self.publish(
            queue_id,
            QueueEvent::Update {
                now_serving: Some(next.token_number.clone()),
                waiting_count,
            },
        );

        Ok(CallNextOutcome {
            current: Some(next.token_number),
            waiting_count,
        })
    }

    /// Pop ids until one moves WAITING -> SERVING in the store
    ///
    /// Ids whose token is gone or no longer WAITING are stale cache entries
    /// and are discarded.
    async fn claim_next(
        &self,
        queue_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> CoordinatorResult<Option<Token>> {
        while let Some(token_id) = self.view.pop_next(queue_id).await? {
            match self
                .store
                .transition_token(&token_id, TokenStatus::Waiting, TokenStatus::Serving, now)
                .await
            {
                Ok(token) => return Ok(Some(token)),
                Err(StoreError::StatusMismatch { .. }) | Err(StoreError::TokenNotFound { .. }) => {
                    log::debug!("Discarding stale waiting entry {} on queue {}", token_id, queue_id);
                }
                Err(e) => {
                    // the popped id is out of the cache but still WAITING
                    self.view.invalidate(queue_id);
                    return Err(e.into());
                }
            }
        }
        Ok(None)
    }

    async fn hand_off_notification(&self, queue: &Queue, token: &Token) {
        if token.mobile.is_empty() {
            return;
        }
        let location_name = match self.store.find_location(&queue.location_id).await {
            Ok(location) => location.map(|l| l.name).unwrap_or_default(),
            Err(e) => {
                log::debug!("Location lookup for notification failed: {}", e);
                String::new()
            }
        };

        let request = NotificationRequest {
            mobile: token.mobile.clone(),
            token_number: token.token_number.clone(),
            queue_name: queue.name.clone(),
            location_name,
        };
        if let Err(e) = self.dispatcher.dispatch(request) {
            log::warn!(
                "Notification for token {} not queued: {}",
                token.token_number,
                e
            );
        }
    }

    /// Mark the current token SKIPPED; returns its token number
    pub async fn skip(&self, queue_id: &str) -> CoordinatorResult<String> {
        let _guard = self.locks.acquire(queue_id).await?;
        let queue = self.require_queue(queue_id).await?;
        self.view.ensure(queue_id).await?;

        let Some(current) = self.view.current(queue_id).await? else {
            return Err(CoordinatorError::invalid_state(
                "No token is currently being served",
            ));
        };

        match self
            .store
            .transition_token(
                &current.id,
                TokenStatus::Serving,
                TokenStatus::Skipped,
                self.clock.now(),
            )
            .await
        {
            Ok(_) => {}
            Err(StoreError::StatusMismatch { .. }) => {
                return Err(CoordinatorError::invalid_state(
                    "No token is currently being served",
                ))
            }
            Err(e) => return Err(e.into()),
        }

        self.view.clear_current(queue_id).await;
        log::info!("Skipped {} on queue {}", current.token_number, queue.name);
        self.publish(queue_id, QueueEvent::Skipped);
        Ok(current.token_number)
    }

    /// Open or close a queue; repeating the current status republishes it
    pub async fn set_status(
        &self,
        queue_id: &str,
        status: QueueStatus,
    ) -> CoordinatorResult<QueueStatus> {
        let _guard = self.locks.acquire(queue_id).await?;
        let queue = self.store.set_queue_status(queue_id, status).await?;
        log::info!("Queue {} is now {}", queue.name, queue.status);
        self.publish(queue_id, QueueEvent::status_change(queue.status));
        Ok(queue.status)
    }

    async fn live_state(&self, queue_id: &str) -> CoordinatorResult<(Option<String>, usize)> {
        let _guard = self.locks.acquire(queue_id).await?;
        self.view.ensure(queue_id).await?;
        let now_serving = self.view.current(queue_id).await?.map(|t| t.token_number);
        let waiting_count = self.view.waiting_count(queue_id).await?;
        Ok((now_serving, waiting_count))
    }

    async fn location_of(&self, queue: &Queue) -> CoordinatorResult<Option<Location>> {
        Ok(self.store.find_location(&queue.location_id).await?)
    }

    /// Everything a viewer needs to render the queue
    pub async fn snapshot(&self, public_id: &str) -> CoordinatorResult<QueueSnapshot> {
        let queue = self.require_public_queue(public_id).await?;
        let location = self.location_of(&queue).await?;
        let (now_serving, waiting_count) = self.live_state(&queue.id).await?;
        let estimated_wait_minutes = self.estimator.estimate(&queue.id, waiting_count).await?;

        Ok(QueueSnapshot {
            queue: QueueSummary {
                id: queue.id,
                name: queue.name,
                public_id: queue.public_id,
                token_prefix: queue.token_prefix,
                status: queue.status,
                location,
            },
            now_serving,
            waiting_count,
            estimated_wait_minutes,
        })
    }

    /// A patient's most recent token in a queue
    pub async fn lookup_token(&self, public_id: &str, mobile: &str) -> CoordinatorResult<TokenLookup> {
        let mobile = validate_mobile(mobile)?;
        let queue = self.require_public_queue(public_id).await?;
        let token = self
            .store
            .latest_token_for_mobile(
                &queue.id,
                &mobile,
                &[TokenStatus::Waiting, TokenStatus::Serving, TokenStatus::Served],
            )
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Token"))?;

        let location = self.location_of(&queue).await?;
        let (now_serving, waiting_count) = self.live_state(&queue.id).await?;

        Ok(TokenLookup {
            token: TokenSummary {
                token_number: token.token_number,
                status: token.status,
                patient_name: token.patient_name,
                created_at: token.created_at,
            },
            queue: QueueBrief {
                name: queue.name,
                location,
            },
            now_serving,
            waiting_count,
        })
    }

    /// Attach a viewer to a queue's events
    pub async fn subscribe(&self, queue_id: &str, source: &str) -> CoordinatorResult<Subscription> {
        self.require_queue(queue_id).await?;
        Ok(self.fanout.subscribe(queue_id, source)?)
    }

    /// Retry `create` with fresh public ids while the store reports a clash
    async fn with_public_id<T, F, Fut>(&self, seed: &str, mut create: F) -> CoordinatorResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        for attempt in 1..=PUBLIC_ID_ATTEMPTS {
            let public_id = self.public_ids.generate(seed);
            match create(public_id.clone()).await {
                Ok(created) => return Ok(created),
                Err(StoreError::UniqueViolation { .. }) => {
                    log::debug!(
                        "Public id {} already taken (attempt {}/{})",
                        public_id,
                        attempt,
                        PUBLIC_ID_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoordinatorError::internal(
            "could not allocate a unique public id",
        ))
    }

    /// Create a location, its doctor and an open queue in one transaction
    pub async fn enroll(&self, request: EnrollRequest) -> CoordinatorResult<EnrollReceipt> {
        let doctor = NewDoctor {
            name: require_field("doctorName", &request.doctor_name)?,
            email: optional_field(request.doctor_email.as_deref()),
            mobile: match optional_field(request.doctor_mobile.as_deref()) {
                Some(mobile) => Some(validate_mobile(&mobile)?),
                None => None,
            },
        };
        let location = NewLocation {
            name: require_field("locationName", &request.location_name)?,
            address: require_field("locationAddress", &request.location_address)?,
            location_type: require_field("locationType", &request.location_type)?,
        };
        let queue_name = require_field("queueName", &request.queue_name)?;
        let token_prefix = validate_token_prefix(&request.token_prefix)?;

        let store = self.store.clone();
        let enrollment = self
            .with_public_id(&queue_name, |public_id| {
                let store = store.clone();
                let enrollment = NewEnrollment {
                    location: location.clone(),
                    doctor: doctor.clone(),
                    queue_name: queue_name.clone(),
                    token_prefix: token_prefix.clone(),
                    public_id,
                };
                async move { store.enroll(enrollment).await }
            })
            .await?;

        log::info!(
            "Enrolled {} at {} with queue {} ({})",
            enrollment.doctor.name,
            enrollment.location.name,
            enrollment.queue.name,
            enrollment.queue.public_id
        );
        Ok(EnrollReceipt {
            doctor_id: enrollment.doctor.id,
            queue_id: enrollment.queue.id,
            qr_url: self.config.qr_url(&enrollment.queue.public_id),
            public_id: enrollment.queue.public_id,
        })
    }

    pub async fn create_location(
        &self,
        name: &str,
        address: &str,
        location_type: &str,
    ) -> CoordinatorResult<Location> {
        let location = NewLocation {
            name: require_field("name", name)?,
            address: require_field("address", address)?,
            location_type: require_field("type", location_type)?,
        };
        Ok(self.store.create_location(location).await?)
    }

    /// Add an open queue to an existing location
    pub async fn create_queue(
        &self,
        location_id: &str,
        name: &str,
        token_prefix: &str,
        doctor_id: Option<&str>,
    ) -> CoordinatorResult<Queue> {
        let name = require_field("name", name)?;
        let token_prefix = validate_token_prefix(token_prefix)?;
        let doctor_id = doctor_id.map(str::to_string);

        let store = self.store.clone();
        let queue = self
            .with_public_id(&name, |public_id| {
                let store = store.clone();
                let queue = NewQueue {
                    location_id: location_id.to_string(),
                    public_id,
                    name: name.clone(),
                    token_prefix: token_prefix.clone(),
                    doctor_id: doctor_id.clone(),
                };
                async move { store.create_queue(queue).await }
            })
            .await?;
        log::info!("Created queue {} ({})", queue.name, queue.public_id);
        Ok(queue)
    }
}

fn optional_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
