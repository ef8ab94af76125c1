//! In-process system of record
//!
//! All state lives behind one `tokio::sync::Mutex`, so each trait method is
//! a serializable transaction. Multi-row writes validate everything first and
//! only then apply, so a failure never leaves a partial write behind.

use crate::store::error::{StoreError, StoreResult};
use crate::store::model::{
    format_token_number, Doctor, Enrollment, Location, NewEnrollment, NewLocation, NewQueue,
    NewToken, Queue, QueueStatus, Token, TokenStatus,
};
use crate::store::traits::DurableStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct StoreState {
    next_id: u64,
    locations: HashMap<String, Location>,
    doctors: HashMap<String, Doctor>,
    queues: HashMap<String, Queue>,
    tokens: HashMap<String, Token>,
}

impl StoreState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{:06}", prefix, self.next_id)
    }

    fn check_public_id_free(&self, public_id: &str) -> StoreResult<()> {
        if self.queues.values().any(|q| q.public_id == public_id) {
            return Err(StoreError::UniqueViolation {
                field: "publicId".to_string(),
                value: public_id.to_string(),
            });
        }
        Ok(())
    }

    fn active_token(&self, queue_id: &str, mobile: &str) -> Option<&Token> {
        self.tokens
            .values()
            .find(|t| t.queue_id == queue_id && t.mobile == mobile && t.status.is_active())
    }
}

pub struct MemoryStore {
    state: Mutex<StoreState>,
    #[cfg(test)]
    insert_fault: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            #[cfg(test)]
            insert_fault: AtomicBool::new(false),
        }
    }

    /// Make the next token inserts fail after the sequence has been computed
    #[cfg(test)]
    pub(crate) fn inject_insert_fault(&self, enabled: bool) {
        self.insert_fault.store(enabled, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn insert_fault_active(&self) -> bool {
        self.insert_fault.load(Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn insert_fault_active(&self) -> bool {
        false
    }

    /// Number of tokens ever created in a queue
    pub async fn token_count(&self, queue_id: &str) -> usize {
        let state = self.state.lock().await;
        state.tokens.values().filter(|t| t.queue_id == queue_id).count()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn enroll(&self, enrollment: NewEnrollment) -> StoreResult<Enrollment> {
        let mut state = self.state.lock().await;
        state.check_public_id_free(&enrollment.public_id)?;

        let location = Location {
            id: state.allocate_id("loc"),
            name: enrollment.location.name,
            address: enrollment.location.address,
            location_type: enrollment.location.location_type,
        };
        let doctor = Doctor {
            id: state.allocate_id("doc"),
            name: enrollment.doctor.name,
            email: enrollment.doctor.email,
            mobile: enrollment.doctor.mobile,
        };
        let queue = Queue {
            id: state.allocate_id("que"),
            public_id: enrollment.public_id,
            name: enrollment.queue_name,
            token_prefix: enrollment.token_prefix,
            current_sequence: 0,
            status: QueueStatus::Open,
            location_id: location.id.clone(),
            doctor_id: Some(doctor.id.clone()),
        };

        state.locations.insert(location.id.clone(), location.clone());
        state.doctors.insert(doctor.id.clone(), doctor.clone());
        state.queues.insert(queue.id.clone(), queue.clone());

        Ok(Enrollment {
            location,
            doctor,
            queue,
        })
    }

    async fn create_location(&self, location: NewLocation) -> StoreResult<Location> {
        let mut state = self.state.lock().await;
        let location = Location {
            id: state.allocate_id("loc"),
            name: location.name,
            address: location.address,
            location_type: location.location_type,
        };
        state.locations.insert(location.id.clone(), location.clone());
        Ok(location)
    }

    async fn create_queue(&self, queue: NewQueue) -> StoreResult<Queue> {
        let mut state = self.state.lock().await;
        if !state.locations.contains_key(&queue.location_id) {
            return Err(StoreError::LocationNotFound {
                location_id: queue.location_id,
            });
        }
        state.check_public_id_free(&queue.public_id)?;

        let queue = Queue {
            id: state.allocate_id("que"),
            public_id: queue.public_id,
            name: queue.name,
            token_prefix: queue.token_prefix,
            current_sequence: 0,
            status: QueueStatus::Open,
            location_id: queue.location_id,
            doctor_id: queue.doctor_id,
        };
        state.queues.insert(queue.id.clone(), queue.clone());
        Ok(queue)
    }

    async fn find_queue(&self, queue_id: &str) -> StoreResult<Option<Queue>> {
        let state = self.state.lock().await;
        Ok(state.queues.get(queue_id).cloned())
    }

    async fn find_queue_by_public_id(&self, public_id: &str) -> StoreResult<Option<Queue>> {
        let state = self.state.lock().await;
        Ok(state
            .queues
            .values()
            .find(|q| q.public_id == public_id)
            .cloned())
    }

    async fn find_location(&self, location_id: &str) -> StoreResult<Option<Location>> {
        let state = self.state.lock().await;
        Ok(state.locations.get(location_id).cloned())
    }

    async fn set_queue_status(&self, queue_id: &str, status: QueueStatus) -> StoreResult<Queue> {
        let mut state = self.state.lock().await;
        let queue = state
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| StoreError::QueueNotFound {
                queue_id: queue_id.to_string(),
            })?;
        queue.status = status;
        Ok(queue.clone())
    }

    async fn admit_token(&self, token: NewToken) -> StoreResult<Token> {
        let mut state = self.state.lock().await;

        let queue = state
            .queues
            .get(&token.queue_id)
            .ok_or_else(|| StoreError::QueueNotFound {
                queue_id: token.queue_id.clone(),
            })?;
        if !queue.is_open() {
            return Err(StoreError::QueueClosed {
                queue_id: token.queue_id,
            });
        }
        if let Some(existing) = state.active_token(&token.queue_id, &token.mobile) {
            return Err(StoreError::DuplicateActiveToken {
                token_number: existing.token_number.clone(),
            });
        }

        let sequence = queue.current_sequence + 1;
        let token_number = format_token_number(&queue.token_prefix, sequence);

        if self.insert_fault_active() {
            return Err(StoreError::TransactionAborted(
                "token insert failed".to_string(),
            ));
        }

        // Validation is complete; apply both writes.
        let token = Token {
            id: state.allocate_id("tok"),
            queue_id: token.queue_id,
            token_number,
            sequence,
            patient_name: token.patient_name,
            mobile: token.mobile,
            status: TokenStatus::Waiting,
            created_at: token.created_at,
            served_at: None,
        };
        if let Some(queue) = state.queues.get_mut(&token.queue_id) {
            queue.current_sequence = sequence;
        }
        state.tokens.insert(token.id.clone(), token.clone());

        Ok(token)
    }

    async fn find_token(&self, token_id: &str) -> StoreResult<Option<Token>> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(token_id).cloned())
    }

    async fn find_active_token(&self, queue_id: &str, mobile: &str) -> StoreResult<Option<Token>> {
        let state = self.state.lock().await;
        Ok(state.active_token(queue_id, mobile).cloned())
    }

    async fn latest_token_for_mobile(
        &self,
        queue_id: &str,
        mobile: &str,
        statuses: &[TokenStatus],
    ) -> StoreResult<Option<Token>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .filter(|t| t.queue_id == queue_id && t.mobile == mobile && statuses.contains(&t.status))
            .max_by_key(|t| (t.created_at, t.sequence))
            .cloned())
    }

    async fn transition_token(
        &self,
        token_id: &str,
        from: TokenStatus,
        to: TokenStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Token> {
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        let mut state = self.state.lock().await;
        let token = state
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| StoreError::TokenNotFound {
                token_id: token_id.to_string(),
            })?;
        if token.status != from {
            return Err(StoreError::StatusMismatch {
                token_id: token_id.to_string(),
                expected: from,
                actual: token.status,
            });
        }

        token.status = to;
        if to == TokenStatus::Served {
            token.served_at = Some(at);
        }
        Ok(token.clone())
    }

    async fn waiting_tokens(&self, queue_id: &str) -> StoreResult<Vec<Token>> {
        let state = self.state.lock().await;
        let mut waiting: Vec<Token> = state
            .tokens
            .values()
            .filter(|t| t.queue_id == queue_id && t.status == TokenStatus::Waiting)
            .cloned()
            .collect();
        waiting.sort_by_key(|t| t.sequence);
        Ok(waiting)
    }

    async fn serving_token(&self, queue_id: &str) -> StoreResult<Option<Token>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .filter(|t| t.queue_id == queue_id && t.status == TokenStatus::Serving)
            .max_by_key(|t| t.sequence)
            .cloned())
    }

    async fn recent_served(&self, queue_id: &str, limit: usize) -> StoreResult<Vec<Token>> {
        let state = self.state.lock().await;
        let mut served: Vec<Token> = state
            .tokens
            .values()
            .filter(|t| {
                t.queue_id == queue_id && t.status == TokenStatus::Served && t.served_at.is_some()
            })
            .cloned()
            .collect();
        served.sort_by(|a, b| b.served_at.cmp(&a.served_at));
        served.truncate(limit);
        Ok(served)
    }
}
