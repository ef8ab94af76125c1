//! Durable store contract
//!
//! Every method is one transaction against the system of record. Methods
//! that write more than one row (`enroll`, `admit_token`) must commit all of
//! their writes or none of them.

use crate::store::error::StoreResult;
use crate::store::model::{
    Enrollment, Location, NewEnrollment, NewLocation, NewQueue, NewToken, Queue, QueueStatus,
    Token, TokenStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Create a location, doctor and open queue together
    async fn enroll(&self, enrollment: NewEnrollment) -> StoreResult<Enrollment>;

    async fn create_location(&self, location: NewLocation) -> StoreResult<Location>;

    /// Create an open queue with `current_sequence = 0`
    async fn create_queue(&self, queue: NewQueue) -> StoreResult<Queue>;

    async fn find_queue(&self, queue_id: &str) -> StoreResult<Option<Queue>>;

    async fn find_queue_by_public_id(&self, public_id: &str) -> StoreResult<Option<Queue>>;

    async fn find_location(&self, location_id: &str) -> StoreResult<Option<Location>>;

    /// Read-modify-write of the queue status; setting the current value is allowed
    async fn set_queue_status(&self, queue_id: &str, status: QueueStatus) -> StoreResult<Queue>;

    /// Increment the queue sequence and insert the token in one transaction
    ///
    /// Fails with `QueueClosed` or `DuplicateActiveToken` when the
    /// preconditions no longer hold at commit time.
    async fn admit_token(&self, token: NewToken) -> StoreResult<Token>;

    async fn find_token(&self, token_id: &str) -> StoreResult<Option<Token>>;

    /// The WAITING or SERVING token for this mobile, if any
    async fn find_active_token(&self, queue_id: &str, mobile: &str) -> StoreResult<Option<Token>>;

    /// Most recently created token for this mobile whose status is in `statuses`
    async fn latest_token_for_mobile(
        &self,
        queue_id: &str,
        mobile: &str,
        statuses: &[TokenStatus],
    ) -> StoreResult<Option<Token>>;

    /// Conditionally move a token from `from` to `to`
    ///
    /// Fails with `StatusMismatch` if the stored status is not `from`.
    /// `served_at` is stamped with `at` only when `to` is SERVED.
    async fn transition_token(
        &self,
        token_id: &str,
        from: TokenStatus,
        to: TokenStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Token>;

    /// WAITING tokens ordered by sequence ascending
    async fn waiting_tokens(&self, queue_id: &str) -> StoreResult<Vec<Token>>;

    /// The SERVING token with the highest sequence, if any
    async fn serving_token(&self, queue_id: &str) -> StoreResult<Option<Token>>;

    /// Up to `limit` SERVED tokens with a `served_at`, newest first
    async fn recent_served(&self, queue_id: &str, limit: usize) -> StoreResult<Vec<Token>>;
}
