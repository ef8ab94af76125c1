//! Public API for the durable store

pub use crate::store::error::{StoreError, StoreResult};
pub use crate::store::memory::MemoryStore;
pub use crate::store::model::{
    format_token_number, Doctor, Enrollment, Location, NewDoctor, NewEnrollment, NewLocation,
    NewQueue, NewToken, Queue, QueueStatus, Token, TokenStatus, TOKEN_SEQUENCE_WIDTH,
};
pub use crate::store::traits::DurableStore;
