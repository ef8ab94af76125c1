//! Shareable queue identifiers

use crate::core::time::Clock;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const PUBLIC_ID_PREFIX: &str = "q_";
const PUBLIC_ID_HEX_LEN: usize = 8;

/// Opaque `q_xxxxxxxx` ids for join links
///
/// The hash input mixes a caller seed with the clock and a process-wide
/// counter, so repeated calls with the same seed still differ. Collisions
/// are possible and are caught by the store's uniqueness check.
pub(crate) struct PublicIdGenerator {
    clock: Arc<dyn Clock>,
    nonce: AtomicU64,
}

impl PublicIdGenerator {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            nonce: AtomicU64::new(0),
        }
    }

    pub(crate) fn generate(&self, seed: &str) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let nanos = self.clock.now().timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        let hash_hex = format!("{:x}", hasher.finalize());

        format!("{}{}", PUBLIC_ID_PREFIX, &hash_hex[..PUBLIC_ID_HEX_LEN])
    }
}
