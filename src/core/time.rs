//! Clock abstraction for testable time-dependent logic
//!
//! Wall-clock time stamps tokens (`created_at`, `served_at`); monotonic time
//! drives cache key expiry.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of current time for the coordinator and its collaborators
pub trait Clock: Send + Sync {
    /// Wall-clock time used for persisted timestamps
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time used for measuring intervals and expiry
    fn instant(&self) -> Instant;
}

/// Production clock
#[derive(Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Both the wall-clock and the monotonic reading move together.
#[derive(Clone)]
pub struct MockClock {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    base_instant: Instant,
    base_time: DateTime<Utc>,
    offset: Duration,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(base_time: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                base_instant: Instant::now(),
                base_time,
                offset: Duration::ZERO,
            })),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.offset += duration;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().map(|s| s.offset).unwrap_or_default()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        match self.state.lock() {
            Ok(state) => {
                state.base_time
                    + chrono::Duration::from_std(state.offset).unwrap_or(chrono::Duration::zero())
            }
            Err(_) => Utc::now(),
        }
    }

    fn instant(&self) -> Instant {
        match self.state.lock() {
            Ok(state) => state.base_instant + state.offset,
            Err(_) => Instant::now(),
        }
    }
}
