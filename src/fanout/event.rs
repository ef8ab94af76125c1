//! Event payloads broadcast to queue viewers

use crate::store::api::QueueStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminated payload; serialises as `{"event": "update", ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum QueueEvent {
    #[serde(rename_all = "camelCase")]
    Update {
        now_serving: Option<String>,
        waiting_count: usize,
    },
    Idle,
    Skipped,
    Closed {
        status: QueueStatus,
    },
    Open {
        status: QueueStatus,
    },
}

impl QueueEvent {
    /// The event announcing a queue's (possibly unchanged) status
    pub fn status_change(status: QueueStatus) -> Self {
        match status {
            QueueStatus::Open => QueueEvent::Open { status },
            QueueStatus::Closed => QueueEvent::Closed { status },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueueEvent::Update { .. } => "update",
            QueueEvent::Idle => "idle",
            QueueEvent::Skipped => "skipped",
            QueueEvent::Closed { .. } => "closed",
            QueueEvent::Open { .. } => "open",
        }
    }
}

/// An event as delivered on one queue's topic
///
/// `sequence` counts publishes on the topic, so a subscriber can spot gaps
/// and decide to resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUpdate {
    pub queue_id: String,
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: QueueEvent,
}
