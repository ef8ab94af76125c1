//! Request and result shapes exposed by the coordinator

use crate::store::api::{Location, QueueStatus, TokenStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitReceipt {
    pub token_number: String,
    pub token_id: String,
    pub waiting_count: usize,
}

/// Result of calling the next token; `current` is `None` when the queue went idle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNextOutcome {
    pub current: Option<String>,
    pub waiting_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub id: String,
    pub name: String,
    pub public_id: String,
    pub token_prefix: String,
    pub status: QueueStatus,
    pub location: Option<Location>,
}

/// Full state a viewer needs to render a queue or resync after a gap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub queue: QueueSummary,
    pub now_serving: Option<String>,
    pub waiting_count: usize,
    pub estimated_wait_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub token_number: String,
    pub status: TokenStatus,
    pub patient_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBrief {
    pub name: String,
    pub location: Option<Location>,
}

/// A patient's own token, as shown on the status page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLookup {
    pub token: TokenSummary,
    pub queue: QueueBrief,
    pub now_serving: Option<String>,
    pub waiting_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollRequest {
    pub doctor_name: String,
    pub doctor_email: Option<String>,
    pub doctor_mobile: Option<String>,
    pub location_name: String,
    pub location_address: String,
    pub location_type: String,
    pub queue_name: String,
    pub token_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollReceipt {
    pub doctor_id: String,
    pub queue_id: String,
    pub public_id: String,
    pub qr_url: String,
}
