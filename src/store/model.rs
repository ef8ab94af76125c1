//! Entities held by the system of record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Width of the zero-padded sequence in a display token number
pub const TOKEN_SEQUENCE_WIDTH: usize = 3;

/// Build the display form of a token, e.g. `A-007`
///
/// Sequences wider than [`TOKEN_SEQUENCE_WIDTH`] are printed in full.
pub fn format_token_number(prefix: &str, sequence: u64) -> String {
    format!(
        "{}-{:0width$}",
        prefix,
        sequence,
        width = TOKEN_SEQUENCE_WIDTH
    )
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum QueueStatus {
    Open,
    Closed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TokenStatus {
    Waiting,
    Serving,
    Served,
    Skipped,
}

impl TokenStatus {
    /// Waiting and serving tokens block a second admission for the same mobile
    pub fn is_active(self) -> bool {
        matches!(self, TokenStatus::Waiting | TokenStatus::Serving)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TokenStatus::Served | TokenStatus::Skipped)
    }

    /// `WAITING -> SERVING -> {SERVED | SKIPPED}`
    pub fn can_transition_to(self, next: TokenStatus) -> bool {
        matches!(
            (self, next),
            (TokenStatus::Waiting, TokenStatus::Serving)
                | (TokenStatus::Serving, TokenStatus::Served)
                | (TokenStatus::Serving, TokenStatus::Skipped)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub location_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    pub id: String,
    pub public_id: String,
    pub name: String,
    pub token_prefix: String,
    /// Last sequence handed out; 0 before the first admission
    pub current_sequence: u64,
    pub status: QueueStatus,
    pub location_id: String,
    pub doctor_id: Option<String>,
}

impl Queue {
    pub fn is_open(&self) -> bool {
        self.status == QueueStatus::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub queue_id: String,
    pub token_number: String,
    pub sequence: u64,
    pub patient_name: Option<String>,
    pub mobile: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    /// Set only on the transition to SERVED
    pub served_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Minutes between admission and completion, if served
    pub fn service_minutes(&self) -> Option<f64> {
        self.served_at
            .map(|served| (served - self.created_at).num_milliseconds() as f64 / 60_000.0)
    }
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub name: String,
    pub address: String,
    pub location_type: String,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewQueue {
    pub location_id: String,
    pub public_id: String,
    pub name: String,
    pub token_prefix: String,
    pub doctor_id: Option<String>,
}

/// Everything the enrollment transaction creates at once
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub location: NewLocation,
    pub doctor: NewDoctor,
    pub queue_name: String,
    pub token_prefix: String,
    pub public_id: String,
}

#[derive(Debug, Clone)]
pub struct Enrollment {
    pub location: Location,
    pub doctor: Doctor,
    pub queue: Queue,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub queue_id: String,
    pub mobile: String,
    pub patient_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
