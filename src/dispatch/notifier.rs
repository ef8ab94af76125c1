//! Outbound notifier collaborators

use crate::dispatch::error::{DispatchError, DispatchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body sent to the external notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub mobile: String,
    pub token_number: String,
    pub queue_name: String,
    pub location_name: String,
}

/// Text the patient receives when their token is called
pub fn ready_message(request: &NotificationRequest) -> String {
    format!(
        "Your token #{} is ready at {} ({}). Please proceed to the counter.",
        request.token_number, request.queue_name, request.location_name
    )
}

/// External messaging collaborator; treated as opaque and unreliable
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, request: &NotificationRequest) -> DispatchResult<()>;

    fn name(&self) -> &str;
}

/// Posts requests as JSON to `{base_url}/notify`
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/notify", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, request: &NotificationRequest) -> DispatchResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Writes the message to the log instead of sending it
///
/// Used when no notifier URL is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, request: &NotificationRequest) -> DispatchResult<()> {
        log::info!("SMS to {}: {}", request.mobile, ready_message(request));
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
