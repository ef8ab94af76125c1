//! Coordinator tuning

use crate::dispatch::api::DispatchSettings;
use crate::estimator::{EstimatorSettings, DEFAULT_HISTORY_SAMPLE, DEFAULT_MINUTES_PER_PERSON};
use crate::fanout::api::DEFAULT_HIGH_WATER_MARK;
use std::time::Duration;

/// Cooldown between two admissions for the same mobile
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(10);
pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub dedupe_window: Duration,
    pub history_sample: usize,
    pub default_minutes_per_person: u32,
    /// Undelivered events a subscriber may hold before it is detached
    pub fanout_capacity: usize,
    pub notifier_timeout: Duration,
    pub dispatch_capacity: usize,
    /// Base of the patient-facing join link, `{app_base_url}/q/{publicId}`
    pub app_base_url: String,
    /// External notifier; notifications are only logged when unset
    pub notifier_url: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let dispatch = DispatchSettings::default();
        Self {
            dedupe_window: DEFAULT_DEDUPE_WINDOW,
            history_sample: DEFAULT_HISTORY_SAMPLE,
            default_minutes_per_person: DEFAULT_MINUTES_PER_PERSON,
            fanout_capacity: DEFAULT_HIGH_WATER_MARK,
            notifier_timeout: dispatch.timeout,
            dispatch_capacity: dispatch.capacity,
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            notifier_url: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            history_sample: self.history_sample,
            default_minutes_per_person: self.default_minutes_per_person,
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            capacity: self.dispatch_capacity,
            timeout: self.notifier_timeout,
        }
    }

    /// Join link for a queue's public id
    pub fn qr_url(&self, public_id: &str) -> String {
        format!("{}/q/{}", self.app_base_url.trim_end_matches('/'), public_id)
    }

    /// Retry hint for a rate-limited admission, never below one second
    pub fn dedupe_window_secs(&self) -> u64 {
        self.dedupe_window.as_secs().max(1)
    }
}
