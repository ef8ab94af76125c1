//! Wait-time estimator
//!
//! A moving-average heuristic, not a queueing model: the mean admission-to-
//! completion time of the most recent served tokens, rounded to whole
//! minutes (never below one), multiplied by the number of people waiting.
//! With no history yet a fixed per-person default is used.

use crate::store::api::{DurableStore, StoreResult};
use std::sync::Arc;

/// Served tokens sampled for the average
pub const DEFAULT_HISTORY_SAMPLE: usize = 20;

/// Per-person estimate before any token has been served
pub const DEFAULT_MINUTES_PER_PERSON: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorSettings {
    pub history_sample: usize,
    pub default_minutes_per_person: u32,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            history_sample: DEFAULT_HISTORY_SAMPLE,
            default_minutes_per_person: DEFAULT_MINUTES_PER_PERSON,
        }
    }
}

/// Rounded mean of the sampled service times, floored at one minute
///
/// Returns `None` for an empty sample.
pub fn minutes_per_person(sample_minutes: &[f64]) -> Option<u32> {
    if sample_minutes.is_empty() {
        return None;
    }
    let mean = sample_minutes.iter().sum::<f64>() / sample_minutes.len() as f64;
    Some(mean.round().max(1.0) as u32)
}

pub fn estimate_wait(waiting_count: usize, sample_minutes: &[f64], settings: &EstimatorSettings) -> u32 {
    if waiting_count == 0 {
        return 0;
    }
    let per_person =
        minutes_per_person(sample_minutes).unwrap_or(settings.default_minutes_per_person);
    per_person.saturating_mul(waiting_count as u32)
}

/// Reads service history from the store and applies [`estimate_wait`]
pub struct WaitTimeEstimator {
    store: Arc<dyn DurableStore>,
    settings: EstimatorSettings,
}

impl WaitTimeEstimator {
    pub fn new(store: Arc<dyn DurableStore>, settings: EstimatorSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    pub async fn estimate(&self, queue_id: &str, waiting_count: usize) -> StoreResult<u32> {
        if waiting_count == 0 {
            return Ok(0);
        }

        let recent = self
            .store
            .recent_served(queue_id, self.settings.history_sample)
            .await?;
        let sample: Vec<f64> = recent.iter().filter_map(|t| t.service_minutes()).collect();
        log::trace!(
            "Estimating wait for queue {} from {} served tokens",
            queue_id,
            sample.len()
        );

        Ok(estimate_wait(waiting_count, &sample, &self.settings))
    }
}
