//! Cache key layout

/// Keys owned by one queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub waiting: String,
    pub current: String,
    /// Held while one instance rebuilds the view
    pub rebuild: String,
    queue_id: String,
}

impl QueueKeys {
    pub fn new(queue_id: &str) -> Self {
        Self {
            waiting: format!("queue:{}:waiting", queue_id),
            current: format!("queue:{}:current", queue_id),
            rebuild: format!("queue:{}:rebuild", queue_id),
            queue_id: queue_id.to_string(),
        }
    }

    /// Admission cooldown marker for one mobile number
    pub fn dedupe(&self, mobile: &str) -> String {
        format!("queue:{}:dedupe:{}", self.queue_id, mobile)
    }
}
