use serde::{Deserialize, Serialize};

pub const MAX_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Failed deliveries after which an item is dropped for good.
    pub max_retry_attempts: u32,
    pub drain_interval_ms: u64,
    /// Random spread applied to each periodic wait, as a fraction of the interval.
    pub drain_jitter: f64,
    pub upload_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: MAX_RETRY_ATTEMPTS,
            drain_interval_ms: 60_000,
            drain_jitter: 0.1,
            upload_timeout_ms: 10_000,
        }
    }
}
