use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sources::{BatteryStatus, WatchOptions};

pub const DEFAULT_STORAGE_KEY: &str = "history";

/// Gating and persistence settings for one tracking session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerConfig {
    pub min_distance_m: f64,
    pub min_time_interval_ms: i64,
    pub persist_locally: bool,
    /// Most recent points kept in the persisted copy of the history.
    pub max_storage_size: usize,
    pub storage_key: String,
    pub high_accuracy: bool,
    /// Longest wait for a position update before recording a timeout.
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 10.0,
            min_time_interval_ms: 10_000,
            persist_locally: true,
            max_storage_size: 1_000,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            high_accuracy: true,
            timeout_ms: 5_000,
            maximum_age_ms: 0,
        }
    }
}

impl SamplerConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.maximum_age_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryAction {
    Normal,
    /// Keep sampling with the widened time gate.
    Reduce,
    Stop,
}

/// How tracking reacts to a draining battery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BatteryPolicy {
    pub min_battery_level: f64,
    pub stop_tracking_on_low_battery: bool,
    pub low_battery_threshold: f64,
    pub reduced_frequency_on_low_battery: bool,
    pub low_battery_update_interval_ms: i64,
}

impl Default for BatteryPolicy {
    fn default() -> Self {
        Self {
            min_battery_level: 10.0,
            stop_tracking_on_low_battery: true,
            low_battery_threshold: 20.0,
            reduced_frequency_on_low_battery: true,
            low_battery_update_interval_ms: 30_000,
        }
    }
}

impl BatteryPolicy {
    /// A charging device, or one that cannot report, is never throttled.
    pub fn evaluate(&self, status: Option<BatteryStatus>) -> BatteryAction {
        let Some(status) = status else {
            return BatteryAction::Normal;
        };
        if status.charging {
            return BatteryAction::Normal;
        }

        if self.stop_tracking_on_low_battery && status.level_percent < self.min_battery_level {
            BatteryAction::Stop
        } else if self.reduced_frequency_on_low_battery
            && status.level_percent < self.low_battery_threshold
        {
            BatteryAction::Reduce
        } else {
            BatteryAction::Normal
        }
    }
}
