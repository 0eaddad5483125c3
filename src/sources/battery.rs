use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    pub charging: bool,
    /// 0..=100.
    pub level_percent: f64,
}

/// Optional device capability. Components take `Option<Arc<dyn BatteryInfoProvider>>`
/// and behave as if on mains power when it is absent.
pub trait BatteryInfoProvider: Send + Sync {
    /// `None` when the platform cannot report right now.
    fn status(&self) -> Option<BatteryStatus>;
}
