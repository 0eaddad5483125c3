use serde::{Deserialize, Serialize};

pub const CLUSTER_RADIUS_M: f64 = 100.0;
pub const MIN_POINTS_FOR_ZONE: usize = 3;
pub const WEAK_SIGNAL_THRESHOLD: f64 = 20.0;

/// Thresholds for dead-zone detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfig {
    /// Members must lie within this distance of the seed point.
    pub radius_m: f64,
    pub min_points: usize,
    /// Readings strictly below this strength count as weak.
    pub weak_signal_threshold: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_m: CLUSTER_RADIUS_M,
            min_points: MIN_POINTS_FOR_ZONE,
            weak_signal_threshold: WEAK_SIGNAL_THRESHOLD,
        }
    }
}
