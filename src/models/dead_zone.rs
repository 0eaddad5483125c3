use serde::{Deserialize, Serialize};

use super::SignalMeasurement;

/// A circular region where several independent weak-signal reports agree.
/// Recomputed wholesale on every analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeadZoneCluster {
    pub id: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_meters: f64,
    pub member_count: usize,
    pub source_points: Vec<SignalMeasurement>,
}
