use serde::{Deserialize, Serialize};

use crate::models::{ConnectionKind, Technology};

/// Link-quality reading at the moment of sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkReading {
    pub connection_kind: ConnectionKind,
    pub strength_percent: f64,
    pub technology: Option<Technology>,
    pub provider: Option<String>,
}

pub trait NetworkInfoProvider: Send + Sync {
    fn current(&self) -> NetworkReading;
}

/// Provider that always reports the same reading. Useful for hosts without
/// radio access and for replaying recorded tracks.
#[derive(Debug, Clone)]
pub struct StaticNetworkInfo {
    reading: NetworkReading,
}

impl StaticNetworkInfo {
    pub fn new(reading: NetworkReading) -> Self {
        Self { reading }
    }
}

impl NetworkInfoProvider for StaticNetworkInfo {
    fn current(&self) -> NetworkReading {
        self.reading.clone()
    }
}

const MIN_RSSI_DBM: f64 = -100.0;
const MAX_RSSI_DBM: f64 = -50.0;

/// Map an RSSI in dBm onto 0..=100 %, linear between -100 and -50 dBm.
pub fn strength_from_rssi(rssi_dbm: f64) -> f64 {
    ((rssi_dbm - MIN_RSSI_DBM) / (MAX_RSSI_DBM - MIN_RSSI_DBM) * 100.0).clamp(0.0, 100.0)
}

/// Classify an "effective connection type" string reported by the platform.
pub fn technology_from_effective_type(effective_type: &str) -> Technology {
    match effective_type {
        "slow-2g" | "2g" | "3g" => Technology::ThreeG,
        "4g" => Technology::FourG,
        _ => Technology::FiveG,
    }
}
