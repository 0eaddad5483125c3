//! Signal measurement records and their sync-queue envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Position;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionKind {
    Cellular,
    #[serde(rename = "wifi")]
    WiFi,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Technology {
    #[serde(rename = "3G")]
    ThreeG,
    #[serde(rename = "4G")]
    FourG,
    #[serde(rename = "5G")]
    FiveG,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::ThreeG => "3G",
            Technology::FourG => "4G",
            Technology::FiveG => "5G",
        }
    }
}

/// One sampled reading of link quality at a position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalMeasurement {
    pub connection_kind: ConnectionKind,
    /// 0..=100.
    pub strength_percent: f64,
    pub technology: Option<Technology>,
    pub provider: Option<String>,
    pub position: Position,
}

impl SignalMeasurement {
    pub fn latitude(&self) -> f64 {
        self.position.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.position.longitude
    }

    pub fn timestamp(&self) -> i64 {
        self.position.timestamp
    }
}

/// A measurement as owned by local storage until it has been uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMeasurement {
    pub id: String,
    pub measurement: SignalMeasurement,
    pub reported_by: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredMeasurement {
    pub fn new(measurement: SignalMeasurement, reported_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            measurement,
            reported_by: reported_by.into(),
            verified: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: String,
    pub payload: StoredMeasurement,
    pub attempts: u32,
    /// Epoch milliseconds.
    pub enqueued_at: i64,
}

impl SyncQueueItem {
    pub fn new(payload: StoredMeasurement, enqueued_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            attempts: 0,
            enqueued_at,
        }
    }
}
