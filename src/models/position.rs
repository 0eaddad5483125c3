use serde::{Deserialize, Serialize};

/// A single fix from the position source. Never mutated once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub altitude_accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy = Some(accuracy_m);
        self
    }
}
