//! Distance/time gated sampling of a raw position stream.
//!
//! The sampler is a plain state machine with no I/O. The tracking loop feeds
//! it positions and errors and takes care of persistence and upload.

use serde::{Deserialize, Serialize};

use super::config::SamplerConfig;
use crate::error::PositionError;
use crate::geo::{distance_between, track_length_m};
use crate::models::{Position, SignalMeasurement};
use crate::sources::NetworkReading;

/// Reported accuracy at or under this many metres counts as high.
pub const HIGH_ACCURACY_M: f64 = 15.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    #[default]
    Idle,
    Tracking,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AccuracyLevel {
    High,
    Low,
    /// No usable fix: nothing received yet, or the source reported an error.
    #[default]
    #[serde(rename = "none")]
    Unavailable,
}

impl AccuracyLevel {
    pub fn classify(position: &Position) -> Self {
        match position.accuracy {
            Some(accuracy) if accuracy <= HIGH_ACCURACY_M => AccuracyLevel::High,
            _ => AccuracyLevel::Low,
        }
    }
}

/// What the presentation layer shows about the current session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub status: TrackingStatus,
    /// Latest position seen, whether or not it was stored.
    pub current_position: Option<Position>,
    pub last_error: Option<PositionError>,
    pub accuracy: AccuracyLevel,
    pub stored_points: usize,
    pub total_distance_m: f64,
    /// Time gate is widened because the battery is low.
    pub reduced_frequency: bool,
}

pub struct MeasurementSampler {
    config: SamplerConfig,
    state: TrackingState,
    history: Vec<SignalMeasurement>,
    /// Replaces `min_time_interval_ms` while the battery is low.
    time_gate_override_ms: Option<i64>,
}

impl MeasurementSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            state: TrackingState::default(),
            history: Vec::new(),
            time_gate_override_ms: None,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state.status == TrackingStatus::Tracking
    }

    pub fn history(&self) -> &[SignalMeasurement] {
        &self.history
    }

    /// Replace the in-memory history, e.g. with what was persisted last run.
    /// Points out of time order are dropped so the history stays sorted.
    pub fn restore(&mut self, points: Vec<SignalMeasurement>) {
        let mut restored: Vec<SignalMeasurement> = Vec::with_capacity(points.len());
        for point in points {
            if restored
                .last()
                .map_or(true, |last| point.timestamp() >= last.timestamp())
            {
                restored.push(point);
            }
        }
        self.history = restored;
        self.refresh_derived();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.refresh_derived();
    }

    pub fn start(&mut self) {
        self.state.status = TrackingStatus::Tracking;
        self.state.last_error = None;
    }

    /// Stop sampling. History is kept.
    pub fn stop(&mut self) {
        self.state.status = TrackingStatus::Idle;
        self.set_time_gate_override(None);
    }

    pub fn set_time_gate_override(&mut self, interval_ms: Option<i64>) {
        self.time_gate_override_ms = interval_ms;
        self.state.reduced_frequency = interval_ms.is_some();
    }

    pub fn effective_time_gate_ms(&self) -> i64 {
        self.time_gate_override_ms
            .unwrap_or(self.config.min_time_interval_ms)
    }

    /// Whether `position` would be stored right now.
    pub fn accepts(&self, position: &Position) -> bool {
        if !self.is_tracking() {
            return false;
        }
        let Some(last) = self.history.last() else {
            return true;
        };

        let far_enough = distance_between(&last.position, position) >= self.config.min_distance_m;
        let late_enough = position.timestamp - last.timestamp() >= self.effective_time_gate_ms();
        far_enough && late_enough
    }

    /// Feed one raw position. Returns the stored measurement when it passes
    /// both gates. `read_network` is only called for accepted points.
    pub fn offer<F>(&mut self, position: Position, read_network: F) -> Option<SignalMeasurement>
    where
        F: FnOnce() -> NetworkReading,
    {
        if !self.is_tracking() {
            return None;
        }

        self.state.accuracy = AccuracyLevel::classify(&position);
        self.state.last_error = None;
        self.state.current_position = Some(position.clone());

        if !self.accepts(&position) {
            return None;
        }

        let reading = read_network();
        let measurement = SignalMeasurement {
            connection_kind: reading.connection_kind,
            strength_percent: reading.strength_percent.clamp(0.0, 100.0),
            technology: reading.technology,
            provider: reading.provider,
            position,
        };

        if let Some(last) = self.history.last() {
            self.state.total_distance_m += distance_between(&last.position, &measurement.position);
        }
        self.history.push(measurement.clone());
        self.state.stored_points = self.history.len();
        Some(measurement)
    }

    /// Record a position source failure. The session keeps running.
    pub fn record_error(&mut self, error: PositionError) {
        self.state.accuracy = AccuracyLevel::Unavailable;
        self.state.last_error = Some(error);
    }

    /// The tail of the history that gets persisted.
    pub fn persisted_window(&self) -> &[SignalMeasurement] {
        let start = self.history.len().saturating_sub(self.config.max_storage_size);
        &self.history[start..]
    }

    pub fn total_distance_m(&self) -> f64 {
        self.state.total_distance_m
    }

    fn refresh_derived(&mut self) {
        self.state.stored_points = self.history.len();
        self.state.total_distance_m = track_length_m(self.history.iter().map(|m| &m.position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset_by_meters;
    use crate::models::ConnectionKind;
    use proptest::prelude::*;

    const START_LAT: f64 = 51.5007;
    const START_LON: f64 = -0.1246;

    fn reading() -> NetworkReading {
        NetworkReading {
            connection_kind: ConnectionKind::Cellular,
            strength_percent: 64.0,
            technology: None,
            provider: Some("Acme".into()),
        }
    }

    fn at(north_m: f64, timestamp: i64) -> Position {
        let (lat, lon) = offset_by_meters(START_LAT, START_LON, north_m, 0.0);
        Position::new(lat, lon, timestamp).with_accuracy(5.0)
    }

    fn tracking_sampler() -> MeasurementSampler {
        let mut sampler = MeasurementSampler::new(SamplerConfig::default());
        sampler.start();
        sampler
    }

    #[test]
    fn first_point_always_passes() {
        let mut sampler = tracking_sampler();
        assert!(sampler.offer(at(0.0, 1_000), reading).is_some());
        assert_eq!(sampler.state().stored_points, 1);
    }

    #[test]
    fn close_and_soon_is_rejected() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 0), reading);
        assert!(sampler.offer(at(5.0, 3_000), reading).is_none());
    }

    #[test]
    fn distance_alone_is_not_enough() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 0), reading);
        assert!(sampler.offer(at(15.0, 3_000), reading).is_none());
    }

    #[test]
    fn time_alone_is_not_enough() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 0), reading);
        assert!(sampler.offer(at(5.0, 60_000), reading).is_none());
    }

    #[test]
    fn both_gates_pass() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 0), reading);
        let stored = sampler.offer(at(15.0, 10_000), reading);
        assert!(stored.is_some());
        assert!((sampler.total_distance_m() - 15.0).abs() < 0.05);
    }

    #[test]
    fn rejected_points_still_update_current_position() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 0), reading);
        let rejected = at(1.0, 1_000);
        sampler.offer(rejected.clone(), reading);
        assert_eq!(sampler.state().current_position, Some(rejected));
        assert_eq!(sampler.history().len(), 1);
    }

    #[test]
    fn gates_compare_against_last_stored_point() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 0), reading);
        // Each step is 6 m / 6 s, so only every other one clears both gates.
        for step in 1..=4 {
            sampler.offer(at(6.0 * step as f64, 6_000 * step), reading);
        }
        let stamps: Vec<i64> = sampler.history().iter().map(|m| m.timestamp()).collect();
        assert_eq!(stamps, vec![0, 12_000, 24_000]);
    }

    #[test]
    fn out_of_order_timestamp_is_rejected() {
        let mut sampler = tracking_sampler();
        sampler.offer(at(0.0, 50_000), reading);
        assert!(sampler.offer(at(100.0, 20_000), reading).is_none());
    }

    #[test]
    fn idle_sampler_ignores_positions() {
        let mut sampler = MeasurementSampler::new(SamplerConfig::default());
        assert!(sampler.offer(at(0.0, 0), reading).is_none());

        sampler.start();
        sampler.offer(at(0.0, 0), reading);
        sampler.stop();
        assert!(sampler.offer(at(500.0, 60_000), reading).is_none());
        assert_eq!(sampler.history().len(), 1, "stop keeps history");
    }

    #[test]
    fn errors_set_accuracy_none_and_recover() {
        let mut sampler = tracking_sampler();
        sampler.record_error(PositionError::Timeout);
        assert_eq!(sampler.state().accuracy, AccuracyLevel::Unavailable);
        assert_eq!(sampler.state().last_error, Some(PositionError::Timeout));
        assert!(sampler.is_tracking());

        sampler.offer(at(0.0, 0), reading);
        assert_eq!(sampler.state().accuracy, AccuracyLevel::High);
        assert!(sampler.state().last_error.is_none());
    }

    #[test]
    fn accuracy_classification() {
        let base = Position::new(0.0, 0.0, 0);
        assert_eq!(AccuracyLevel::classify(&base.clone().with_accuracy(15.0)), AccuracyLevel::High);
        assert_eq!(AccuracyLevel::classify(&base.clone().with_accuracy(15.1)), AccuracyLevel::Low);
        assert_eq!(AccuracyLevel::classify(&base), AccuracyLevel::Low);
    }

    #[test]
    fn low_battery_widens_time_gate() {
        let mut sampler = tracking_sampler();
        sampler.set_time_gate_override(Some(30_000));
        sampler.offer(at(0.0, 0), reading);
        assert!(sampler.offer(at(50.0, 20_000), reading).is_none());
        assert!(sampler.offer(at(50.0, 30_000), reading).is_some());
        assert!(sampler.state().reduced_frequency);
    }

    #[test]
    fn persisted_window_keeps_most_recent() {
        let mut sampler = MeasurementSampler::new(SamplerConfig {
            max_storage_size: 3,
            ..SamplerConfig::default()
        });
        sampler.start();
        for step in 0..5 {
            sampler.offer(at(20.0 * step as f64, 10_000 * step), reading);
        }
        assert_eq!(sampler.history().len(), 5);
        let window: Vec<i64> = sampler.persisted_window().iter().map(|m| m.timestamp()).collect();
        assert_eq!(window, vec![20_000, 30_000, 40_000]);
    }

    #[test]
    fn restore_becomes_gating_baseline() {
        let mut first = tracking_sampler();
        first.offer(at(0.0, 0), reading);
        first.offer(at(40.0, 10_000), reading);

        let mut second = tracking_sampler();
        second.restore(first.history().to_vec());
        assert_eq!(second.state().stored_points, 2);
        assert!((second.total_distance_m() - 40.0).abs() < 0.1);
        assert!(second.offer(at(42.0, 12_000), reading).is_none());
    }

    proptest! {
        #[test]
        fn stored_history_respects_both_gates(
            steps in prop::collection::vec((-80.0f64..80.0, -5_000i64..25_000), 1..40)
        ) {
            let mut sampler = tracking_sampler();
            let (mut north, mut timestamp) = (0.0, 0i64);
            for (step_m, step_ms) in steps {
                north += step_m;
                timestamp += step_ms;
                sampler.offer(at(north, timestamp), reading);
            }

            for pair in sampler.history().windows(2) {
                prop_assert!(pair[1].timestamp() - pair[0].timestamp() >= 10_000);
                prop_assert!(distance_between(&pair[0].position, &pair[1].position) >= 10.0);
            }
            let expected = track_length_m(sampler.history().iter().map(|m| &m.position));
            prop_assert!((sampler.total_distance_m() - expected).abs() < 1e-6);
        }
    }
}
