//! Dead-zone detection over stored measurements.

pub mod algorithm;
pub mod config;

pub use algorithm::{identify_dead_zones, identify_dead_zones_with};
pub use config::{ClusterConfig, CLUSTER_RADIUS_M, MIN_POINTS_FOR_ZONE, WEAK_SIGNAL_THRESHOLD};

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};

use crate::codec::decode_record;
use crate::models::{DeadZoneCluster, SignalMeasurement};
use crate::store::{Namespace, PersistentStore};
use crate::sync::SyncQueue;

/// Readings strictly weaker than `threshold` percent, input order preserved.
pub fn weak_only<'a, I>(points: I, threshold: f64) -> Vec<SignalMeasurement>
where
    I: IntoIterator<Item = &'a SignalMeasurement>,
{
    points
        .into_iter()
        .filter(|point| point.strength_percent < threshold)
        .cloned()
        .collect()
}

/// Pulls the persisted history and pending uploads and clusters the weak
/// readings among them. Each run starts from scratch.
pub struct DeadZoneAnalyzer {
    store: Arc<dyn PersistentStore>,
    sync_queue: Option<Arc<SyncQueue>>,
    history_key: String,
    config: ClusterConfig,
}

impl DeadZoneAnalyzer {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        sync_queue: Option<Arc<SyncQueue>>,
        history_key: impl Into<String>,
        config: ClusterConfig,
    ) -> Self {
        Self {
            store,
            sync_queue,
            history_key: history_key.into(),
            config,
        }
    }

    /// History first, then queued items not already in it.
    pub async fn collect_points(&self) -> Vec<SignalMeasurement> {
        let mut points = self.load_history().await;

        if let Some(queue) = &self.sync_queue {
            let seen: HashSet<(i64, u64, u64)> = points.iter().map(identity).collect();
            points.extend(
                queue
                    .snapshot()
                    .await
                    .into_iter()
                    .map(|item| item.payload.measurement)
                    .filter(|measurement| !seen.contains(&identity(measurement))),
            );
        }
        points
    }

    pub async fn analyze(&self) -> Vec<DeadZoneCluster> {
        let points = self.collect_points().await;
        let weak = weak_only(&points, self.config.weak_signal_threshold);
        let clusters = identify_dead_zones_with(&weak, &self.config);
        debug!(
            "Dead-zone analysis: {} points, {} weak, {} clusters",
            points.len(),
            weak.len(),
            clusters.len()
        );
        clusters
    }

    async fn load_history(&self) -> Vec<SignalMeasurement> {
        let raw = match self.store.get(Namespace::Measurements, &self.history_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!("Could not read measurement history: {err}");
                return Vec::new();
            }
        };
        decode_record(&raw).unwrap_or_else(|err| {
            warn!("Measurement history unreadable, analysing queue only: {err}");
            Vec::new()
        })
    }
}

/// Same reading seen through both the history and the queue.
fn identity(measurement: &SignalMeasurement) -> (i64, u64, u64) {
    (
        measurement.timestamp(),
        measurement.latitude().to_bits(),
        measurement.longitude().to_bits(),
    )
}
