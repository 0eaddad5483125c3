use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::config::{BatteryAction, BatteryPolicy};
use super::sampler::MeasurementSampler;
use crate::codec::encode_record;
use crate::error::PositionError;
use crate::models::{Position, SignalMeasurement, StoredMeasurement};
use crate::sources::{BatteryInfoProvider, NetworkInfoProvider, PositionSubscription};
use crate::store::{Namespace, PersistentStore};
use crate::sync::SyncQueue;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Everything the tracking loop needs besides the subscription.
#[derive(Clone)]
pub struct TrackingDeps {
    pub network: Arc<dyn NetworkInfoProvider>,
    pub battery: Option<Arc<dyn BatteryInfoProvider>>,
    pub store: Arc<dyn PersistentStore>,
    pub sync_queue: Option<Arc<SyncQueue>>,
    pub battery_policy: BatteryPolicy,
    pub reported_by: String,
}

pub(super) async fn tracking_loop(
    sampler: Arc<Mutex<MeasurementSampler>>,
    deps: TrackingDeps,
    mut subscription: PositionSubscription,
    cancel_token: CancellationToken,
) {
    let watchdog = {
        let guard = sampler.lock().await;
        Duration::from_millis(guard.config().timeout_ms.max(1))
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("tracking loop shutting down");
                break;
            }
            update = tokio::time::timeout(watchdog, subscription.next()) => {
                match update {
                    Ok(Some(Ok(position))) => {
                        if !handle_position(&sampler, &deps, position).await {
                            cancel_token.cancel();
                            break;
                        }
                    }
                    Ok(Some(Err(err))) => {
                        log_warn!("position source error: {err}");
                        sampler.lock().await.record_error(err);
                    }
                    Ok(None) => {
                        log_error!("position source closed; waiting for stop");
                        sampler
                            .lock()
                            .await
                            .record_error(PositionError::Unavailable("position source closed".into()));
                        cancel_token.cancelled().await;
                        break;
                    }
                    Err(_) => {
                        log_debug!("no position update within {}ms", watchdog.as_millis());
                        sampler.lock().await.record_error(PositionError::Timeout);
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
}

/// Returns false when the session has to end (battery exhausted).
async fn handle_position(
    sampler: &Mutex<MeasurementSampler>,
    deps: &TrackingDeps,
    position: Position,
) -> bool {
    let battery = deps.battery.as_ref().and_then(|provider| provider.status());
    let action = deps.battery_policy.evaluate(battery);

    let (accepted, window) = {
        let mut guard = sampler.lock().await;
        if !guard.is_tracking() {
            return true;
        }

        match action {
            BatteryAction::Stop => {
                log_warn!(
                    "battery below {}%, stopping tracking",
                    deps.battery_policy.min_battery_level
                );
                guard.stop();
                return false;
            }
            BatteryAction::Reduce => {
                if !guard.state().reduced_frequency {
                    log_info!("battery low, widening sampling interval");
                }
                guard.set_time_gate_override(Some(deps.battery_policy.low_battery_update_interval_ms));
            }
            BatteryAction::Normal => guard.set_time_gate_override(None),
        }

        let Some(accepted) = guard.offer(position, || deps.network.current()) else {
            return true;
        };

        let window = if guard.config().persist_locally {
            let key = guard.config().storage_key.clone();
            Some((key, guard.persisted_window().to_vec()))
        } else {
            None
        };
        (accepted, window)
    };

    if let Some((key, points)) = window {
        persist_history(deps.store.as_ref(), &key, &points).await;
    }

    if let Some(queue) = &deps.sync_queue {
        let stored = StoredMeasurement::new(accepted, deps.reported_by.clone());
        let queue = Arc::clone(queue);
        tokio::spawn(async move {
            queue.enqueue(stored).await;
        });
    }

    true
}

pub(super) async fn persist_history(store: &dyn PersistentStore, key: &str, points: &[SignalMeasurement]) {
    let encoded = match encode_record(&points) {
        Ok(encoded) => encoded,
        Err(err) => {
            log_error!("failed to encode tracking history: {err}");
            return;
        }
    };
    if let Err(err) = store.set(Namespace::Measurements, key, encoded).await {
        log_warn!("tracking history not persisted: {err}");
    }
}
