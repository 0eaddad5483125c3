use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::SamplerConfig;
use super::loop_worker::{persist_history, tracking_loop, TrackingDeps};
use super::sampler::{MeasurementSampler, TrackingState};
use crate::codec::decode_record;
use crate::models::SignalMeasurement;
use crate::sources::PositionSource;
use crate::store::Namespace;

/// Starts and stops tracking sessions and exposes their state.
///
/// History outlives sessions: stopping keeps it, and the next start resumes
/// gating from the last stored point.
pub struct TrackingController {
    sampler: Arc<Mutex<MeasurementSampler>>,
    source: Arc<dyn PositionSource>,
    deps: TrackingDeps,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl TrackingController {
    pub fn new(config: SamplerConfig, source: Arc<dyn PositionSource>, deps: TrackingDeps) -> Self {
        Self {
            sampler: Arc::new(Mutex::new(MeasurementSampler::new(config))),
            source,
            deps,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn start_tracking(&mut self) -> Result<()> {
        if self.is_running() {
            bail!("tracking already active");
        }
        // A session that ended on its own (low battery) left its handle behind.
        self.join_finished().await;

        let mut sampler = self.sampler.lock().await;
        if sampler.history().is_empty() && sampler.config().persist_locally {
            let key = sampler.config().storage_key.clone();
            if let Some(points) = self.load_history(&key).await {
                info!("Restored {} tracked points", points.len());
                sampler.restore(points);
            }
        }
        sampler.start();
        let subscription = self.source.watch(sampler.config().watch_options());
        drop(sampler);

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tracking_loop(
            Arc::clone(&self.sampler),
            self.deps.clone(),
            subscription,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Tracking started");
        Ok(())
    }

    /// Halt sampling at once and wait for the loop to exit.
    pub async fn stop_tracking(&mut self) -> Result<()> {
        self.sampler.lock().await.stop();

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("tracking loop task failed to join")?;
            info!("Tracking stopped");
        }
        Ok(())
    }

    pub async fn state(&self) -> TrackingState {
        self.sampler.lock().await.state().clone()
    }

    pub async fn history(&self) -> Vec<SignalMeasurement> {
        self.sampler.lock().await.history().to_vec()
    }

    pub async fn total_distance_m(&self) -> f64 {
        self.sampler.lock().await.total_distance_m()
    }

    /// Forget every tracked point, in memory and on disk.
    pub async fn clear_history(&self) {
        let mut sampler = self.sampler.lock().await;
        sampler.clear_history();
        let key = sampler.config().storage_key.clone();
        drop(sampler);

        if let Err(err) = self.deps.store.remove(Namespace::Measurements, &key).await {
            warn!("Failed to remove persisted history: {err}");
        }
    }

    /// Write the current history window now, independent of new samples.
    pub async fn flush_history(&self) {
        let sampler = self.sampler.lock().await;
        let key = sampler.config().storage_key.clone();
        let points = sampler.persisted_window().to_vec();
        drop(sampler);
        persist_history(self.deps.store.as_ref(), &key, &points).await;
    }

    async fn load_history(&self, key: &str) -> Option<Vec<SignalMeasurement>> {
        let raw = match self.deps.store.get(Namespace::Measurements, key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("Could not load tracking history: {err}");
                return None;
            }
        };
        match decode_record(&raw) {
            Ok(points) => Some(points),
            Err(err) => {
                warn!("Discarding unreadable tracking history: {err}");
                None
            }
        }
    }

    async fn join_finished(&mut self) {
        self.cancel_token = None;
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("Previous tracking loop ended abnormally: {err}");
            }
        }
    }
}
