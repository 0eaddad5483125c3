use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::queue::SyncQueue;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Next periodic wait: the interval spread by up to `jitter` either way.
pub fn jittered_interval(interval_ms: u64, jitter: f64) -> Duration {
    let spread = (interval_ms as f64 * jitter.clamp(0.0, 1.0)).round() as i64;
    let offset = if spread > 0 {
        rand::thread_rng().gen_range(-spread..=spread)
    } else {
        0
    };
    Duration::from_millis((interval_ms as i64 + offset).max(1) as u64)
}

/// Drains the queue periodically and whenever connectivity comes back.
/// Neither trigger drains while offline.
pub async fn sync_loop(queue: Arc<SyncQueue>, cancel_token: CancellationToken) {
    let config = queue.config().clone();
    let mut online_rx = queue.connectivity().subscribe();
    let mut was_online = *online_rx.borrow_and_update();
    let mut watching = true;
    let mut deadline =
        Instant::now() + jittered_interval(config.drain_interval_ms, config.drain_jitter);

    if was_online {
        queue.drain().await;
    }

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("sync worker shutting down");
                break;
            }
            _ = tokio::time::sleep_until(deadline) => {
                deadline = Instant::now()
                    + jittered_interval(config.drain_interval_ms, config.drain_jitter);
                if queue.is_online() {
                    run_drain(&queue, "periodic").await;
                } else {
                    log_debug!("offline, skipping periodic drain");
                }
            }
            changed = online_rx.changed(), if watching => {
                if changed.is_err() {
                    log_warn!("connectivity source went away; continuing with periodic drains only");
                    watching = false;
                    continue;
                }
                let online = *online_rx.borrow_and_update();
                if online && !was_online {
                    run_drain(&queue, "connectivity restored").await;
                }
                was_online = online;
            }
        }
    }
}

async fn run_drain(queue: &SyncQueue, trigger: &str) {
    match queue.drain().await {
        Some(report) if report.attempted() > 0 => {
            let pending = queue.pending_count().await;
            log_info!(
                "{trigger} drain: {} delivered, {pending} pending",
                report.delivered
            );
        }
        Some(_) => {
            log_debug!("{trigger} drain: nothing to send");
        }
        None => {
            log_debug!("{trigger} drain skipped, another drain is running");
        }
    }
}

/// Owns the background sync task.
#[derive(Default)]
pub struct SyncController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SyncController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&mut self, queue: Arc<SyncQueue>) -> Result<()> {
        if self.is_running() {
            bail!("sync worker already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sync_loop(queue, cancel_token.clone()));
        info!("sync worker started");

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stop the worker. A drain already in flight finishes first.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sync worker task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
