use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::config::SyncConfig;
use crate::clock::Clock;
use crate::codec::{decode_record, encode_record};
use crate::error::NetworkError;
use crate::models::{StoredMeasurement, SyncQueueItem};
use crate::sources::{ConnectivitySource, RemoteEndpoint};
use crate::store::{Namespace, PersistentStore};
use crate::utils::guard::BusyGuard;

/// Outcome of one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub delivered: usize,
    /// Failed this pass and kept for another attempt.
    pub retried: usize,
    /// Out of attempts and removed.
    pub dropped: usize,
    /// Unreadable and removed.
    pub corrupt: usize,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.retried + self.dropped
    }
}

/// Durable outbox of measurements awaiting upload.
///
/// Delivery is at-least-once and unordered. Store and network failures never
/// escape: they are logged and the affected item stays queued.
pub struct SyncQueue {
    store: Arc<dyn PersistentStore>,
    endpoint: Arc<dyn RemoteEndpoint>,
    connectivity: Arc<dyn ConnectivitySource>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    draining: AtomicBool,
}

impl SyncQueue {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        endpoint: Arc<dyn RemoteEndpoint>,
        connectivity: Arc<dyn ConnectivitySource>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            endpoint,
            connectivity,
            clock,
            config,
            draining: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &Arc<dyn ConnectivitySource> {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Queue `measurement` for upload and drain right away when online.
    /// Returns the queue item id, or `None` if it could not be persisted.
    pub async fn enqueue(&self, measurement: StoredMeasurement) -> Option<String> {
        let item = SyncQueueItem::new(measurement, self.clock.now_ms());
        let id = item.id.clone();

        if let Err(err) = self.persist(&item).await {
            error!("Failed to queue measurement {}: {err}", item.payload.id);
            return None;
        }
        debug!("Queued measurement {} as {id}", item.payload.id);

        if self.is_online() {
            self.drain().await;
        }
        Some(id)
    }

    /// Attempt delivery of every queued item. Returns `None` when another
    /// drain is already running.
    pub async fn drain(&self) -> Option<DrainReport> {
        let _busy = BusyGuard::try_acquire(&self.draining)?;
        let mut report = DrainReport::default();

        let entries = match self.store.entries(Namespace::SyncQueue).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Sync queue unreadable, skipping drain: {err}");
                return Some(report);
            }
        };

        for (key, raw) in entries {
            let mut item: SyncQueueItem = match decode_record(&raw) {
                Ok(item) => item,
                Err(err) => {
                    error!("Dropping unreadable sync item {key}: {err}");
                    self.remove(&key).await;
                    report.corrupt += 1;
                    continue;
                }
            };

            if item.attempts >= self.config.max_retry_attempts {
                error!(
                    "Dropping sync item {} after {} failed attempts",
                    item.id, item.attempts
                );
                self.remove(&key).await;
                report.dropped += 1;
                continue;
            }

            match self.upload(&item.payload).await {
                Ok(()) => {
                    self.remove(&key).await;
                    report.delivered += 1;
                }
                Err(err) => {
                    item.attempts += 1;
                    if item.attempts >= self.config.max_retry_attempts {
                        error!(
                            "Sync item {} permanently failed after {} attempts: {err}",
                            item.id, item.attempts
                        );
                        self.remove(&key).await;
                        report.dropped += 1;
                    } else {
                        warn!(
                            "Upload of sync item {} failed (attempt {}): {err}",
                            item.id, item.attempts
                        );
                        if let Err(err) = self.persist(&item).await {
                            warn!("Could not record attempt for sync item {}: {err}", item.id);
                        }
                        report.retried += 1;
                    }
                }
            }
        }

        if report != DrainReport::default() {
            info!(
                "Drain finished: {} delivered, {} retried, {} dropped, {} corrupt",
                report.delivered, report.retried, report.dropped, report.corrupt
            );
        }
        Some(report)
    }

    /// Number of queued items. Reports 0 if the store cannot be read.
    pub async fn pending_count(&self) -> usize {
        match self.store.count(Namespace::SyncQueue).await {
            Ok(count) => count,
            Err(err) => {
                warn!("Could not count sync queue: {err}");
                0
            }
        }
    }

    /// Every readable queued item, in store order.
    pub async fn snapshot(&self) -> Vec<SyncQueueItem> {
        match self.store.entries(Namespace::SyncQueue).await {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|(key, raw)| match decode_record(&raw) {
                    Ok(item) => Some(item),
                    Err(err) => {
                        debug!("Skipping unreadable sync item {key}: {err}");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                warn!("Could not read sync queue: {err}");
                Vec::new()
            }
        }
    }

    pub async fn clear(&self) {
        let keys = match self.store.keys(Namespace::SyncQueue).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("Could not list sync queue for clearing: {err}");
                return;
            }
        };
        for key in keys {
            self.remove(&key).await;
        }
    }

    async fn upload(&self, measurement: &StoredMeasurement) -> Result<(), NetworkError> {
        let timeout_ms = self.config.upload_timeout_ms;
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.endpoint.upload(measurement),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(timeout_ms)),
        }
    }

    async fn persist(&self, item: &SyncQueueItem) -> anyhow::Result<()> {
        let encoded = encode_record(item)?;
        self.store.set(Namespace::SyncQueue, &item.id, encoded).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) {
        if let Err(err) = self.store.remove(Namespace::SyncQueue, key).await {
            warn!("Failed to remove sync item {key}: {err}");
        }
    }
}
