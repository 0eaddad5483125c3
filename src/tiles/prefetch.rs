//! Bulk download of every tile covering a viewport for offline use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::cache::TileCache;
use crate::geo::tiles::{tile_count, tiles_in_bounds, BoundingBox};
use crate::models::TileKey;
use crate::sources::RemoteEndpoint;
use crate::utils::guard::BusyGuard;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchRequest {
    pub bounds: BoundingBox,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub source_url_template: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchProgress {
    pub total: usize,
    pub completed: usize,
    /// Downloaded during this run.
    pub fetched: usize,
    /// Already cached and fresh.
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl PrefetchProgress {
    /// Completed share in `0.0..=1.0`. An empty area counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cancelled || self.completed == self.total
    }
}

/// Downloads tiles one at a time into a [`TileCache`]. Only one download runs
/// per prefetcher; progress is published on a watch channel.
pub struct TilePrefetcher {
    cache: Arc<TileCache>,
    endpoint: Arc<dyn RemoteEndpoint>,
    running: AtomicBool,
    progress_tx: watch::Sender<PrefetchProgress>,
}

impl TilePrefetcher {
    pub fn new(cache: Arc<TileCache>, endpoint: Arc<dyn RemoteEndpoint>) -> Self {
        let (progress_tx, _rx) = watch::channel(PrefetchProgress::default());
        Self {
            cache,
            endpoint,
            running: AtomicBool::new(false),
            progress_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PrefetchProgress> {
        self.progress_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> PrefetchProgress {
        *self.progress_tx.borrow()
    }

    /// Fetch every missing tile in the request. Returns `None` when another
    /// download is already in progress. Tiles stored before a cancellation
    /// stay valid, so re-running the same request resumes where it stopped.
    pub async fn download_area(
        &self,
        request: &PrefetchRequest,
        cancel: &CancellationToken,
    ) -> Option<PrefetchProgress> {
        let _busy = BusyGuard::try_acquire(&self.running)?;

        let total = tile_count(&request.bounds, request.min_zoom, request.max_zoom);
        let mut progress = PrefetchProgress {
            total: usize::try_from(total).unwrap_or(usize::MAX),
            ..PrefetchProgress::default()
        };
        self.progress_tx.send_replace(progress);
        log_info!(
            "Prefetching {} tiles for zoom {}..={}",
            progress.total,
            request.min_zoom,
            request.max_zoom
        );

        for coord in tiles_in_bounds(&request.bounds, request.min_zoom, request.max_zoom) {
            if cancel.is_cancelled() {
                progress.cancelled = true;
                self.progress_tx.send_replace(progress);
                log_info!(
                    "Prefetch cancelled after {}/{} tiles",
                    progress.completed,
                    progress.total
                );
                return Some(progress);
            }

            let key = TileKey::from_coord(coord, &request.source_url_template);
            if self.cache.has_tile(&key).await {
                progress.skipped += 1;
            } else {
                match self.cache.fetch(&key, self.endpoint.as_ref()).await {
                    Ok(bytes) => {
                        self.cache.set_tile(&key, &bytes).await;
                        progress.fetched += 1;
                    }
                    Err(err) => {
                        log_warn!("Prefetch of {} failed: {err}", key.url());
                        progress.failed += 1;
                    }
                }
            }

            progress.completed += 1;
            self.progress_tx.send_replace(progress);
        }

        log_info!(
            "Prefetch done: {} fetched, {} already cached, {} failed",
            progress.fetched,
            progress.skipped,
            progress.failed
        );
        Some(progress)
    }
}
