pub mod analysis;
pub mod clock;
pub mod codec;
pub mod db;
pub mod error;
pub mod geo;
pub mod models;
pub mod settings;
pub mod sources;
pub mod store;
pub mod sync;
pub mod tiles;
pub mod tracking;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use analysis::DeadZoneAnalyzer;
use clock::{Clock, SystemClock};
use db::Database;
use settings::{CoreSettings, SettingsStore};
use sources::{
    BatteryInfoProvider, ConnectivityMonitor, ConnectivitySource, HttpEndpoint,
    NetworkInfoProvider, PositionSource, RemoteEndpoint,
};
use store::{MemoryStore, PersistentStore};
use sync::{SyncController, SyncQueue};
use tiles::{TileCache, TilePrefetcher};
use tracking::{TrackingController, TrackingDeps};

const DB_FILE_NAME: &str = "signalmap.sqlite3";

/// The data layer, wired once at startup and shared by handle.
///
/// Every component shares one [`PersistentStore`] but only touches its own
/// namespace.
pub struct CoverageCore {
    settings: CoreSettings,
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    endpoint: Arc<dyn RemoteEndpoint>,
    tile_cache: Arc<TileCache>,
    prefetcher: Arc<TilePrefetcher>,
    sync_queue: Arc<SyncQueue>,
}

impl CoverageCore {
    pub fn new(
        settings: CoreSettings,
        store: Arc<dyn PersistentStore>,
        endpoint: Arc<dyn RemoteEndpoint>,
        connectivity: Arc<dyn ConnectivitySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tile_cache = Arc::new(TileCache::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            settings.tiles.clone(),
        ));
        let prefetcher = Arc::new(TilePrefetcher::new(
            Arc::clone(&tile_cache),
            Arc::clone(&endpoint),
        ));
        let sync_queue = Arc::new(SyncQueue::new(
            Arc::clone(&store),
            Arc::clone(&endpoint),
            connectivity,
            Arc::clone(&clock),
            settings.sync.clone(),
        ));

        Self {
            settings,
            store,
            clock,
            endpoint,
            tile_cache,
            prefetcher,
            sync_queue,
        }
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn endpoint(&self) -> &Arc<dyn RemoteEndpoint> {
        &self.endpoint
    }

    pub fn tile_cache(&self) -> &Arc<TileCache> {
        &self.tile_cache
    }

    pub fn prefetcher(&self) -> &Arc<TilePrefetcher> {
        &self.prefetcher
    }

    pub fn sync_queue(&self) -> &Arc<SyncQueue> {
        &self.sync_queue
    }

    /// A tracking controller whose accepted samples are queued for upload.
    pub fn tracking_controller(
        &self,
        source: Arc<dyn PositionSource>,
        network: Arc<dyn NetworkInfoProvider>,
        battery: Option<Arc<dyn BatteryInfoProvider>>,
    ) -> TrackingController {
        TrackingController::new(
            self.settings.tracking.clone(),
            source,
            TrackingDeps {
                network,
                battery,
                store: Arc::clone(&self.store),
                sync_queue: Some(Arc::clone(&self.sync_queue)),
                battery_policy: self.settings.battery.clone(),
                reported_by: self.settings.reported_by.clone(),
            },
        )
    }

    pub fn dead_zone_analyzer(&self) -> DeadZoneAnalyzer {
        DeadZoneAnalyzer::new(
            Arc::clone(&self.store),
            Some(Arc::clone(&self.sync_queue)),
            self.settings.tracking.storage_key.clone(),
            self.settings.dead_zones.clone(),
        )
    }
}

/// Open the SQLite store, or fall back to memory so the rest keeps working.
pub fn open_store(data_dir: &Path) -> Arc<dyn PersistentStore> {
    let db_path = data_dir.join(DB_FILE_NAME);
    match Database::new(db_path.clone()) {
        Ok(database) => {
            info!("Using database at {}", db_path.display());
            Arc::new(database)
        }
        Err(err) => {
            warn!(
                "Database at {} unavailable, data will not survive restart: {err:#}",
                db_path.display()
            );
            Arc::new(MemoryStore::new())
        }
    }
}

fn resolve_data_dir(settings: &CoreSettings, settings_path: &Path) -> PathBuf {
    settings.data_dir.clone().unwrap_or_else(|| {
        settings_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

pub fn run() -> Result<()> {
    let default_level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    info!("signalmap starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("signalmap-worker")
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve())
}

async fn serve() -> Result<()> {
    let settings_store = SettingsStore::new(SettingsStore::default_path())?;
    let settings = settings_store.effective();
    let data_dir = resolve_data_dir(&settings, settings_store.path());

    let store = open_store(&data_dir);
    let endpoint = HttpEndpoint::with_timeout(
        settings.endpoint_base_url.clone(),
        Duration::from_millis(settings.sync.upload_timeout_ms),
    )
    .context("failed to build HTTP client")?;
    let connectivity = Arc::new(ConnectivityMonitor::new(true));

    let core = CoverageCore::new(
        settings,
        store,
        Arc::new(endpoint),
        connectivity,
        Arc::new(SystemClock),
    );

    if let Some(report) = core.tile_cache().maybe_cleanup().await {
        info!(
            "Startup tile cleanup: {} removed, {} remaining",
            report.removed, report.remaining
        );
    }
    let stats = core.tile_cache().stats().await;
    let pending = core.sync_queue().pending_count().await;
    info!(
        "Tile cache holds {} tiles ({} bytes); {pending} measurements pending upload",
        stats.entry_count, stats.size_bytes
    );

    let mut sync = SyncController::new();
    sync.start(Arc::clone(core.sync_queue()))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    sync.stop().await?;
    let pending = core.sync_queue().pending_count().await;
    info!("Stopped with {pending} measurements still queued");
    Ok(())
}
