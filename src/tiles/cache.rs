use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::config::TileCacheConfig;
use crate::clock::Clock;
use crate::codec::{compress, decode_record, decompress, encode_record};
use crate::error::NetworkError;
use crate::models::{TileEntry, TileKey};
use crate::sources::RemoteEndpoint;
use crate::store::{Namespace, PersistentStore};

const META_PREFIX: &str = "meta:";
const META_CACHE_SIZE: &str = "meta:cache-size";
const META_LAST_CLEANUP: &str = "meta:last-cleanup";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size_bytes: u64,
    pub entry_count: usize,
    pub last_cleanup: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub remaining: usize,
    pub size_bytes: u64,
}

struct Candidate {
    key: String,
    stored_at: i64,
    size_bytes: u64,
}

/// Size-bounded, age-limited cache of map tiles.
///
/// Mutations (insert, eviction, expiry removal) are serialized so the
/// persisted size counter always matches the entries it describes.
pub struct TileCache {
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    config: TileCacheConfig,
    write_lock: Mutex<()>,
}

impl TileCache {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
        config: TileCacheConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TileCacheConfig {
        &self.config
    }

    /// Cached bytes for `key` if present and younger than the expiry.
    /// Stale or unreadable entries are removed and reported as a miss.
    pub async fn get_tile(&self, key: &TileKey) -> Option<Vec<u8>> {
        let cache_key = key.cache_key();
        let (raw, entry) = self.load_fresh(&cache_key).await?;

        match decompress(&entry.data) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!("Dropping unreadable tile {cache_key}: {err}");
                self.discard(&cache_key, &raw, Some(entry.size_bytes)).await;
                None
            }
        }
    }

    /// Like [`get_tile`](Self::get_tile) without decompressing the image.
    pub async fn has_tile(&self, key: &TileKey) -> bool {
        self.load_fresh(&key.cache_key()).await.is_some()
    }

    pub async fn set_tile(&self, key: &TileKey, bytes: &[u8]) {
        if let Err(err) = self.try_set_tile(key, bytes).await {
            warn!("Failed to cache tile {}: {err:#}", key.cache_key());
        }
    }

    /// Cache lookup, falling back to the network on a miss.
    pub async fn get_or_fetch(
        &self,
        key: &TileKey,
        endpoint: &dyn RemoteEndpoint,
    ) -> Option<Vec<u8>> {
        if let Some(bytes) = self.get_tile(key).await {
            return Some(bytes);
        }

        match self.fetch(key, endpoint).await {
            Ok(bytes) => {
                self.set_tile(key, &bytes).await;
                Some(bytes)
            }
            Err(err) => {
                warn!("Tile fetch failed for {}: {err}", key.url());
                None
            }
        }
    }

    pub(crate) async fn fetch(
        &self,
        key: &TileKey,
        endpoint: &dyn RemoteEndpoint,
    ) -> Result<Vec<u8>, NetworkError> {
        let timeout_ms = self.config.fetch_timeout_ms;
        let url = key.url();
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            endpoint.fetch_tile_bytes(&url),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(timeout_ms)),
        }
    }

    /// Remove every expired or unreadable entry and recompute the size counter.
    pub async fn clear_expired(&self) -> CleanupReport {
        match self.try_clear_expired().await {
            Ok(report) => report,
            Err(err) => {
                warn!("Tile cache cleanup failed: {err:#}");
                CleanupReport::default()
            }
        }
    }

    /// Run [`clear_expired`](Self::clear_expired) if the last sweep is older
    /// than the configured cleanup interval.
    pub async fn maybe_cleanup(&self) -> Option<CleanupReport> {
        let now = self.clock.now_ms();
        let last = match self.read_meta::<i64>(META_LAST_CLEANUP).await {
            Ok(last) => last,
            Err(err) => {
                warn!("Could not read last tile cleanup time: {err:#}");
                None
            }
        };

        match last {
            Some(last) if now - last <= self.config.cleanup_interval_ms => None,
            _ => Some(self.clear_expired().await),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let size_bytes = self.read_meta::<u64>(META_CACHE_SIZE).await.ok().flatten();
        let last_cleanup = self.read_meta::<i64>(META_LAST_CLEANUP).await.ok().flatten();
        let entry_count = match self.store.keys(Namespace::Tiles).await {
            Ok(keys) => keys.iter().filter(|key| !is_meta(key)).count(),
            Err(err) => {
                warn!("Could not count cached tiles: {err}");
                0
            }
        };

        CacheStats {
            size_bytes: size_bytes.unwrap_or(0),
            entry_count,
            last_cleanup,
        }
    }

    /// Drop every cached tile. Cleanup bookkeeping is kept.
    pub async fn clear_all(&self) {
        let _guard = self.write_lock.lock().await;
        let result: Result<()> = async {
            for key in self.store.keys(Namespace::Tiles).await? {
                if !is_meta(&key) {
                    self.store.remove(Namespace::Tiles, &key).await?;
                }
            }
            self.write_meta(META_CACHE_SIZE, &0_u64).await
        }
        .await;

        if let Err(err) = result {
            warn!("Failed to clear tile cache: {err:#}");
        }
    }

    async fn load_fresh(&self, cache_key: &str) -> Option<(String, TileEntry)> {
        let raw = match self.store.get(Namespace::Tiles, cache_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Tile lookup failed for {cache_key}: {err}");
                return None;
            }
        };

        let entry: TileEntry = match decode_record(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Dropping corrupt tile entry {cache_key}: {err}");
                self.discard(cache_key, &raw, None).await;
                return None;
            }
        };

        if self.is_expired(&entry, self.clock.now_ms()) {
            debug!("Tile {cache_key} expired");
            self.discard(cache_key, &raw, Some(entry.size_bytes)).await;
            return None;
        }

        Some((raw, entry))
    }

    fn is_expired(&self, entry: &TileEntry, now: i64) -> bool {
        now - entry.stored_at >= self.config.tile_expiry_ms
    }

    /// Remove `cache_key` unless someone replaced it since `expected_raw` was read.
    async fn discard(&self, cache_key: &str, expected_raw: &str, size_bytes: Option<u64>) {
        let _guard = self.write_lock.lock().await;
        let result: Result<()> = async {
            let current = self.store.get(Namespace::Tiles, cache_key).await?;
            if current.as_deref() != Some(expected_raw) {
                return Ok(());
            }
            self.store.remove(Namespace::Tiles, cache_key).await?;
            if let Some(size) = size_bytes {
                let total = self.read_cache_size().await?;
                self.write_meta(META_CACHE_SIZE, &total.saturating_sub(size))
                    .await?;
            }
            Ok(())
        }
        .await;

        if let Err(err) = result {
            warn!("Failed to remove tile {cache_key}: {err:#}");
        }
    }

    async fn try_set_tile(&self, key: &TileKey, bytes: &[u8]) -> Result<()> {
        let data = compress(bytes);
        let size_bytes = data.len() as u64;
        let cache_key = key.cache_key();

        if size_bytes > self.config.max_cache_size {
            warn!(
                "Tile {cache_key} ({size_bytes} bytes) exceeds the whole cache budget; not caching"
            );
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        let mut current = self.read_cache_size().await?;
        if let Some(raw) = self.store.get(Namespace::Tiles, &cache_key).await? {
            if let Ok(previous) = decode_record::<TileEntry>(&raw) {
                current = current.saturating_sub(previous.size_bytes);
            }
        }

        while current + size_bytes > self.config.max_cache_size {
            let (evicted, freed) = self.evict_oldest(&cache_key).await?;
            if evicted == 0 {
                // Counter drifted above what is actually stored; trust a scan.
                current = self.scan_size(&cache_key).await?;
                break;
            }
            current = current.saturating_sub(freed);
        }

        let entry = TileEntry {
            data,
            stored_at: self.clock.now_ms(),
            size_bytes,
        };
        let encoded = encode_record(&entry).context("failed to encode tile entry")?;
        self.store.set(Namespace::Tiles, &cache_key, encoded).await?;
        self.write_meta(META_CACHE_SIZE, &(current + size_bytes)).await?;

        Ok(())
    }

    /// Remove the oldest share of entries by insertion time, never touching
    /// `keep`. Returns how many were removed and how many bytes they held.
    async fn evict_oldest(&self, keep: &str) -> Result<(usize, u64)> {
        let mut candidates = self.collect_candidates(keep).await?;
        if candidates.is_empty() {
            return Ok((0, 0));
        }

        candidates.sort_by_key(|candidate| candidate.stored_at);
        let to_remove = ((candidates.len() as f64 * self.config.eviction_fraction).ceil() as usize)
            .clamp(1, candidates.len());

        let mut freed = 0_u64;
        for candidate in candidates.iter().take(to_remove) {
            self.store.remove(Namespace::Tiles, &candidate.key).await?;
            freed += candidate.size_bytes;
        }

        info!("Evicted {to_remove} tiles ({freed} bytes) to stay within budget");
        Ok((to_remove, freed))
    }

    /// All tile entries except `skip`. Unreadable entries sort first so they
    /// are the first to go.
    async fn collect_candidates(&self, skip: &str) -> Result<Vec<Candidate>> {
        let entries = self.store.entries(Namespace::Tiles).await?;
        Ok(entries
            .into_iter()
            .filter(|(key, _)| !is_meta(key) && key != skip)
            .map(|(key, raw)| match decode_record::<TileEntry>(&raw) {
                Ok(entry) => Candidate {
                    key,
                    stored_at: entry.stored_at,
                    size_bytes: entry.size_bytes,
                },
                Err(_) => Candidate {
                    key,
                    stored_at: i64::MIN,
                    size_bytes: 0,
                },
            })
            .collect())
    }

    async fn scan_size(&self, skip: &str) -> Result<u64> {
        Ok(self
            .collect_candidates(skip)
            .await?
            .iter()
            .map(|candidate| candidate.size_bytes)
            .sum())
    }

    async fn try_clear_expired(&self) -> Result<CleanupReport> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now_ms();
        let mut report = CleanupReport::default();

        for (key, raw) in self.store.entries(Namespace::Tiles).await? {
            if is_meta(&key) {
                continue;
            }
            match decode_record::<TileEntry>(&raw) {
                Ok(entry) if !self.is_expired(&entry, now) => {
                    report.remaining += 1;
                    report.size_bytes += entry.size_bytes;
                }
                Ok(_) => {
                    self.store.remove(Namespace::Tiles, &key).await?;
                    report.removed += 1;
                }
                Err(err) => {
                    warn!("Dropping corrupt tile entry {key}: {err}");
                    self.store.remove(Namespace::Tiles, &key).await?;
                    report.removed += 1;
                }
            }
        }

        self.write_meta(META_CACHE_SIZE, &report.size_bytes).await?;
        self.write_meta(META_LAST_CLEANUP, &now).await?;

        info!(
            "Tile cleanup removed {} entries; {} remain ({} bytes)",
            report.removed, report.remaining, report.size_bytes
        );
        Ok(report)
    }

    async fn read_cache_size(&self) -> Result<u64> {
        match self.read_meta::<u64>(META_CACHE_SIZE).await {
            Ok(size) => Ok(size.unwrap_or(0)),
            Err(err) => {
                warn!("Tile size counter unreadable, rescanning: {err:#}");
                self.scan_size("").await
            }
        }
    }

    async fn read_meta<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(Namespace::Tiles, key).await? {
            Some(raw) => Ok(Some(
                decode_record(&raw).with_context(|| format!("corrupt metadata {key}"))?,
            )),
            None => Ok(None),
        }
    }

    async fn write_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = encode_record(value).with_context(|| format!("failed to encode {key}"))?;
        self.store.set(Namespace::Tiles, key, encoded).await?;
        Ok(())
    }
}

fn is_meta(key: &str) -> bool {
    key.starts_with(META_PREFIX)
}
