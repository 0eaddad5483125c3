use serde::{Deserialize, Serialize};

use crate::models::OSM_TILE_TEMPLATE;

pub const MAX_CACHE_SIZE: u64 = 50 * 1024 * 1024;
pub const TILE_EXPIRY_MS: i64 = 7 * 24 * 60 * 60 * 1000;
pub const CLEANUP_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Tunables for the tile cache and prefetcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TileCacheConfig {
    /// Budget for the sum of stored (compressed) tile sizes.
    pub max_cache_size: u64,
    pub tile_expiry_ms: i64,
    /// Minimum spacing between startup expiry sweeps.
    pub cleanup_interval_ms: i64,
    /// Share of entries, oldest first, dropped per eviction round.
    pub eviction_fraction: f64,
    pub fetch_timeout_ms: u64,
    pub default_source_template: String,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: MAX_CACHE_SIZE,
            tile_expiry_ms: TILE_EXPIRY_MS,
            cleanup_interval_ms: CLEANUP_INTERVAL_MS,
            eviction_fraction: 0.2,
            fetch_timeout_ms: 10_000,
            default_source_template: OSM_TILE_TEMPLATE.to_string(),
        }
    }
}
