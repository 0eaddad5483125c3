pub mod cache;
pub mod config;
pub mod prefetch;

pub use cache::{CacheStats, CleanupReport, TileCache};
pub use config::{TileCacheConfig, CLEANUP_INTERVAL_MS, MAX_CACHE_SIZE, TILE_EXPIRY_MS};
pub use prefetch::{PrefetchProgress, PrefetchRequest, TilePrefetcher};
