pub mod dead_zone;
pub mod measurement;
pub mod position;
pub mod tile;

pub use dead_zone::DeadZoneCluster;
pub use measurement::{ConnectionKind, SignalMeasurement, StoredMeasurement, SyncQueueItem, Technology};
pub use position::Position;
pub use tile::{TileEntry, TileKey, OSM_TILE_TEMPLATE};
