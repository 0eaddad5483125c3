use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::geo::tiles::TileCoord;

pub const OSM_TILE_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
    pub source_url_template: String,
}

impl TileKey {
    pub fn new(zoom: u8, x: u32, y: u32, source_url_template: impl Into<String>) -> Self {
        Self {
            zoom,
            x,
            y,
            source_url_template: source_url_template.into(),
        }
    }

    pub fn from_coord(coord: TileCoord, source_url_template: &str) -> Self {
        Self::new(coord.zoom, coord.x, coord.y, source_url_template)
    }

    /// Key inside the tiles namespace: `{zoom}/{x}/{y}/{sourceHash}`.
    pub fn cache_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.zoom,
            self.x,
            self.y,
            source_hash(&self.source_url_template)
        )
    }

    /// Expand the source template into a fetchable URL.
    pub fn url(&self) -> String {
        self.source_url_template
            .replace("{z}", &self.zoom.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
            .replace("{s}", "a")
            .replace("{r}", "")
    }
}

/// Short stable digest of a tile source template.
pub fn source_hash(template: &str) -> String {
    let digest = Sha256::digest(template.as_bytes());
    hex::encode(&digest[..8])
}

/// A cached tile as persisted in the tiles namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TileEntry {
    /// Codec-encoded image bytes.
    pub data: String,
    /// Epoch milliseconds at insertion.
    pub stored_at: i64,
    /// Length of `data`; what the cache budget counts.
    pub size_bytes: u64,
}
