//! Interfaces to the device and the backend that this crate only consumes.
//!
//! Hosts implement these (or use the channel-fed helpers here) and hand them
//! to the components at construction time.

pub mod battery;
pub mod connectivity;
pub mod http;
pub mod network_info;
pub mod position;

pub use battery::{BatteryInfoProvider, BatteryStatus};
pub use connectivity::{ConnectivityMonitor, ConnectivitySource};
pub use http::HttpEndpoint;
pub use network_info::{NetworkInfoProvider, NetworkReading, StaticNetworkInfo};
pub use position::{ChannelPositionSource, PositionFeed, PositionSource, PositionSubscription, WatchOptions};

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::models::StoredMeasurement;

/// The backend. Opaque beyond these two calls.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn upload(&self, measurement: &StoredMeasurement) -> Result<(), NetworkError>;

    async fn fetch_tile_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError>;
}
