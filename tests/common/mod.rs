#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use signalmap_lib::error::NetworkError;
use signalmap_lib::geo::offset_by_meters;
use signalmap_lib::models::{ConnectionKind, Position, SignalMeasurement, StoredMeasurement};
use signalmap_lib::sources::RemoteEndpoint;

pub const ORIGIN: (f64, f64) = (52.3702, 4.8952);

/// Endpoint double that records every call and can be switched to fail.
#[derive(Default)]
pub struct MockEndpoint {
    pub failing: AtomicBool,
    pub uploads: AtomicUsize,
    pub fetches: AtomicUsize,
    pub delivered: Mutex<HashSet<String>>,
    pub fetched_urls: Mutex<Vec<String>>,
}

impl MockEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn delivered_ids(&self) -> HashSet<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteEndpoint for MockEndpoint {
    async fn upload(&self, measurement: &StoredMeasurement) -> Result<(), NetworkError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NetworkError::Status(503));
        }
        self.delivered.lock().unwrap().insert(measurement.id.clone());
        Ok(())
    }

    async fn fetch_tile_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NetworkError::Request("connection refused".into()));
        }
        self.fetched_urls.lock().unwrap().push(url.to_string());
        Ok(format!("tile:{url}").into_bytes())
    }
}

/// Position `north_m`/`east_m` metres away from [`ORIGIN`].
pub fn position_at(north_m: f64, east_m: f64, timestamp: i64) -> Position {
    let (lat, lon) = offset_by_meters(ORIGIN.0, ORIGIN.1, north_m, east_m);
    Position::new(lat, lon, timestamp).with_accuracy(8.0)
}

pub fn measurement_at(north_m: f64, strength: f64, timestamp: i64) -> SignalMeasurement {
    SignalMeasurement {
        connection_kind: ConnectionKind::Cellular,
        strength_percent: strength,
        technology: None,
        provider: Some("Acme Mobile".into()),
        position: position_at(north_m, 0.0, timestamp),
    }
}

pub fn stored(strength: f64) -> StoredMeasurement {
    StoredMeasurement::new(measurement_at(0.0, strength, 0), "integration")
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
