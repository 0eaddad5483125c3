mod common;

use std::sync::Arc;

use signalmap_lib::clock::ManualClock;
use signalmap_lib::codec::decode_record;
use signalmap_lib::error::PositionError;
use signalmap_lib::models::{ConnectionKind, SignalMeasurement, Technology};
use signalmap_lib::settings::CoreSettings;
use signalmap_lib::sources::{
    BatteryInfoProvider, BatteryStatus, ChannelPositionSource, ConnectivityMonitor,
    NetworkReading, PositionFeed, StaticNetworkInfo,
};
use signalmap_lib::store::{MemoryStore, Namespace, PersistentStore};
use signalmap_lib::tracking::{AccuracyLevel, TrackingController, TrackingStatus};
use signalmap_lib::CoverageCore;

use common::{eventually, position_at, MockEndpoint};

struct FixedBattery(f64);

impl BatteryInfoProvider for FixedBattery {
    fn status(&self) -> Option<BatteryStatus> {
        Some(BatteryStatus {
            charging: false,
            level_percent: self.0,
        })
    }
}

fn weak_cellular() -> Arc<StaticNetworkInfo> {
    Arc::new(StaticNetworkInfo::new(NetworkReading {
        connection_kind: ConnectionKind::Cellular,
        strength_percent: 8.0,
        technology: Some(Technology::FourG),
        provider: Some("Acme Mobile".into()),
    }))
}

struct Rig {
    core: CoverageCore,
    store: Arc<MemoryStore>,
    endpoint: Arc<MockEndpoint>,
}

fn rig_with(store: Arc<MemoryStore>) -> Rig {
    let endpoint = MockEndpoint::new();
    let core = CoverageCore::new(
        CoreSettings {
            reported_by: "rig".into(),
            ..CoreSettings::default()
        },
        store.clone(),
        endpoint.clone(),
        Arc::new(ConnectivityMonitor::new(false)),
        Arc::new(ManualClock::new(0)),
    );
    Rig {
        core,
        store,
        endpoint,
    }
}

fn controller(rig: &Rig, battery: Option<Arc<dyn BatteryInfoProvider>>) -> (TrackingController, PositionFeed) {
    let (source, feed) = ChannelPositionSource::new();
    let controller = rig
        .core
        .tracking_controller(Arc::new(source), weak_cellular(), battery);
    (controller, feed)
}

async fn wait_for_points(controller: &TrackingController, count: usize) {
    eventually("stored points", || async move {
        controller.state().await.stored_points >= count
    })
    .await;
}

async fn persisted_history(store: &MemoryStore) -> Vec<SignalMeasurement> {
    let raw = store
        .get(Namespace::Measurements, "history")
        .await
        .unwrap()
        .expect("history persisted");
    decode_record(&raw).unwrap()
}

#[tokio::test]
async fn gated_track_is_persisted_and_queued() {
    let rig = rig_with(Arc::new(MemoryStore::new()));
    let (mut tracking, feed) = controller(&rig, None);
    tracking.start_tracking().await.unwrap();
    assert_eq!(feed.subscriber_count(), 1);

    feed.push_position(position_at(0.0, 0.0, 0));
    feed.push_position(position_at(5.0, 0.0, 3_000));
    feed.push_position(position_at(15.0, 0.0, 6_000));
    feed.push_position(position_at(30.0, 0.0, 12_000));
    feed.push_position(position_at(90.0, 0.0, 24_000));
    wait_for_points(&tracking, 3).await;

    let state = tracking.state().await;
    assert_eq!(state.status, TrackingStatus::Tracking);
    assert_eq!(state.accuracy, AccuracyLevel::High);
    assert!((tracking.total_distance_m().await - 90.0).abs() < 0.5);

    let history = tracking.history().await;
    let stamps: Vec<i64> = history.iter().map(|m| m.timestamp()).collect();
    assert_eq!(stamps, vec![0, 12_000, 24_000]);

    let store = rig.store.as_ref();
    eventually("history persisted", || async move {
        store.count(Namespace::Measurements).await.unwrap() == 1
            && persisted_history(store).await.len() == 3
    })
    .await;
    assert_eq!(persisted_history(store).await, history);

    let queue = rig.core.sync_queue();
    eventually("samples queued", || async move { queue.pending_count().await == 3 }).await;
    let queued = rig.core.sync_queue().snapshot().await;
    assert!(queued.iter().all(|item| item.payload.reported_by == "rig" && item.payload.verified));
    assert_eq!(rig.endpoint.upload_count(), 0);

    tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn errors_are_state_not_failures() {
    let rig = rig_with(Arc::new(MemoryStore::new()));
    let (mut tracking, feed) = controller(&rig, None);
    tracking.start_tracking().await.unwrap();

    feed.push_error(PositionError::PermissionDenied);
    let observed = &tracking;
    eventually("error recorded", || async move {
        observed.state().await.last_error == Some(PositionError::PermissionDenied)
    })
    .await;
    let state = tracking.state().await;
    assert_eq!(state.accuracy, AccuracyLevel::Unavailable);
    assert_eq!(state.status, TrackingStatus::Tracking);

    feed.push_position(position_at(0.0, 0.0, 1_000));
    wait_for_points(&tracking, 1).await;
    assert!(tracking.state().await.last_error.is_none());

    tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn stop_halts_sampling_and_keeps_history() {
    let rig = rig_with(Arc::new(MemoryStore::new()));
    let (mut tracking, feed) = controller(&rig, None);
    tracking.start_tracking().await.unwrap();

    feed.push_position(position_at(0.0, 0.0, 0));
    wait_for_points(&tracking, 1).await;
    tracking.stop_tracking().await.unwrap();

    assert_eq!(feed.subscriber_count(), 0);
    assert_eq!(feed.push_position(position_at(500.0, 0.0, 60_000)), 0);
    let state = tracking.state().await;
    assert_eq!(state.status, TrackingStatus::Idle);
    assert_eq!(state.stored_points, 1);
    assert!(!tracking.is_running());
}

#[tokio::test]
async fn restart_resumes_from_persisted_history() {
    let store = Arc::new(MemoryStore::new());
    {
        let rig = rig_with(store.clone());
        let (mut tracking, feed) = controller(&rig, None);
        tracking.start_tracking().await.unwrap();
        feed.push_position(position_at(0.0, 0.0, 0));
        feed.push_position(position_at(50.0, 0.0, 10_000));
        wait_for_points(&tracking, 2).await;
        tracking.stop_tracking().await.unwrap();
    }

    let rig = rig_with(store);
    let (mut tracking, feed) = controller(&rig, None);
    tracking.start_tracking().await.unwrap();
    assert_eq!(tracking.state().await.stored_points, 2);

    // Too close to the restored last point.
    feed.push_position(position_at(52.0, 0.0, 30_000));
    feed.push_position(position_at(100.0, 0.0, 40_000));
    wait_for_points(&tracking, 3).await;
    assert_eq!(tracking.history().await.len(), 3);

    tracking.clear_history().await;
    assert!(rig
        .store
        .get(Namespace::Measurements, "history")
        .await
        .unwrap()
        .is_none());
    tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn exhausted_battery_ends_the_session() {
    let rig = rig_with(Arc::new(MemoryStore::new()));
    let (mut tracking, feed) = controller(&rig, Some(Arc::new(FixedBattery(5.0))));
    tracking.start_tracking().await.unwrap();

    feed.push_position(position_at(0.0, 0.0, 0));
    let observed = &tracking;
    eventually("session to end", || async move { !observed.is_running() }).await;

    let state = tracking.state().await;
    assert_eq!(state.status, TrackingStatus::Idle);
    assert_eq!(state.stored_points, 0);

    // A new session can be started afterwards.
    tracking.start_tracking().await.unwrap();
    tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn low_battery_widens_interval() {
    let rig = rig_with(Arc::new(MemoryStore::new()));
    let (mut tracking, feed) = controller(&rig, Some(Arc::new(FixedBattery(15.0))));
    tracking.start_tracking().await.unwrap();

    feed.push_position(position_at(0.0, 0.0, 0));
    feed.push_position(position_at(50.0, 0.0, 20_000));
    feed.push_position(position_at(100.0, 0.0, 30_000));
    wait_for_points(&tracking, 2).await;

    let stamps: Vec<i64> = tracking.history().await.iter().map(|m| m.timestamp()).collect();
    assert_eq!(stamps, vec![0, 30_000]);
    assert!(tracking.state().await.reduced_frequency);
    tracking.stop_tracking().await.unwrap();
}

#[tokio::test]
async fn weak_track_feeds_dead_zone_analysis() {
    let rig = rig_with(Arc::new(MemoryStore::new()));
    let (mut tracking, feed) = controller(&rig, None);
    tracking.start_tracking().await.unwrap();

    for step in 0..4 {
        feed.push_position(position_at(20.0 * step as f64, 0.0, 10_000 * step));
    }
    feed.push_position(position_at(2_000.0, 0.0, 100_000));
    wait_for_points(&tracking, 5).await;
    tracking.stop_tracking().await.unwrap();

    let clusters = rig.core.dead_zone_analyzer().analyze().await;
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].member_count, 4);
}
