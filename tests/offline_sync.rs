mod common;

use std::sync::Arc;

use signalmap_lib::clock::ManualClock;
use signalmap_lib::db::Database;
use signalmap_lib::sources::ConnectivityMonitor;
use signalmap_lib::store::MemoryStore;
use signalmap_lib::sync::{SyncConfig, SyncController, SyncQueue};
use tempfile::TempDir;

use common::{eventually, stored, MockEndpoint};

fn queue_over(
    store: Arc<dyn signalmap_lib::store::PersistentStore>,
    endpoint: Arc<MockEndpoint>,
    connectivity: Arc<ConnectivityMonitor>,
) -> Arc<SyncQueue> {
    Arc::new(SyncQueue::new(
        store,
        endpoint,
        connectivity,
        Arc::new(ManualClock::new(0)),
        SyncConfig::default(),
    ))
}

#[tokio::test]
async fn reconnect_flushes_offline_backlog() {
    let endpoint = MockEndpoint::new();
    let connectivity = Arc::new(ConnectivityMonitor::new(false));
    let queue = queue_over(Arc::new(MemoryStore::new()), endpoint.clone(), connectivity.clone());

    let mut ids = Vec::new();
    for strength in [5.0, 15.0, 70.0] {
        let measurement = stored(strength);
        ids.push(measurement.id.clone());
        queue.enqueue(measurement).await;
    }
    assert_eq!(queue.pending_count().await, 3);

    let mut worker = SyncController::new();
    worker.start(queue.clone()).unwrap();
    assert_eq!(endpoint.upload_count(), 0, "no delivery attempts while offline");

    connectivity.set_online(true);
    eventually("backlog to drain", || {
        let queue = queue.clone();
        async move { queue.pending_count().await == 0 }
    })
    .await;

    let delivered = endpoint.delivered_ids();
    assert!(ids.iter().all(|id| delivered.contains(id)));
    worker.stop().await.unwrap();
    assert!(!worker.is_running());
}

#[tokio::test(start_paused = true)]
async fn worker_redelivers_previously_failed_item() {
    let endpoint = MockEndpoint::new();
    endpoint.set_failing(true);
    let connectivity = Arc::new(ConnectivityMonitor::new(true));
    let queue = queue_over(Arc::new(MemoryStore::new()), endpoint.clone(), connectivity);

    queue.enqueue(stored(3.0)).await;
    assert_eq!(endpoint.upload_count(), 1);
    assert_eq!(queue.snapshot().await[0].attempts, 1);

    endpoint.set_failing(false);
    let mut worker = SyncController::new();
    worker.start(queue.clone()).unwrap();

    eventually("worker to deliver", || {
        let queue = queue.clone();
        async move { queue.pending_count().await == 0 }
    })
    .await;
    assert_eq!(endpoint.delivered_ids().len(), 1);
    worker.stop().await.unwrap();
}

#[tokio::test]
async fn permanently_failing_item_is_dropped_after_three_attempts() {
    let endpoint = MockEndpoint::new();
    endpoint.set_failing(true);
    let connectivity = Arc::new(ConnectivityMonitor::new(true));
    let queue = queue_over(Arc::new(MemoryStore::new()), endpoint.clone(), connectivity);

    queue.enqueue(stored(1.0)).await;
    queue.drain().await;
    let report = queue.drain().await.unwrap();

    assert_eq!(report.dropped, 1);
    assert_eq!(queue.pending_count().await, 0);
    queue.drain().await;
    assert_eq!(endpoint.upload_count(), 3);
}

#[tokio::test]
async fn queue_survives_restart_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.sqlite3");
    let endpoint = MockEndpoint::new();

    {
        let connectivity = Arc::new(ConnectivityMonitor::new(false));
        let db = Database::new(path.clone()).unwrap();
        let queue = queue_over(Arc::new(db), endpoint.clone(), connectivity);
        queue.enqueue(stored(4.0)).await;
        queue.enqueue(stored(9.0)).await;
        assert_eq!(queue.pending_count().await, 2);
    }

    let connectivity = Arc::new(ConnectivityMonitor::new(true));
    let db = Database::new(path).unwrap();
    let queue = queue_over(Arc::new(db), endpoint.clone(), connectivity);
    assert_eq!(queue.pending_count().await, 2);

    let report = queue.drain().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(queue.pending_count().await, 0);
}
