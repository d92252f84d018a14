use chrono::Utc;
use schema::{BoundingBox, Detection, PredictionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use telemetry::{
    BatchExporter, EnqueueStatus, EventFilter, ExporterConfig, InMemoryTraceStore, StoreError,
    TraceStore,
};
use uuid::Uuid;

fn make_event(filename: &str) -> PredictionEvent {
    PredictionEvent {
        prediction_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        processing_time_seconds: 0.05,
        image_width: 640,
        image_height: 480,
        filename: filename.to_string(),
        model_name: "yolo11n".to_string(),
        detections: vec![Detection {
            class_name: "car".to_string(),
            confidence: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }],
    }
}

/// Store whose exports park until permits are released, to hold the
/// export task mid-flush.
struct BlockingStore {
    export_started: Arc<AtomicBool>,
    release: Arc<tokio::sync::Semaphore>,
    inner: Arc<InMemoryTraceStore>,
}

impl TraceStore for BlockingStore {
    async fn export_batch(&self, events: &[PredictionEvent]) -> Result<(), StoreError> {
        self.export_started.store(true, Ordering::SeqCst);
        let permit = self
            .release
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("release semaphore closed".to_string()))?;
        permit.forget();
        self.inner.export_batch(events).await
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<PredictionEvent>, StoreError> {
        self.inner.query_events(filter).await
    }
}

async fn wait_until(flag: &AtomicBool) {
    for _ in 0..1000 {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(start_paused = true)]
async fn flushes_when_batch_size_is_reached() {
    let store = Arc::new(InMemoryTraceStore::new());
    let config = ExporterConfig {
        batch_size: 4,
        flush_interval: Duration::from_secs(60),
        ..ExporterConfig::default()
    };
    let (exporter, _task) = BatchExporter::spawn(store.clone(), config);

    for i in 0..4 {
        assert_eq!(
            exporter.enqueue(make_event(&format!("img_{i}.jpg"))),
            EnqueueStatus::Queued
        );
    }

    // Well under the flush interval: the size trigger alone must flush.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn flushes_partial_batch_on_interval() {
    let store = Arc::new(InMemoryTraceStore::new());
    let config = ExporterConfig {
        batch_size: 100,
        flush_interval: Duration::from_millis(100),
        export_timeout: Duration::from_millis(50),
        ..ExporterConfig::default()
    };
    let (exporter, _task) = BatchExporter::spawn(store.clone(), config);

    exporter.enqueue(make_event("lonely.jpg"));
    assert!(store.is_empty());

    // flush_interval + export_timeout is the guaranteed upper bound.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.recorded()[0].filename, "lonely.jpg");
}

#[tokio::test(start_paused = true)]
async fn exports_preserve_enqueue_order_within_batch() {
    let store = Arc::new(InMemoryTraceStore::new());
    let config = ExporterConfig {
        batch_size: 8,
        flush_interval: Duration::from_secs(60),
        ..ExporterConfig::default()
    };
    let (exporter, _task) = BatchExporter::spawn(store.clone(), config);

    for i in 0..8 {
        exporter.enqueue(make_event(&format!("{i}")));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    let filenames: Vec<String> = store.recorded().iter().map(|e| e.filename.clone()).collect();
    let expected: Vec<String> = (0..8).map(|i| i.to_string()).collect();
    assert_eq!(filenames, expected);
}

#[tokio::test(start_paused = true)]
async fn failed_export_discards_batch_without_retry() {
    let store = Arc::new(InMemoryTraceStore::new());
    store.set_unavailable(true);

    let config = ExporterConfig {
        batch_size: 2,
        flush_interval: Duration::from_millis(100),
        ..ExporterConfig::default()
    };
    let (exporter, _task) = BatchExporter::spawn(store.clone(), config);

    exporter.enqueue(make_event("lost_a.jpg"));
    exporter.enqueue(make_event("lost_b.jpg"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(store.is_empty(), "failed batch must be discarded");

    // Recovery: later events export normally, the lost batch never reappears.
    store.set_unavailable(false);
    exporter.enqueue(make_event("kept_a.jpg"));
    exporter.enqueue(make_event("kept_b.jpg"));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let filenames: Vec<String> = store.recorded().iter().map(|e| e.filename.clone()).collect();
    assert_eq!(filenames, vec!["kept_a.jpg", "kept_b.jpg"]);
}

#[tokio::test]
async fn full_queue_drops_newest_and_keeps_oldest() {
    let export_started = Arc::new(AtomicBool::new(false));
    let release = Arc::new(tokio::sync::Semaphore::new(0));
    let inner = Arc::new(InMemoryTraceStore::new());
    let store = BlockingStore {
        export_started: export_started.clone(),
        release: release.clone(),
        inner: inner.clone(),
    };

    let config = ExporterConfig {
        queue_capacity: 2,
        batch_size: 1,
        flush_interval: Duration::from_secs(60),
        export_timeout: Duration::from_secs(60),
    };
    let (exporter, task) = BatchExporter::spawn(store, config);

    // First event is pulled into an export that parks on the semaphore.
    assert_eq!(exporter.enqueue(make_event("0")), EnqueueStatus::Queued);
    wait_until(&export_started).await;

    // Queue now has room for exactly two more.
    assert_eq!(exporter.enqueue(make_event("1")), EnqueueStatus::Queued);
    assert_eq!(exporter.enqueue(make_event("2")), EnqueueStatus::Queued);
    assert_eq!(exporter.enqueue(make_event("3")), EnqueueStatus::Dropped);

    // Unblock all pending exports and drain.
    release.add_permits(16);
    drop(exporter);
    task.await.unwrap();

    let filenames: Vec<String> = inner.recorded().iter().map(|e| e.filename.clone()).collect();
    assert_eq!(filenames, vec!["0", "1", "2"]);
}

#[tokio::test]
async fn shutdown_drains_remaining_events() {
    let store = Arc::new(InMemoryTraceStore::new());
    let config = ExporterConfig {
        batch_size: 100,
        flush_interval: Duration::from_secs(60),
        ..ExporterConfig::default()
    };
    let (exporter, task) = BatchExporter::spawn(store.clone(), config);

    exporter.enqueue(make_event("a.jpg"));
    exporter.enqueue(make_event("b.jpg"));
    drop(exporter);

    task.await.unwrap();
    assert_eq!(store.len(), 2);
}
