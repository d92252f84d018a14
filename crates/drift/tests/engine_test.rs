use chrono::{DateTime, Duration, Utc};
use drift::dataset::CurrentWindow;
use drift::engine::{DriftEngine, ReferenceCriteria};
use drift::error::DriftError;
use drift::workspace::{InMemoryWorkspace, Workspace};
use schema::{BoundingBox, Detection, PredictionEvent};
use std::sync::Arc;
use telemetry::{InMemoryTraceStore, TraceStore};
use uuid::Uuid;

fn detection(class_name: &str, confidence: f32) -> Detection {
    Detection {
        class_name: class_name.to_string(),
        confidence,
        bbox: BoundingBox::new(0.0, 0.0, 32.0, 32.0),
    }
}

fn event(
    timestamp: DateTime<Utc>,
    processing_time: f64,
    detections: Vec<Detection>,
) -> PredictionEvent {
    PredictionEvent {
        prediction_id: Uuid::new_v4(),
        timestamp,
        processing_time_seconds: processing_time,
        image_width: 640,
        image_height: 480,
        filename: "frame.jpg".to_string(),
        model_name: "detector".to_string(),
        detections,
    }
}

async fn seed(store: &InMemoryTraceStore, events: Vec<PredictionEvent>) {
    store.export_batch(&events).await.expect("seeding succeeds");
}

/// Ten confident car detections spread over the past month, the shape the
/// default reference criteria expect.
fn reference_events(now: DateTime<Utc>) -> Vec<PredictionEvent> {
    (0..10)
        .map(|i| {
            event(
                now - Duration::days(20 + i),
                0.10 + i as f64 * 0.002,
                vec![detection("car", 0.90)],
            )
        })
        .collect()
}

fn engine(
    store: &Arc<InMemoryTraceStore>,
    workspace: &Arc<InMemoryWorkspace>,
) -> DriftEngine<Arc<InMemoryTraceStore>, Arc<InMemoryWorkspace>> {
    DriftEngine::new(store.clone(), workspace.clone())
}

#[tokio::test]
async fn analyze_without_a_reference_fails_and_persists_nothing() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    seed(&store, vec![event(Utc::now(), 0.1, vec![detection("car", 0.9)])]).await;

    let err = engine(&store, &workspace)
        .analyze("reference-dataset", CurrentWindow::trailing_days(7))
        .await
        .unwrap_err();

    assert!(matches!(err, DriftError::ReferenceNotFound(name) if name == "reference-dataset"));
    assert!(workspace.reports().is_empty());
    assert!(workspace.dataset_names().is_empty());
}

#[tokio::test]
async fn too_few_qualifying_detections_fail_reference_creation() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let now = Utc::now();

    // 7 qualifying rows; low-confidence and non-car rows do not count.
    let mut events: Vec<_> = (0..7)
        .map(|i| event(now - Duration::hours(i), 0.1, vec![detection("car", 0.9)]))
        .collect();
    events.push(event(now, 0.1, vec![detection("car", 0.5)]));
    events.push(event(now, 0.1, vec![detection("truck", 0.99)]));
    seed(&store, events).await;

    let err = engine(&store, &workspace)
        .create_reference("reference-dataset", &ReferenceCriteria::default())
        .await
        .unwrap_err();

    assert!(
        matches!(err, DriftError::InsufficientData { required: 10, found: 7 }),
        "got {err:?}"
    );
    assert!(workspace.dataset_names().is_empty());
}

#[tokio::test]
async fn confidence_exactly_at_the_minimum_does_not_qualify() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let now = Utc::now();

    // 0.5 is exactly representable, so the boundary row sits precisely on
    // the threshold after the f32 -> f64 widening.
    let criteria = ReferenceCriteria {
        class_filter: "car".to_string(),
        min_confidence: 0.5,
        limit: 10,
    };
    let mut events: Vec<_> = (0..9)
        .map(|i| event(now - Duration::hours(i), 0.1, vec![detection("car", 0.75)]))
        .collect();
    events.push(event(now, 0.1, vec![detection("car", 0.5)]));
    seed(&store, events).await;

    let err = engine(&store, &workspace)
        .create_reference("reference-dataset", &criteria)
        .await
        .unwrap_err();

    assert!(
        matches!(err, DriftError::InsufficientData { required: 10, found: 9 }),
        "got {err:?}"
    );
    assert!(workspace.dataset_names().is_empty());
}

#[tokio::test]
async fn reference_creation_freezes_the_most_recent_qualifying_rows() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let now = Utc::now();

    let mut events = reference_events(now);
    // Two extra qualifying detections newer than the rest.
    events.push(event(now - Duration::days(1), 0.3, vec![detection("car", 0.95)]));
    events.push(event(now - Duration::days(2), 0.3, vec![detection("car", 0.95)]));
    seed(&store, events).await;

    let dataset = engine(&store, &workspace)
        .create_reference("reference-dataset", &ReferenceCriteria::default())
        .await
        .expect("enough qualifying rows");

    assert_eq!(dataset.len(), 10);
    assert!(dataset.rows.iter().all(|row| row.class_name == "car"));
    assert!(dataset.rows.iter().all(|row| row.confidence > 0.85));
    // Newest first: the two extras made the cut.
    assert!((dataset.rows[0].confidence - 0.95).abs() < 1e-6);
    assert!((dataset.rows[1].confidence - 0.95).abs() < 1e-6);
    assert_eq!(workspace.dataset_names(), vec!["reference-dataset"]);
}

#[tokio::test]
async fn empty_current_window_fails_without_a_report() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let now = Utc::now();
    seed(&store, reference_events(now)).await;

    let engine = engine(&store, &workspace);
    engine
        .create_reference("reference-dataset", &ReferenceCriteria::default())
        .await
        .expect("reference builds");

    // All seeded events are older than the 7-day current window.
    let err = engine
        .analyze("reference-dataset", CurrentWindow::trailing_days(7))
        .await
        .unwrap_err();

    assert!(matches!(err, DriftError::EmptyCurrentWindow(_)));
    assert!(workspace.reports().is_empty());
    assert_eq!(workspace.dataset_names(), vec!["reference-dataset"]);
}

#[tokio::test]
async fn shifted_current_window_is_reported_as_drifted() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let now = Utc::now();

    let mut events = reference_events(now);
    // Current window: trucks at low confidence with much higher latency.
    for i in 0..6 {
        events.push(event(
            now - Duration::hours(i),
            0.90,
            vec![detection("truck", 0.55)],
        ));
    }
    seed(&store, events).await;

    let engine = engine(&store, &workspace);
    engine
        .create_reference("reference-dataset", &ReferenceCriteria::default())
        .await
        .expect("reference builds");

    let report = engine
        .analyze("reference-dataset", CurrentWindow::trailing_days(7))
        .await
        .expect("analysis runs");

    assert!(report.drift_detected);
    assert_eq!(report.features.len(), 3);
    assert!(report.features.iter().all(|f| f.drifted), "{report:?}");
    assert_eq!(report.reference_rows, 10);
    assert_eq!(report.current_rows, 6);
    assert_eq!(report.report_url.as_deref(), Some("memory://reports/1"));

    // The run persisted both the frozen current dataset and the report.
    let names = workspace.dataset_names();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|name| name.starts_with("current-")));
    assert_eq!(workspace.reports().len(), 1);
}

#[tokio::test]
async fn workspace_listing_summarizes_stored_datasets() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    seed(&store, reference_events(Utc::now())).await;

    engine(&store, &workspace)
        .create_reference("reference-dataset", &ReferenceCriteria::default())
        .await
        .expect("reference builds");

    let summaries = workspace.list_datasets().await.expect("listing succeeds");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "reference-dataset");
    assert_eq!(summaries[0].rows, 10);
}

#[tokio::test]
async fn stable_current_window_produces_a_clean_report() {
    let store = Arc::new(InMemoryTraceStore::new());
    let workspace = Arc::new(InMemoryWorkspace::new());
    let now = Utc::now();

    let mut events = reference_events(now);
    // Current events drawn from the same population as the reference.
    for i in 0..10 {
        events.push(event(
            now - Duration::hours(i),
            0.10 + i as f64 * 0.002,
            vec![detection("car", 0.90)],
        ));
    }
    seed(&store, events).await;

    let engine = engine(&store, &workspace);
    engine
        .create_reference("reference-dataset", &ReferenceCriteria::default())
        .await
        .expect("reference builds");

    let report = engine
        .analyze("reference-dataset", CurrentWindow::trailing_days(7))
        .await
        .expect("analysis runs");

    assert!(!report.drift_detected, "{report:?}");
    assert!(report.features.iter().all(|f| !f.drifted));
    assert_eq!(workspace.reports().len(), 1);
}
