use crate::exporter::{BatchExporter, EnqueueStatus};
use chrono::Utc;
use schema::{Detection, PredictionEvent};
use uuid::Uuid;

/// Per-inference metadata accompanying the detection list.
#[derive(Debug, Clone, Copy)]
pub struct RecordMeta<'a> {
    pub processing_time_seconds: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub filename: &'a str,
    pub model_name: &'a str,
}

/// Converts one completed inference into a [`PredictionEvent`] and hands it
/// to the batch exporter.
///
/// `record` never blocks beyond a bounded enqueue and never errors toward
/// the caller: if telemetry is disabled or the event cannot be queued it
/// returns `None` and the detection result is unaffected.
pub struct TelemetryEmitter {
    exporter: Option<BatchExporter>,
}

impl TelemetryEmitter {
    pub fn new(exporter: BatchExporter) -> Self {
        Self {
            exporter: Some(exporter),
        }
    }

    /// Emitter that records nothing, for deployments without a trace store.
    pub fn disabled() -> Self {
        Self { exporter: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.exporter.is_some()
    }

    /// Record one inference. An empty detection list is a valid outcome and
    /// is recorded like any other.
    pub fn record(&self, detections: &[Detection], meta: RecordMeta<'_>) -> Option<Uuid> {
        let exporter = self.exporter.as_ref()?;

        let event = PredictionEvent {
            prediction_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            processing_time_seconds: meta.processing_time_seconds,
            image_width: meta.image_width,
            image_height: meta.image_height,
            filename: meta.filename.to_string(),
            model_name: meta.model_name.to_string(),
            detections: detections.to_vec(),
        };
        let prediction_id = event.prediction_id;

        match exporter.enqueue(event) {
            EnqueueStatus::Queued => Some(prediction_id),
            EnqueueStatus::Dropped => None,
        }
    }
}
