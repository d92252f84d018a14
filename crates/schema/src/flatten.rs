use crate::event::PredictionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One per-detection analysis row: the features drift analysis runs on.
///
/// An event with N detections expands to N rows; an event with none
/// contributes no rows. `object_index` preserves the detector's emission
/// order within the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub prediction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub class_name: String,
    pub confidence: f64,
    pub processing_time: f64,
    pub object_index: usize,
}

/// Expand one prediction event into per-detection rows.
pub fn flatten_event(event: &PredictionEvent) -> Vec<FeatureRow> {
    event
        .detections
        .iter()
        .enumerate()
        .map(|(object_index, det)| FeatureRow {
            prediction_id: event.prediction_id,
            timestamp: event.timestamp,
            class_name: det.class_name.clone(),
            confidence: det.confidence as f64,
            processing_time: event.processing_time_seconds,
            object_index,
        })
        .collect()
}

/// Flatten a batch of events, preserving event order then detection order.
pub fn flatten_events(events: &[PredictionEvent]) -> Vec<FeatureRow> {
    events.iter().flat_map(flatten_event).collect()
}
