use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event name every prediction record carries on the trace-store wire.
/// The store's query contract filters on it.
pub const PREDICTION_EVENT_NAME: &str = "object_prediction";

/// Axis-aligned box in pixel coordinates, `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_ordered(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// One located, classified object from a single inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Full telemetry record for one inference.
///
/// Created exactly once per inference and never mutated afterwards; the
/// detection order is the detector's emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEvent {
    pub prediction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub image_width: u32,
    pub image_height: u32,
    pub filename: String,
    pub model_name: String,
    pub detections: Vec<Detection>,
}

impl PredictionEvent {
    pub fn total_objects(&self) -> usize {
        self.detections.len()
    }
}
