pub mod event;
pub mod flatten;

pub use event::{BoundingBox, Detection, PREDICTION_EVENT_NAME, PredictionEvent};
pub use flatten::{FeatureRow, flatten_event, flatten_events};
