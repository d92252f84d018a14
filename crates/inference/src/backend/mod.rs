use image::DynamicImage;
use schema::Detection;
use std::path::Path;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[cfg(feature = "ort-backend")]
pub use ort::OrtDetector;

pub mod classes;

/// Black-box detection model: decoded image in, located objects out.
///
/// Implementations must be safe to call from concurrent router requests;
/// the worker pool shares each instance behind an `Arc`.
pub trait ObjectDetector: Send + Sync {
    /// Model identifier recorded on every telemetry event.
    fn name(&self) -> &str;

    fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>>;
}

/// A detector that can be instantiated from a model file, so the pool can
/// create additional instances when scaling up.
pub trait DetectorBackend: ObjectDetector {
    fn load_model(path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;
}
