use super::{DetectorBackend, ObjectDetector, classes};
use image::DynamicImage;
use ndarray::{Array, ArrayD, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use schema::{BoundingBox, Detection};
use std::path::Path;
use std::sync::Mutex;

pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// ONNX Runtime detector.
///
/// Expects a DETR-style export: inputs `images` (NCHW f32, 0-1) and
/// `orig_target_sizes` ([w, h] i64); outputs `labels`, `boxes` (pixel
/// coordinates in the original image) and `scores` per query.
pub struct OrtDetector {
    session: Mutex<Session>,
    model_name: String,
    input_size: (u32, u32),
    confidence_threshold: f32,
}

impl OrtDetector {
    pub fn load_with_threshold(path: &Path, confidence_threshold: f32) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(4)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(path)?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        tracing::info!(path = %path.display(), model = %model_name, "Model loaded");

        Ok(Self {
            session: Mutex::new(session),
            model_name,
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold,
        })
    }
}

impl DetectorBackend for OrtDetector {
    fn load_model(path: &Path) -> anyhow::Result<Self> {
        Self::load_with_threshold(path, DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl ObjectDetector for OrtDetector {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn infer(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        let (width, height) = (image.width(), image.height());
        let (input, orig_sizes) = preprocess(image, self.input_size);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("detector session lock poisoned"))?;

        let outputs = session.run(ort::inputs![
            "images" => TensorRef::from_array_view(input.view())?,
            "orig_target_sizes" => TensorRef::from_array_view(orig_sizes.view())?
        ])?;

        let labels = outputs["labels"].try_extract_array::<i64>()?.into_owned();
        let boxes = outputs["boxes"].try_extract_array::<f32>()?.into_owned();
        let scores = outputs["scores"].try_extract_array::<f32>()?.into_owned();

        Ok(parse_detections(
            &labels,
            &boxes,
            &scores,
            self.confidence_threshold,
            width,
            height,
        ))
    }
}

/// Resize to the model input and lay out NCHW in 0-1 floats, plus the
/// original [w, h] tensor the model rescales boxes with.
fn preprocess(image: &DynamicImage, input_size: (u32, u32)) -> (ArrayD<f32>, ArrayD<i64>) {
    let (in_w, in_h) = input_size;
    let resized = image
        .resize_exact(in_w, in_h, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut input = Array::zeros(IxDyn(&[1, 3, in_h as usize, in_w as usize]));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    let orig_sizes =
        ndarray::arr2(&[[image.width() as i64, image.height() as i64]]).into_dyn();

    (input, orig_sizes)
}

/// Keep queries above the confidence threshold and clamp their boxes to
/// the image bounds.
fn parse_detections(
    labels: &ArrayD<i64>,
    boxes: &ArrayD<f32>,
    scores: &ArrayD<f32>,
    threshold: f32,
    width: u32,
    height: u32,
) -> Vec<Detection> {
    let num_queries = scores.shape().get(1).copied().unwrap_or(0);
    let mut detections = Vec::new();

    for i in 0..num_queries {
        let confidence = scores[[0, i]];
        if confidence < threshold {
            continue;
        }

        let x1 = boxes[[0, i, 0]].clamp(0.0, width as f32);
        let y1 = boxes[[0, i, 1]].clamp(0.0, height as f32);
        let x2 = boxes[[0, i, 2]].clamp(0.0, width as f32);
        let y2 = boxes[[0, i, 3]].clamp(0.0, height as f32);
        if x2 < x1 || y2 < y1 {
            continue;
        }

        detections.push(Detection {
            class_name: classes::class_name(labels[[0, i]]),
            confidence,
            bbox: BoundingBox::new(x1, y1, x2, y2),
        });
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr3;

    fn sample_outputs() -> (ArrayD<i64>, ArrayD<f32>, ArrayD<f32>) {
        let labels = ndarray::arr2(&[[2_i64, 0, 7]]).into_dyn();
        let boxes = arr3(&[[
            [10.0_f32, 20.0, 110.0, 220.0],
            [-5.0, 0.0, 30.0, 700.0],
            [40.0, 40.0, 35.0, 90.0],
        ]])
        .into_dyn();
        let scores = ndarray::arr2(&[[0.91_f32, 0.65, 0.88]]).into_dyn();
        (labels, boxes, scores)
    }

    #[test]
    fn parse_keeps_confident_queries_and_clamps_boxes() {
        let (labels, boxes, scores) = sample_outputs();
        let detections = parse_detections(&labels, &boxes, &scores, 0.5, 640, 480);

        // The third query has an inverted box and is discarded.
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_name, "car");
        assert_eq!(detections[1].class_name, "person");
        assert_eq!(detections[1].bbox.x1, 0.0);
        assert_eq!(detections[1].bbox.y2, 480.0);
        assert!(detections.iter().all(|d| d.bbox.is_ordered()));
    }

    #[test]
    fn parse_applies_the_confidence_threshold() {
        let (labels, boxes, scores) = sample_outputs();
        let detections = parse_detections(&labels, &boxes, &scores, 0.9, 640, 480);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_name, "car");
    }

    #[test]
    fn preprocess_produces_nchw_input_and_orig_sizes() {
        let image = DynamicImage::new_rgb8(320, 240);
        let (input, orig_sizes) = preprocess(&image, (640, 640));
        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        assert_eq!(orig_sizes.shape(), &[1, 2]);
        assert_eq!(orig_sizes[[0, 0]], 320);
        assert_eq!(orig_sizes[[0, 1]], 240);
    }
}
