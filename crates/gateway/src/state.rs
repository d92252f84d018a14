use inference::WorkerPool;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use std::sync::Arc;
use telemetry::TelemetryEmitter;

/// Router-side service metrics, separate from per-prediction telemetry.
pub struct RouterMetrics {
    pub request_duration: Histogram<f64>,
    pub requests: Counter<u64>,
    pub detections: Counter<u64>,
}

pub fn init_metrics(meter_name: &'static str) -> RouterMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 10.0,
    ];
    let request_duration: Histogram<f64> = meter
        .f64_histogram("detect_request_duration_seconds")
        .with_description("Wall time of a detection request (decode + dispatch + inference)")
        .with_unit("s")
        .with_boundaries(latency_buckets.to_vec())
        .build();
    let requests: Counter<u64> = meter
        .u64_counter("detect_requests_total")
        .with_description("Total detection requests received")
        .build();
    let detections: Counter<u64> = meter
        .u64_counter("detections_total")
        .with_description("Total objects detected")
        .build();

    RouterMetrics {
        request_duration,
        requests,
        detections,
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: WorkerPool,
    pub emitter: Arc<TelemetryEmitter>,
    pub http: reqwest::Client,
    pub model_name: Arc<str>,
    pub metrics: Arc<RouterMetrics>,
}
