use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;
use inference::PoolError;
use schema::Detection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use telemetry::RecordMeta;
use tower_http::cors::CorsLayer;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/detect", get(detect_get).post(detect_post))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": "object-detection gateway",
        "model": &*state.model_name,
        "endpoints": ["/detect", "/health"],
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.pool.status();
    Json(json!({
        "status": "ok",
        "model": &*state.model_name,
        "replicas": status.replicas,
        "in_flight": status.in_flight,
        "waiting": status.waiting,
        "telemetry_enabled": state.emitter.is_enabled(),
    }))
}

#[derive(Deserialize)]
pub struct DetectRequest {
    /// Base64-encoded image bytes.
    pub image_data: Option<String>,
    pub image_url: Option<String>,
    pub filename: Option<String>,
}

#[derive(Deserialize)]
pub struct DetectQuery {
    /// Validated by the handler so a missing parameter produces the same
    /// error object as the POST surface.
    pub image_url: Option<String>,
    pub filename: Option<String>,
}

#[derive(Serialize)]
pub struct ObjectResult {
    pub class: String,
    pub coordinates: [f32; 4],
}

#[derive(Serialize)]
pub struct DetectResponse {
    pub status: &'static str,
    pub objects: Vec<ObjectResult>,
}

async fn detect_get(
    State(state): State<AppState>,
    Query(query): Query<DetectQuery>,
) -> Result<Json<DetectResponse>, ApiError> {
    let url = query.image_url.ok_or_else(|| {
        ApiError::InvalidRequest("the image_url query parameter is required".to_string())
    })?;
    let filename = query.filename.unwrap_or_else(|| filename_from_url(&url));
    let bytes = fetch_image_bytes(&state, &url).await?;
    detect(state, &bytes, filename).await
}

async fn detect_post(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    // Exactly one image source per request.
    let (bytes, filename) = match (request.image_data, request.image_url) {
        (Some(_), Some(_)) => {
            return Err(ApiError::InvalidRequest(
                "supply either image_data or image_url, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(ApiError::InvalidRequest(
                "one of image_data or image_url is required".to_string(),
            ));
        }
        (Some(data), None) => {
            let bytes = BASE64
                .decode(data.as_bytes())
                .map_err(|e| ApiError::DecodeError(format!("invalid base64 image data: {e}")))?;
            let filename = request.filename.unwrap_or_else(|| "upload".to_string());
            (bytes, filename)
        }
        (None, Some(url)) => {
            let filename = request
                .filename
                .unwrap_or_else(|| filename_from_url(&url));
            (fetch_image_bytes(&state, &url).await?, filename)
        }
    };

    detect(state, &bytes, filename).await
}

async fn fetch_image_bytes(state: &AppState, url: &str) -> Result<Vec<u8>, ApiError> {
    let response = state
        .http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ApiError::DecodeError(format!("failed to fetch image: {e}")))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::DecodeError(format!("failed to read image body: {e}")))?;
    Ok(bytes.to_vec())
}

fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(url)
        .to_string()
}

async fn detect(
    state: AppState,
    bytes: &[u8],
    filename: String,
) -> Result<Json<DetectResponse>, ApiError> {
    state.metrics.requests.add(1, &[]);

    let image = image::load_from_memory(bytes)
        .map_err(|e| ApiError::DecodeError(format!("invalid image: {e}")))?;

    // Run dispatch and telemetry on a detached task: a client disconnect
    // aborts the handler future, and the telemetry attempt must survive it.
    let task = tokio::spawn(dispatch_and_record(state, image, filename));
    match task.await {
        Ok(result) => result.map(Json),
        Err(e) => Err(ApiError::Internal(anyhow::anyhow!(
            "detection task failed: {e}"
        ))),
    }
}

/// One dispatch with exactly one telemetry attempt, success or failure.
async fn dispatch_and_record(
    state: AppState,
    image: DynamicImage,
    filename: String,
) -> Result<DetectResponse, ApiError> {
    let (width, height) = (image.width(), image.height());
    let started = Instant::now();
    let result = state.pool.infer(&image).await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(detections) => {
            state.metrics.request_duration.record(elapsed, &[]);
            state.metrics.detections.add(detections.len() as u64, &[]);

            state.emitter.record(
                &detections,
                RecordMeta {
                    processing_time_seconds: elapsed,
                    image_width: width,
                    image_height: height,
                    filename: &filename,
                    model_name: &state.model_name,
                },
            );
            Ok(build_response(detections))
        }
        Err(e) => {
            // Timeouts are recorded at the configured bound rather than the
            // measured elapsed time, which depends on scheduling jitter.
            let recorded_seconds = match &e {
                PoolError::WorkerTimeout(t) | PoolError::WorkerUnavailable(t) => t.as_secs_f64(),
                PoolError::Inference(_) => elapsed,
            };
            state.emitter.record(
                &[],
                RecordMeta {
                    processing_time_seconds: recorded_seconds,
                    image_width: width,
                    image_height: height,
                    filename: &filename,
                    model_name: &state.model_name,
                },
            );
            Err(e.into())
        }
    }
}

fn build_response(detections: Vec<Detection>) -> DetectResponse {
    let status = if detections.is_empty() {
        "not_found"
    } else {
        "found"
    };
    let objects = detections
        .into_iter()
        .map(|d| ObjectResult {
            class: d.class_name,
            coordinates: [d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2],
        })
        .collect();

    DetectResponse { status, objects }
}
