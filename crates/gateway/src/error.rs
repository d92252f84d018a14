use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inference::PoolError;
use serde_json::json;

/// Serving-path failures surfaced to the HTTP caller.
///
/// Telemetry failures never appear here: they are swallowed inside the
/// emitter so they cannot fail a detection request.
#[derive(Debug)]
pub enum ApiError {
    /// Request shape is wrong (neither or both image sources supplied,
    /// missing fields).
    InvalidRequest(String),
    /// Image bytes could not be obtained or decoded.
    DecodeError(String),
    /// Worker pool refused or failed the dispatch.
    Pool(PoolError),
    Internal(anyhow::Error),
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::DecodeError(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Pool(e @ PoolError::WorkerUnavailable(_)) => {
                tracing::warn!(error = %e, "detection refused, no worker available");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Pool(e @ PoolError::WorkerTimeout(_)) => {
                tracing::warn!(error = %e, "detection timed out");
                (StatusCode::GATEWAY_TIMEOUT, e.to_string())
            }
            ApiError::Pool(PoolError::Inference(e)) => {
                tracing::error!(error = %e, "inference failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "inference failed".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
