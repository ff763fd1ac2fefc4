// HTTP route handlers for the voxel gateway

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use voxel_core::DispatchError;

use crate::{metrics, AppState};

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub image: String,
    pub metrics: MetricsBody,
}

#[derive(Debug, Serialize)]
pub struct MetricsBody {
    pub volume: f64,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ModelListing {
    pub id: String,
    pub image: String,
}

fn bad_request(reason: &str, message: String) -> Response {
    metrics::record_job_rejected(reason);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}

/// Map a dispatch failure to its HTTP status
fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::UnknownModel(_) => StatusCode::BAD_REQUEST,
        DispatchError::ExecutorUnavailable(_) | DispatchError::ExecutionTimeout { .. } => {
            StatusCode::BAD_GATEWAY
        }
        DispatchError::StagingFailure(_)
        | DispatchError::NonZeroExit { .. }
        | DispatchError::MissingOutput(_)
        | DispatchError::MalformedOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /process - dispatch one inference request
///
/// Multipart form with two required fields, accepted in any order:
/// - `model`: a registered model id
/// - `file`: the study to run inference on (original filename preserved)
pub async fn process(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut model_id: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return bad_request("malformed_multipart", format!("invalid multipart body: {}", e))
            }
        };

        // Capture borrowed metadata before the field is consumed
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("model") => match field.text().await {
                Ok(text) => model_id = Some(text),
                Err(e) => {
                    return bad_request(
                        "malformed_multipart",
                        format!("invalid model field: {}", e),
                    )
                }
            },
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        return bad_request(
                            "malformed_multipart",
                            format!("invalid file field: {}", e),
                        )
                    }
                }
            }
            // Unknown fields are ignored rather than rejected
            _ => {}
        }
    }

    let Some(model_id) = model_id else {
        return bad_request("missing_field", "missing required field: model".to_string());
    };
    let Some((filename, file_bytes)) = upload else {
        return bad_request("missing_field", "missing required field: file".to_string());
    };

    metrics::record_job_submitted(&model_id);
    metrics::JOBS_INFLIGHT.inc();
    let started = Instant::now();

    let result = state.dispatcher.handle(&model_id, &filename, &file_bytes).await;

    metrics::JOBS_INFLIGHT.dec();
    let elapsed_ms = started.elapsed().as_millis() as f64;

    match result {
        Ok(inference) => {
            metrics::record_job_completed(&model_id, "succeeded", elapsed_ms);
            (
                StatusCode::OK,
                Json(ProcessResponse {
                    image: general_purpose::STANDARD.encode(&inference.image_bytes),
                    metrics: MetricsBody {
                        volume: inference.volume,
                        confidence: inference.confidence,
                    },
                }),
            )
                .into_response()
        }
        Err(e) => {
            metrics::record_job_completed(&model_id, e.kind(), elapsed_ms);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health - health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /models - registered model ids and image references
pub async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let models: Vec<ModelListing> = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| ModelListing {
            id: d.id.clone(),
            image: d.image.clone(),
        })
        .collect();
    Json(models)
}

/// GET /metrics - Prometheus text format
pub async fn metrics_endpoint() -> impl IntoResponse {
    metrics::render_metrics()
}
