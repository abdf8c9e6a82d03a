use crate::{
    error::{ApiError, UPLOAD_FIELD},
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
};
use inference::Detection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub detections: Vec<Detection>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Object detection API is running".to_string(),
    })
}

/// Run the detector on the image uploaded in the `file` field.
#[tracing::instrument(skip_all)]
pub async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>, ApiError> {
    let start = Instant::now();

    let outcome = run_detection(&state, &mut multipart).await;

    match outcome {
        Ok(detections) => {
            state
                .metrics
                .record_success(start.elapsed(), detections.len());
            tracing::info!(
                detections = detections.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Detection completed"
            );
            Ok(Json(DetectionResponse { detections }))
        }
        Err(err) => {
            state.metrics.record_failure(start.elapsed(), err.reason());
            Err(err)
        }
    }
}

async fn run_detection(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<Vec<Detection>, ApiError> {
    let image = read_upload(multipart).await?;
    tracing::debug!(bytes = image.len(), "Upload received");

    // Decoding and inference are CPU-bound
    let detector = Arc::clone(&state.detector);
    let detections = tokio::task::spawn_blocking(move || detector.detect(&image)).await??;

    Ok(detections)
}

async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            return Ok(field.bytes().await?);
        }
    }

    Err(ApiError::MissingFile)
}
