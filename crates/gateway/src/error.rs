use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::DetectError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;

/// Name of the multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Missing multipart field `file`")]
    MissingFile,

    #[error(transparent)]
    Detection(#[from] DetectError),

    #[error("Detection task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Multipart(e) => e.status(),
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Detection(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Multipart(_) => "multipart",
            ApiError::MissingFile => "missing_file",
            ApiError::Detection(DetectError::Decode(_)) => "decode",
            ApiError::Detection(DetectError::Preprocess(_)) => "preprocess",
            ApiError::Detection(DetectError::Inference(_)) => "inference",
            ApiError::Detection(DetectError::UnknownLabel { .. }) => "unknown_label",
            ApiError::Detection(DetectError::Unavailable(_)) => "unavailable",
            ApiError::Task(_) => "task",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Detection request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Rejected detection request");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
