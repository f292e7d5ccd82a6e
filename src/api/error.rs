use crate::services::pipeline::PipelineError;
use crate::services::record_store::RecordError;
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError::Pipeline(err.into())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}

/// Status code for a pipeline failure.
pub fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::UnsupportedMediaType(_) => StatusCode::BAD_REQUEST,
        PipelineError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::NotOwner => StatusCode::UNAUTHORIZED,
        PipelineError::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Pipeline(e) => {
                let status = pipeline_status(&e);
                if status.is_server_error() {
                    tracing::error!(kind = ?e.kind(), "Pipeline error: {}", e);
                }
                (status, e.public_message())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
