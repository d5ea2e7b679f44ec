use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("{0}")]
    ModelNotReady(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Detection inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DetectError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DetectError::ModelNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            DetectError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            DetectError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            DetectError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DetectError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            DetectError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DetectError::Base64(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DetectError::ModelNotReady(_) => "MODEL_NOT_READY",
            DetectError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            DetectError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            DetectError::Inference(_) => "INFERENCE_ERROR",
            DetectError::InvalidInput(_) => "INVALID_INPUT",
            DetectError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            DetectError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            DetectError::Config(_) => "CONFIG_ERROR",
            DetectError::Base64(_) => "BASE64_DECODE_ERROR",
            DetectError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for DetectError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
