//! Error types for the BIO600 scan server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Device not connected")]
    DeviceNotConnected,

    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Poor image quality or no finger detected (score {0})")]
    PoorQuality(i32),

    #[error("No finger detected")]
    NoFingerDetected,

    #[error("Finger quality too low for template: {0}")]
    LowFingerQuality(i32),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code, shared by the HTTP and WebSocket surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::DeviceNotConnected => "DEVICE_NOT_CONNECTED",
            Error::AcquisitionFailed(_) => "ACQUISITION_FAILED",
            Error::PoorQuality(_) => "POOR_QUALITY",
            Error::NoFingerDetected => "NO_FINGER_DETECTED",
            Error::LowFingerQuality(_) => "LOW_FINGER_QUALITY",
            Error::Timeout(_) => "TIMEOUT",
            Error::InvalidFormat(_) => "INVALID_FORMAT",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DeviceNotConnected => StatusCode::SERVICE_UNAVAILABLE,
            Error::PoorQuality(_) | Error::NoFingerDetected | Error::LowFingerQuality(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error_code = self.code();

        let message = self.to_string();
        tracing::error!(error_code = error_code, message = %message, "API error");

        let body = Json(json!({
            "error_code": error_code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
