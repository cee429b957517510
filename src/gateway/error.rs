//! Mapping from service errors to HTTP responses.
//!
//! Every error body has the shape `{"detail": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ClipchatError;
use crate::log_component;

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

/// HTTP status for a service error.
///
/// Client mistakes are 4xx. Generator failures are 5xx: 502 when the model
/// answered with something unusable, 504 when it did not answer in time,
/// 500 otherwise.
pub fn status_for(err: &ClipchatError) -> StatusCode {
    match err {
        ClipchatError::InvalidUpload(_)
        | ClipchatError::InvalidInput(_)
        | ClipchatError::Session(_) => StatusCode::BAD_REQUEST,
        ClipchatError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ClipchatError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,
        ClipchatError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ClipchatError::Provider(_)
        | ClipchatError::ProviderTyped(_)
        | ClipchatError::Transcription(_)
        | ClipchatError::TokenCount(_)
        | ClipchatError::Config(_)
        | ClipchatError::Io(_)
        | ClipchatError::Json(_)
        | ClipchatError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ClipchatError> for ApiError {
    fn from(err: ClipchatError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            log_component!(
                error,
                "gateway",
                "Request failed",
                status = status.as_u16(),
                error = err.to_string(),
            );
        }
        Self::new(status, err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
