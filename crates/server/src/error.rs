//! Error handling for the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docmeta_core::Error;
use serde::Serialize;
use std::fmt;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_DOCUMENT", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("{}", self);
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ApiError::not_found(format!("File not found: {}", e))
            }
            Error::IoError(e) => ApiError::internal(format!("IO error: {}", e)),
            Error::UnsupportedFormat(msg) => ApiError::bad_request(format!("Unsupported file type: {}", msg)),
            Error::UnknownTransform(name) => ApiError::bad_request(format!("Unknown transform: {}", name)),
            Error::MissingInput(msg) => ApiError::not_found(msg),
            Error::TranslationError(msg) => ApiError::bad_gateway(format!("Translation failed: {}", msg)),
            Error::JsonError(e) => ApiError::unprocessable(format!("Invalid sidecar: {}", e)),
            other @ (Error::DocxParseError(_)
            | Error::PdfParseError(_)
            | Error::PptxParseError(_)
            | Error::ZipError(_)
            | Error::XmlError(_)
            | Error::ImageError(_)) => ApiError::unprocessable(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::internal(format!("Background task failed: {}", err))
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
