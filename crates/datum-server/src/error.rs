//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use datum_core::error::DatumError;
use serde::Serialize;
use std::fmt;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    /// Store error code (`DAT_001`, `REF_002`, ...) when the error came from the store.
    pub datum_code: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            datum_code: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_datum_code(mut self, code: &'static str) -> Self {
        self.datum_code = Some(code);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "INVALID_REFERENCE", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum_code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
                datum_code: self.datum_code.map(str::to_string),
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from datum-core errors
impl From<DatumError> for ApiError {
    fn from(err: DatumError) -> Self {
        let code = err.code();
        let api_error = match err {
            DatumError::NotFound { message, .. } => ApiError::not_found(message),
            DatumError::InvalidReference { message, .. } => ApiError::invalid_reference(message),
            DatumError::Validation {
                message, details, ..
            } => {
                let api_error = ApiError::validation(message);
                if details.is_empty() {
                    api_error
                } else {
                    api_error.with_details(serde_json::json!(details))
                }
            }
            DatumError::Configuration(msg) => ApiError::bad_request(msg),
            DatumError::Storage { message, .. } => {
                ApiError::internal(format!("Storage error: {}", message))
            }
            DatumError::Network { message, .. } => {
                ApiError::internal(format!("Network error: {}", message))
            }
            DatumError::Serialization(e) => {
                ApiError::internal(format!("Serialization error: {}", e))
            }
            DatumError::Io(e) => ApiError::internal(format!("IO error: {}", e)),
            DatumError::Internal(msg) => ApiError::internal(msg),
        };

        if api_error.status.is_server_error() {
            tracing::error!(code = code.as_str(), message = %api_error.message, "Store operation failed");
        }
        api_error.with_datum_code(code.as_str())
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
