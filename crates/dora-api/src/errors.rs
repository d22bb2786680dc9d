//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use dora_core::{DoraError, ErrorCategory, ParserError, ValidationError};
use tracing::{error, warn};

/// Seconds a webhook sender should wait before retrying a transient failure
const RETRY_AFTER_SECONDS: u64 = 60;

/// Invalid metrics or last-deployment query parameters
///
/// All variants map to `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Query out of range: {message}")]
    OutOfRangeQuery { message: String },

    #[error("Too many input parameters: {message}")]
    TooManyInputParams { message: String },

    #[error("Missing required input parameters: {params}")]
    MissingRequiredInputParams { params: String },

    #[error("Invalid value '{value}' for parameter '{param}'")]
    InvalidInputParam { param: String, value: String },
}

/// Handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: invalid query parameters, malformed or incomplete
///   webhooks, unknown event types
/// - `500 Internal Server Error`: configuration problems and permanent
///   storage failures
/// - `503 Service Unavailable`: transient storage or story API failures, sent
///   with a `Retry-After` header
///
/// Internal details are logged server-side; the client receives a generic
/// message for `500` responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Processing failed: {0}")]
    ProcessingFailed(#[from] DoraError),
}

impl From<ParserError> for ApiError {
    fn from(error: ParserError) -> Self {
        Self::ProcessingFailed(DoraError::Parser(error))
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::ProcessingFailed(DoraError::Validation(error))
    }
}

impl ApiError {
    /// Status code and retry hint for this error
    pub fn status(&self) -> (StatusCode, Option<u64>) {
        match self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, None),
            // A storage fault is never the client's fault
            Self::ProcessingFailed(DoraError::Storage(e)) if !e.is_transient() => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            Self::ProcessingFailed(e) => match e.error_category() {
                ErrorCategory::Permanent => (StatusCode::BAD_REQUEST, None),
                ErrorCategory::Transient => {
                    (StatusCode::SERVICE_UNAVAILABLE, Some(RETRY_AFTER_SECONDS))
                }
                ErrorCategory::Configuration => (StatusCode::INTERNAL_SERVER_ERROR, None),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retry_after) = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Log detailed error server-side but return generic message to client
            error!(error = %self, "Internal server error occurred");
            "Internal server error occurred. Please try again later.".to_string()
        } else {
            if retry_after.is_some() {
                warn!(error = %self, "Transient failure, asking client to retry");
            }
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },
}

impl ServiceError {
    /// Process exit code for this failure
    ///
    /// Configuration failures exit with 3 before the server is started.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Invalid Shortcut configuration: {0}")]
    Shortcut(#[from] ParserError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
