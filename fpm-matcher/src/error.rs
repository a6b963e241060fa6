//! Error types for fpm-matcher
//!
//! `PipelineError` is the taxonomy of the matching pipeline; `ApiError` is
//! what handlers return and maps each failure to a status code and the
//! `{success: false, error: {code, message}}` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Failures of the extraction / matching pipeline
///
/// None of these are retried: the toolkit is deterministic on identical input.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input image was empty, undecodable or out of bounds
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// External tool ran but signaled failure or produced no usable output
    #[error("{tool} failed: {message}")]
    ToolFailure {
        tool: String,
        message: String,
        /// Captured standard error of the tool, if any
        stderr: String,
    },

    /// External tool exceeded its wall-clock budget and was killed
    #[error("{tool} timed out after {}s", timeout.as_secs_f64())]
    ToolTimeout { tool: String, timeout: Duration },

    /// Artifact root could not be written or read
    #[error("Artifact I/O error: {0}")]
    Artifact(#[from] std::io::Error),
}

impl PipelineError {
    /// Tool failure without captured diagnostics
    pub fn tool_failure(tool: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ToolFailure {
            tool: tool.into(),
            message: message.into(),
            stderr: String::new(),
        }
    }

    /// Stable machine-readable code used in API responses
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "DECODE_ERROR",
            PipelineError::ToolFailure { .. } => "TOOL_FAILURE",
            PipelineError::ToolTimeout { .. } => "TOOL_TIMEOUT",
            PipelineError::Artifact(_) => "ARTIFACT_IO_ERROR",
        }
    }

    /// Human-readable message including captured stderr where present
    pub fn detail(&self) -> String {
        match self {
            PipelineError::ToolFailure { stderr, .. } if !stderr.trim().is_empty() => {
                format!("{}: {}", self, stderr.trim())
            }
            _ => self.to_string(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Toolkit not installed / not executable (503)
    #[error("Fingerprint toolkit unavailable: {0}")]
    ServiceUnavailable(String),

    /// Pipeline failure (status depends on kind)
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg,
            ),
            ApiError::Pipeline(ref err) => {
                let status = match err {
                    PipelineError::Decode(_) => StatusCode::BAD_REQUEST,
                    PipelineError::ToolFailure { .. } => StatusCode::BAD_GATEWAY,
                    PipelineError::ToolTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    PipelineError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.detail())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
