//! HTTP API handlers for fpm-matcher
//!
//! Every matching endpoint answers with a `success` flag; failures use the
//! envelope produced by [`crate::ApiError`].

pub mod batch;
pub mod compare;
pub mod extract;
pub mod health;

pub use health::health_routes;

use axum::extract::rejection::JsonRejection;
use axum::{routing::post, Json, Router};
use base64::{engine::general_purpose, Engine as _};

use crate::error::{ApiError, PipelineError};
use crate::AppState;

/// Build extraction and comparison routes
pub fn matching_routes() -> Router<AppState> {
    Router::new()
        .route("/extract", post(extract::extract_minutiae))
        .route("/compare", post(compare::compare_fingerprints))
        .route("/batch-compare", post(batch::batch_compare))
}

/// Turn axum's JSON rejection into the common error envelope
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Decode a transport-encoded (base64) image
///
/// Whitespace anywhere in the payload is ignored, so line-wrapped (MIME
/// style) base64 decodes the same as a single line.
pub(crate) fn decode_image(field: &str, encoded: &str) -> Result<Vec<u8>, PipelineError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| PipelineError::Decode(format!("{} is not valid base64: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_image() {
        assert_eq!(decode_image("image", " aGVsbG8= \n").unwrap(), b"hello");
        let err = decode_image("image1", "%%%").unwrap_err();
        assert!(err.to_string().contains("image1 is not valid base64"));
    }

    #[test]
    fn test_decode_image_ignores_embedded_line_breaks() {
        assert_eq!(
            decode_image("image", "aGVsbG8g\nd29ybGQ=").unwrap(),
            b"hello world"
        );
        assert_eq!(
            decode_image("image", "aGVs\r\nbG8g\td29y bGQ=\n").unwrap(),
            b"hello world"
        );
    }
}
