//! POST /extract - single-image minutiae extraction

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{decode_image, json_body};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Label used when the caller supplies no id
const DEFAULT_LABEL: &str = "temp";

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    /// Base64-encoded image
    pub image: Option<String>,
    /// Caller-chosen identifier; decorates artifact names only
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub minutiae_count: usize,
    /// Raw `.xyt` template text
    pub xyt_data: String,
    pub message: String,
}

/// POST /extract
pub async fn extract_minutiae(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
    state.require_toolkit()?;
    let request = json_body(payload)?;

    let encoded = request
        .image
        .ok_or_else(|| ApiError::BadRequest("Missing image data".to_string()))?;
    let label = request.id.unwrap_or_else(|| DEFAULT_LABEL.to_string());

    let image = decode_image("image", &encoded)?;
    let template = state.backend.extract(image, &label).await?;
    let minutiae_count = template.count();

    info!(id = %label, minutiae = minutiae_count, "Extraction request complete");

    Ok(Json(ExtractResponse {
        success: true,
        minutiae_count,
        xyt_data: template.as_xyt().to_string(),
        message: format!("Extracted {} minutiae points", minutiae_count),
    }))
}
