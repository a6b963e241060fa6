//! POST /compare - one-to-one verification

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{decode_image, json_body};
use crate::error::{ApiError, ApiResult};
use crate::services::confidence_scorer::{self, QualityTier, MATCH_THRESHOLD};
use crate::AppState;

/// Scoring method reported to clients
pub const METHOD: &str = "NIST_NBIS_BOZORTH3";

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub image1: Option<String>,
    pub image2: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareDetails {
    pub minutiae_count_1: usize,
    pub minutiae_count_2: usize,
    pub match_quality: QualityTier,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub success: bool,
    pub matched: bool,
    /// Raw matcher score
    pub score: u32,
    pub confidence: f64,
    pub threshold: u32,
    pub method: &'static str,
    pub details: CompareDetails,
}

/// POST /compare
pub async fn compare_fingerprints(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> ApiResult<Json<CompareResponse>> {
    state.require_toolkit()?;
    let request = json_body(payload)?;

    let (Some(encoded1), Some(encoded2)) = (request.image1, request.image2) else {
        return Err(ApiError::BadRequest("Missing image data".to_string()));
    };

    let image1 = decode_image("image1", &encoded1)?;
    let image2 = decode_image("image2", &encoded2)?;

    // Each extraction allocates its own namespace, so both can run at once.
    let (template1, template2) = tokio::try_join!(
        state.backend.extract(image1, "image1"),
        state.backend.extract(image2, "image2"),
    )?;

    let raw_score = state.backend.compare(&template1, &template2).await?;
    let result = confidence_scorer::score(raw_score);

    info!(
        score = raw_score,
        matched = result.matched,
        confidence = result.confidence,
        minutiae_1 = template1.count(),
        minutiae_2 = template2.count(),
        "Comparison complete"
    );

    Ok(Json(CompareResponse {
        success: true,
        matched: result.matched,
        score: result.raw_score,
        confidence: result.confidence,
        threshold: MATCH_THRESHOLD,
        method: METHOD,
        details: CompareDetails {
            minutiae_count_1: template1.count(),
            minutiae_count_2: template2.count(),
            match_quality: result.quality_tier,
        },
    }))
}
