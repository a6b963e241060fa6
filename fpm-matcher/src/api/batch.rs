//! POST /batch-compare - one query against an ordered gallery

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode_image, json_body};
use crate::error::{ApiError, ApiResult, PipelineError};
use crate::services::batch_ranker::{BestMatch, CandidateMatch, CandidateResult};
use crate::services::confidence_scorer::QualityTier;
use crate::services::{BatchRanker, Candidate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchEntry {
    /// Any JSON scalar; strings are used verbatim, other values are rendered
    /// as JSON text, and a missing id becomes the entry's position
    pub id: Option<Value>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub query_image: Option<String>,
    pub database: Option<Vec<BatchEntry>>,
}

/// Scored candidate as reported to clients
#[derive(Debug, Serialize)]
pub struct MatchEntry {
    pub id: String,
    pub score: u32,
    pub confidence: f64,
    pub matched: bool,
    pub match_quality: QualityTier,
    pub minutiae_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Candidate that could not be compared
#[derive(Debug, Serialize)]
pub struct FailedEntry {
    pub id: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CandidateEntry {
    Scored(MatchEntry),
    Failed(FailedEntry),
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub matches: Vec<CandidateEntry>,
    pub best_match: Option<MatchEntry>,
    pub total_compared: usize,
    pub query_minutiae: usize,
}

/// POST /batch-compare
pub async fn batch_compare(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResponse>> {
    state.require_toolkit()?;
    let request = json_body(payload)?;

    let (Some(query), Some(database)) = (request.query_image, request.database) else {
        return Err(ApiError::BadRequest("Missing data".to_string()));
    };

    let query_image = decode_image("query_image", &query)?;

    // A bad entry is subject to the batch failure policy like any other
    // candidate error, so its decode failure travels with the candidate.
    let mut candidates = Vec::with_capacity(database.len());
    for (index, entry) in database.into_iter().enumerate() {
        let id = candidate_id(entry.id, index);
        let image = match entry.image {
            Some(encoded) => decode_image("image", &encoded),
            None => Err(PipelineError::Decode("Missing image data".to_string())),
        };
        candidates.push(Candidate { id, image });
    }

    let total_compared = candidates.len();
    let ranker = BatchRanker::new(state.backend.clone(), state.batch_policy);
    let result = ranker.rank(query_image, candidates).await?;

    Ok(Json(BatchResponse {
        success: true,
        matches: result.per_candidate.into_iter().map(candidate_entry).collect(),
        best_match: result.best_match.map(best_entry),
        total_compared,
        query_minutiae: result.query_template_count,
    }))
}

fn candidate_id(id: Option<Value>, index: usize) -> String {
    match id {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => index.to_string(),
        Some(other) => other.to_string(),
    }
}

fn match_entry(id: String, found: &CandidateMatch) -> MatchEntry {
    MatchEntry {
        id,
        score: found.result.raw_score,
        confidence: found.result.confidence,
        matched: found.result.matched,
        match_quality: found.result.quality_tier,
        minutiae_count: found.template_count,
    }
}

fn candidate_entry(result: CandidateResult) -> CandidateEntry {
    match result.outcome {
        Ok(found) => CandidateEntry::Scored(match_entry(result.candidate_id, &found)),
        Err(e) => CandidateEntry::Failed(FailedEntry {
            id: result.candidate_id,
            error: ErrorDetail {
                code: e.code(),
                message: e.detail(),
            },
        }),
    }
}

fn best_entry(best: BestMatch) -> MatchEntry {
    MatchEntry {
        id: best.candidate_id,
        score: best.result.raw_score,
        confidence: best.result.confidence,
        matched: best.result.matched,
        match_quality: best.result.quality_tier,
        minutiae_count: best.template_count,
    }
}
