//! Health and readiness endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;

use crate::services::Tool;
use crate::AppState;

/// Per-tool readiness details
#[derive(Debug, Serialize)]
pub struct NbisDetails {
    pub cwsq_path: PathBuf,
    pub cwsq_exists: bool,
    pub cwsq_executable: bool,
    pub mindtct_path: PathBuf,
    pub mindtct_exists: bool,
    pub mindtct_executable: bool,
    pub bozorth3_path: PathBuf,
    pub bozorth3_exists: bool,
    pub bozorth3_executable: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Process liveness ("healthy"); toolkit readiness is `nbis_available`
    pub status: String,
    pub service: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// True only if all three tools exist and are executable
    pub nbis_available: bool,
    pub nbis_details: NbisDetails,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let toolkit = &state.toolkit;
    let cwsq = toolkit.status(Tool::Cwsq);
    let mindtct = toolkit.status(Tool::Mindtct);
    let bozorth3 = toolkit.status(Tool::Bozorth3);

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "NIST NBIS Fingerprint Matcher".to_string(),
        module: "fpm-matcher".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        nbis_available: toolkit.available(),
        nbis_details: NbisDetails {
            cwsq_path: cwsq.path.clone(),
            cwsq_exists: cwsq.exists,
            cwsq_executable: cwsq.executable,
            mindtct_path: mindtct.path.clone(),
            mindtct_exists: mindtct.exists,
            mindtct_executable: mindtct.executable,
            bozorth3_path: bozorth3.path.clone(),
            bozorth3_exists: bozorth3.exists,
            bozorth3_executable: bozorth3.executable,
        },
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
