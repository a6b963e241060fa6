//! fpm-matcher library interface
//!
//! Fingerprint identity verification over HTTP: extraction, one-to-one
//! comparison and one-to-many ranking, orchestrated over the NIST NBIS
//! toolkit (`cwsq`, `mindtct`, `bozorth3`).

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use fpm_common::config::BatchFailurePolicy;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{ArtifactStore, FingerprintBackend, NbisPipeline, Tool, Toolkit};

/// Request bodies carry base64 images, well past axum's 2 MiB default
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// `v<version> [<commit>] built <timestamp> (<profile>)`, stamped by build.rs
pub fn build_identity() -> String {
    format!(
        "v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    )
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Toolkit resolved once at startup; readiness derives from it
    pub toolkit: Arc<Toolkit>,
    /// Extraction and matching backend
    pub backend: Arc<dyn FingerprintBackend>,
    /// What a batch does when one candidate fails
    pub batch_policy: BatchFailurePolicy,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        toolkit: Arc<Toolkit>,
        backend: Arc<dyn FingerprintBackend>,
        batch_policy: BatchFailurePolicy,
    ) -> Self {
        Self {
            toolkit,
            backend,
            batch_policy,
            startup_time: Utc::now(),
        }
    }

    /// Resolve the toolkit, open the artifact store and wire the NBIS backend
    pub fn from_config(config: &ServiceConfig) -> std::io::Result<Self> {
        let store = ArtifactStore::open(&config.artifact_root)?;
        let toolkit = Arc::new(Toolkit::resolve(&config.toolkit));
        let backend = NbisPipeline::new(store, Arc::clone(&toolkit), config.pipeline_settings());
        Ok(Self::new(toolkit, Arc::new(backend), config.batch_policy))
    }

    /// Refuse matching work when any tool is missing
    pub fn require_toolkit(&self) -> ApiResult<()> {
        if self.toolkit.available() {
            return Ok(());
        }
        let missing: Vec<&str> = self
            .toolkit
            .unusable()
            .into_iter()
            .map(Tool::binary_name)
            .collect();
        Err(ApiError::ServiceUnavailable(format!(
            "NBIS tools not available: {}",
            missing.join(", ")
        )))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::matching_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_identity_is_stamped() {
        let identity = build_identity();
        assert!(identity.starts_with(&format!("v{} [", env!("CARGO_PKG_VERSION"))));
        assert!(!env!("GIT_HASH").is_empty());
        assert!(!env!("BUILD_PROFILE").is_empty());
        // RFC 3339 with a numeric offset, e.g. 2026-10-17T14:30:45+02:00
        assert!(
            chrono::DateTime::parse_from_rfc3339(env!("BUILD_TIMESTAMP")).is_ok(),
            "bad timestamp in {}",
            identity
        );
    }
}
