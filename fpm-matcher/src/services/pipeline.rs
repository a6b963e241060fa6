//! Fingerprint pipeline seam
//!
//! Handlers and the batch ranker talk to a [`FingerprintBackend`] rather than
//! to the NBIS tools directly, so ranking and HTTP behavior can be exercised
//! without the toolkit installed.

use crate::error::PipelineError;
use crate::services::artifact_store::ArtifactStore;
use crate::services::image_normalizer::ImageNormalizer;
use crate::services::minutiae::MinutiaeTemplate;
use crate::services::pairwise_matcher::PairwiseMatcher;
use crate::services::template_extractor::{EncodingSettings, TemplateExtractor};
use crate::services::tool_invoker::ToolInvoker;
use crate::services::toolkit::Toolkit;
use std::sync::Arc;
use std::time::Duration;

/// Template extraction plus pairwise scoring
#[async_trait::async_trait]
pub trait FingerprintBackend: Send + Sync {
    /// Extract a minutiae template from encoded image bytes
    async fn extract(&self, image: Vec<u8>, label: &str) -> Result<MinutiaeTemplate, PipelineError>;

    /// Raw similarity score of `probe` against `gallery`
    async fn compare(
        &self,
        probe: &MinutiaeTemplate,
        gallery: &MinutiaeTemplate,
    ) -> Result<u32, PipelineError>;
}

/// Everything needed to build the NBIS-backed pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub tool_timeout: Duration,
    pub max_dimension: u32,
    pub encoding: EncodingSettings,
}

/// NBIS toolkit backend (`cwsq` + `mindtct` + `bozorth3`)
#[derive(Debug, Clone)]
pub struct NbisPipeline {
    extractor: TemplateExtractor,
    matcher: PairwiseMatcher,
}

impl NbisPipeline {
    pub fn new(store: Arc<ArtifactStore>, toolkit: Arc<Toolkit>, settings: PipelineSettings) -> Self {
        let invoker = ToolInvoker::new(settings.tool_timeout);
        let extractor = TemplateExtractor::new(
            Arc::clone(&store),
            Arc::clone(&toolkit),
            invoker.clone(),
            ImageNormalizer::new(settings.max_dimension),
            settings.encoding,
        );
        let matcher = PairwiseMatcher::new(store, toolkit, invoker);
        Self { extractor, matcher }
    }
}

#[async_trait::async_trait]
impl FingerprintBackend for NbisPipeline {
    async fn extract(&self, image: Vec<u8>, label: &str) -> Result<MinutiaeTemplate, PipelineError> {
        self.extractor.extract(image, label).await
    }

    async fn compare(
        &self,
        probe: &MinutiaeTemplate,
        gallery: &MinutiaeTemplate,
    ) -> Result<u32, PipelineError> {
        self.matcher.match_templates(probe, gallery).await
    }
}
