//! Minutiae template extraction
//!
//! Per operation: normalize image → write raw raster → `cwsq` (raster → WSQ)
//! → `mindtct` (WSQ → `.xyt`) → parse. Each intermediate artifact is removed
//! as soon as the next stage has consumed it, and the whole namespace is
//! released on every exit path (the namespace guard's drop handles early
//! returns).
//!
//! `cwsq` derives its output name from the input file's base name instead of
//! taking an explicit target, so the raster is always written at the
//! namespace's own stem and the produced file is verified (and moved if it
//! landed elsewhere) before `mindtct` reads it.

use crate::error::PipelineError;
use crate::services::artifact_store::{remove_if_present, ArtifactStore, Stage};
use crate::services::image_normalizer::{GrayRaster, ImageNormalizer};
use crate::services::minutiae::MinutiaeTemplate;
use crate::services::tool_invoker::ToolInvoker;
use crate::services::toolkit::{Tool, Toolkit};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Bits per pixel of the raster handed to the re-encoder
const RASTER_BIT_DEPTH: u32 = 8;

/// Output extension requested from the re-encoder
const COMPRESSED_EXT: &str = "wsq";

/// Re-encoder parameters
#[derive(Debug, Clone)]
pub struct EncodingSettings {
    /// WSQ bitrate, passed through verbatim (e.g. "2.25")
    pub wsq_bitrate: String,
    /// Assumed sensor density in pixels per inch
    pub sampling_density_ppi: u32,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            wsq_bitrate: "2.25".to_string(),
            sampling_density_ppi: 500,
        }
    }
}

/// Orchestrates normalizer, re-encoder and detector
#[derive(Debug, Clone)]
pub struct TemplateExtractor {
    store: Arc<ArtifactStore>,
    toolkit: Arc<Toolkit>,
    invoker: ToolInvoker,
    normalizer: ImageNormalizer,
    encoding: EncodingSettings,
}

impl TemplateExtractor {
    pub fn new(
        store: Arc<ArtifactStore>,
        toolkit: Arc<Toolkit>,
        invoker: ToolInvoker,
        normalizer: ImageNormalizer,
        encoding: EncodingSettings,
    ) -> Self {
        Self {
            store,
            toolkit,
            invoker,
            normalizer,
            encoding,
        }
    }

    /// Extract a minutiae template from encoded image bytes
    ///
    /// `label` only decorates artifact names; the namespace itself is always
    /// freshly allocated.
    pub async fn extract(
        &self,
        image: Vec<u8>,
        label: &str,
    ) -> Result<MinutiaeTemplate, PipelineError> {
        let normalizer = self.normalizer.clone();
        let raster = tokio::task::spawn_blocking(move || normalizer.normalize(&image))
            .await
            .map_err(|e| PipelineError::Decode(format!("decode task failed: {}", e)))??;

        let mut namespace = self.store.allocate(label);
        let ns_id = namespace.id().to_string();
        debug!(
            namespace = %ns_id,
            width = raster.width(),
            height = raster.height(),
            "Normalized fingerprint image"
        );

        let raster_path = namespace.path(Stage::Raster);
        tokio::fs::write(&raster_path, raster.as_bytes()).await?;

        let compressed_path = self
            .encode(&raster, &raster_path, &namespace.path(Stage::Compressed))
            .await?;
        remove_if_present(&raster_path);

        let template_path = self.detect(&compressed_path, &namespace.prefix()).await?;
        remove_if_present(&compressed_path);

        let xyt = tokio::fs::read_to_string(&template_path).await?;
        remove_if_present(&template_path);
        namespace.release();

        let template = MinutiaeTemplate::parse(&xyt).map_err(|e| {
            PipelineError::tool_failure(
                Tool::Mindtct.binary_name(),
                format!("unreadable template: {}", e),
            )
        })?;

        info!(
            namespace = %ns_id,
            minutiae = template.count(),
            "Extracted minutiae template"
        );
        Ok(template)
    }

    /// Run the re-encoder and return the verified compressed artifact path
    async fn encode(
        &self,
        raster: &GrayRaster,
        raster_path: &Path,
        expected: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let tool = Tool::Cwsq.binary_name();
        let args = [
            self.encoding.wsq_bitrate.clone(),
            COMPRESSED_EXT.to_string(),
            raster_path.display().to_string(),
            "-raw_in".to_string(),
            raster.width().to_string(),
            raster.height().to_string(),
            RASTER_BIT_DEPTH.to_string(),
            self.encoding.sampling_density_ppi.to_string(),
        ];

        let output = self
            .invoker
            .run(self.toolkit.path(Tool::Cwsq), &args)
            .await?
            .require_success(tool)?;
        if !output.stderr.trim().is_empty() {
            debug!(tool, stderr = %output.stderr.trim(), "Re-encoder diagnostics");
        }

        let derived = derived_output_path(raster_path, COMPRESSED_EXT);
        claim_output(tool, expected, &derived).await
    }

    /// Run the detector and return the produced template path
    async fn detect(&self, compressed: &Path, prefix: &Path) -> Result<PathBuf, PipelineError> {
        let tool = Tool::Mindtct.binary_name();
        let args = [compressed.as_os_str(), prefix.as_os_str()];

        self.invoker
            .run(self.toolkit.path(Tool::Mindtct), args)
            .await?
            .require_success(tool)?;

        let template = derived_output_path(prefix, "xyt");
        if !tokio::fs::try_exists(&template).await? {
            return Err(PipelineError::tool_failure(
                tool,
                "minutiae extraction failed - no .xyt file generated",
            ));
        }
        Ok(template)
    }
}

/// Output file name a tool derives from `input` by swapping the extension
///
/// Only the final extension is replaced, so `a.b.raw` becomes `a.b.wsq`;
/// an input without extension just gains one.
pub fn derived_output_path(input: &Path, ext: &str) -> PathBuf {
    match input.extension() {
        Some(_) => input.with_extension(ext),
        None => {
            let mut name = input.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        }
    }
}

/// Make sure the tool's output sits at `expected`, moving it from
/// `derived` if the tool wrote it there instead
async fn claim_output(tool: &str, expected: &Path, derived: &Path) -> Result<PathBuf, PipelineError> {
    if tokio::fs::try_exists(expected).await? {
        return Ok(expected.to_path_buf());
    }

    if derived != expected && tokio::fs::try_exists(derived).await? {
        debug!(
            tool,
            from = %derived.display(),
            to = %expected.display(),
            "Relocating tool output"
        );
        tokio::fs::rename(derived, expected).await?;
        return Ok(expected.to_path_buf());
    }

    Err(PipelineError::tool_failure(
        tool,
        format!("expected output {} was not produced", expected.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derived_output_path_swaps_extension() {
        assert_eq!(
            derived_output_path(Path::new("/tmp/q-1-abc.raw"), "wsq"),
            PathBuf::from("/tmp/q-1-abc.wsq")
        );
        assert_eq!(
            derived_output_path(Path::new("/tmp/q-1-abc"), "xyt"),
            PathBuf::from("/tmp/q-1-abc.xyt")
        );
    }

    #[tokio::test]
    async fn test_claim_output_relocates() {
        let dir = TempDir::new().unwrap();
        let expected = dir.path().join("final.wsq");
        let derived = dir.path().join("other.wsq");
        std::fs::write(&derived, b"wsq").unwrap();

        let path = claim_output("cwsq", &expected, &derived).await.unwrap();
        assert_eq!(path, expected);
        assert!(expected.exists());
        assert!(!derived.exists());
    }

    #[tokio::test]
    async fn test_claim_output_missing_is_tool_failure() {
        let dir = TempDir::new().unwrap();
        let expected = dir.path().join("final.wsq");

        let err = claim_output("cwsq", &expected, &expected).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailure { .. }));
    }
}
