//! Pairwise template matching via `bozorth3`
//!
//! Templates are re-materialized into a fresh namespace as probe and gallery
//! files, and the tool's stdout is parsed as a whole-number score.
//!
//! Argument order is preserved exactly as given (probe first). Whether the
//! tool's score is symmetric in its inputs is not assumed anywhere.

use crate::error::PipelineError;
use crate::services::artifact_store::{ArtifactStore, Stage};
use crate::services::minutiae::MinutiaeTemplate;
use crate::services::tool_invoker::ToolInvoker;
use crate::services::toolkit::{Tool, Toolkit};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PairwiseMatcher {
    store: Arc<ArtifactStore>,
    toolkit: Arc<Toolkit>,
    invoker: ToolInvoker,
}

impl PairwiseMatcher {
    pub fn new(store: Arc<ArtifactStore>, toolkit: Arc<Toolkit>, invoker: ToolInvoker) -> Self {
        Self {
            store,
            toolkit,
            invoker,
        }
    }

    /// Score `probe` against `gallery`
    pub async fn match_templates(
        &self,
        probe: &MinutiaeTemplate,
        gallery: &MinutiaeTemplate,
    ) -> Result<u32, PipelineError> {
        let mut namespace = self.store.allocate("match");
        let probe_path = namespace.path(Stage::Probe);
        let gallery_path = namespace.path(Stage::Gallery);

        tokio::fs::write(&probe_path, probe.as_xyt()).await?;
        tokio::fs::write(&gallery_path, gallery.as_xyt()).await?;

        let score = self.match_paths(&probe_path, &gallery_path).await;
        namespace.release();
        score
    }

    /// Score two on-disk `.xyt` files
    pub async fn match_paths(&self, probe: &Path, gallery: &Path) -> Result<u32, PipelineError> {
        let tool = Tool::Bozorth3.binary_name();
        let output = self
            .invoker
            .run(self.toolkit.path(Tool::Bozorth3), [probe, gallery])
            .await?
            .require_success(tool)?;

        let score = parse_score(&output.stdout)?;
        debug!(tool, score, "Pairwise match score");
        Ok(score)
    }
}

/// Parse the matcher's stdout as a single non-negative integer
pub fn parse_score(stdout: &str) -> Result<u32, PipelineError> {
    let trimmed = stdout.trim();
    trimmed.parse::<u32>().map_err(|_| {
        PipelineError::tool_failure(
            Tool::Bozorth3.binary_name(),
            format!("unparseable score output '{}'", trimmed),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("145\n").unwrap(), 145);
        assert_eq!(parse_score("  0 ").unwrap(), 0);
    }

    #[test]
    fn test_parse_score_rejects_malformed() {
        for bad in ["", "abc", "-3", "12 34", "1.5"] {
            let err = parse_score(bad).unwrap_err();
            assert!(
                matches!(err, PipelineError::ToolFailure { .. }),
                "{:?} should be a tool failure",
                bad
            );
        }
    }
}
