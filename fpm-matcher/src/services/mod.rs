//! Matching orchestration pipeline
//!
//! Leaf-first: artifact store, image normalizer, tool invoker and toolkit
//! resolution; then template extraction, pairwise matching, confidence
//! scoring and batch ranking on top.

pub mod artifact_store;
pub mod batch_ranker;
pub mod confidence_scorer;
pub mod image_normalizer;
pub mod minutiae;
pub mod pairwise_matcher;
pub mod pipeline;
pub mod template_extractor;
pub mod tool_invoker;
pub mod toolkit;

pub use artifact_store::{ArtifactNamespace, ArtifactStore, Stage};
pub use batch_ranker::{BatchRanker, BatchResult, Candidate, CandidateResult};
pub use confidence_scorer::{MatchResult, QualityTier, MATCH_THRESHOLD};
pub use minutiae::{Minutia, MinutiaeTemplate};
pub use pipeline::{FingerprintBackend, NbisPipeline, PipelineSettings};
pub use template_extractor::EncodingSettings;
pub use toolkit::{Tool, ToolStatus, Toolkit};
