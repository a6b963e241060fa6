//! One-to-many ranking
//!
//! The query template is extracted once; every candidate is then extracted,
//! matched against it (query as probe) and scored, strictly in input order.
//! The best match is the matched candidate with the highest raw score; on a
//! tie the earlier candidate is kept.
//!
//! A failing candidate is handled per [`BatchFailurePolicy`]: `Skip` records
//! the error in that candidate's slot and moves on, `Abort` fails the batch.
//! A failing query always fails the batch.

use crate::error::PipelineError;
use crate::services::confidence_scorer::{self, MatchResult};
use crate::services::minutiae::MinutiaeTemplate;
use crate::services::pipeline::FingerprintBackend;
use fpm_common::config::BatchFailurePolicy;
use std::sync::Arc;
use tracing::{info, warn};

/// One gallery entry
///
/// `image` holds the encoded image bytes, or the error that prevented the
/// caller from transport-decoding them; either way the candidate keeps its
/// slot and is subject to the failure policy.
#[derive(Debug)]
pub struct Candidate {
    pub id: String,
    pub image: Result<Vec<u8>, PipelineError>,
}

/// Successful comparison of one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub result: MatchResult,
    pub template_count: usize,
}

/// Per-candidate slot in a batch result
#[derive(Debug)]
pub struct CandidateResult {
    pub candidate_id: String,
    pub outcome: Result<CandidateMatch, PipelineError>,
}

/// Winning candidate
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    /// Position in the input sequence
    pub index: usize,
    pub candidate_id: String,
    pub result: MatchResult,
    pub template_count: usize,
}

#[derive(Debug)]
pub struct BatchResult {
    pub query_template_count: usize,
    pub per_candidate: Vec<CandidateResult>,
    pub best_match: Option<BestMatch>,
}

pub struct BatchRanker {
    backend: Arc<dyn FingerprintBackend>,
    policy: BatchFailurePolicy,
}

impl BatchRanker {
    pub fn new(backend: Arc<dyn FingerprintBackend>, policy: BatchFailurePolicy) -> Self {
        Self { backend, policy }
    }

    pub async fn rank(
        &self,
        query_image: Vec<u8>,
        candidates: Vec<Candidate>,
    ) -> Result<BatchResult, PipelineError> {
        let total = candidates.len();
        let query = self.backend.extract(query_image, "query").await?;
        info!(
            candidates = total,
            query_minutiae = query.count(),
            "Batch comparison started"
        );

        let mut per_candidate = Vec::with_capacity(total);
        for (index, candidate) in candidates.into_iter().enumerate() {
            let outcome = match self.compare_one(&query, candidate.image, index).await {
                Ok(found) => Ok(found),
                Err(e) if self.policy == BatchFailurePolicy::Abort => {
                    warn!(candidate = %candidate.id, index, error = %e, "Candidate failed, aborting batch");
                    return Err(e);
                }
                Err(e) => {
                    warn!(candidate = %candidate.id, index, error = %e, "Candidate failed, skipping");
                    Err(e)
                }
            };

            per_candidate.push(CandidateResult {
                candidate_id: candidate.id,
                outcome,
            });
        }

        let best_match = select_best(&per_candidate);
        match &best_match {
            Some(best) => info!(
                candidate = %best.candidate_id,
                score = best.result.raw_score,
                "Batch comparison complete"
            ),
            None => info!("Batch comparison complete, no match"),
        }

        Ok(BatchResult {
            query_template_count: query.count(),
            per_candidate,
            best_match,
        })
    }

    async fn compare_one(
        &self,
        query: &MinutiaeTemplate,
        image: Result<Vec<u8>, PipelineError>,
        index: usize,
    ) -> Result<CandidateMatch, PipelineError> {
        let template = self.backend.extract(image?, &format!("db_{}", index)).await?;
        let raw_score = self.backend.compare(query, &template).await?;
        Ok(CandidateMatch {
            result: confidence_scorer::score(raw_score),
            template_count: template.count(),
        })
    }
}

/// Highest raw score among matched candidates; first seen wins ties
pub fn select_best(per_candidate: &[CandidateResult]) -> Option<BestMatch> {
    let mut best: Option<BestMatch> = None;

    for (index, entry) in per_candidate.iter().enumerate() {
        let Ok(candidate) = &entry.outcome else {
            continue;
        };
        if !candidate.result.matched {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |b| candidate.result.raw_score > b.result.raw_score);
        if better {
            best = Some(BestMatch {
                index,
                candidate_id: entry.candidate_id.clone(),
                result: candidate.result,
                template_count: candidate.template_count,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::confidence_scorer::QualityTier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Image bytes are the decimal score the candidate should get;
    /// anything else fails to decode.
    #[derive(Default)]
    struct ScriptedBackend {
        extractions: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl FingerprintBackend for ScriptedBackend {
        async fn extract(
            &self,
            image: Vec<u8>,
            _label: &str,
        ) -> Result<MinutiaeTemplate, PipelineError> {
            self.extractions.fetch_add(1, Ordering::SeqCst);
            let text = String::from_utf8(image).unwrap_or_default();
            let score: u32 = text
                .parse()
                .map_err(|_| PipelineError::Decode(format!("not an image: {}", text)))?;
            Ok(MinutiaeTemplate::parse(&format!("{} 0 0 50\n1 1 1 50\n", score)).unwrap())
        }

        async fn compare(
            &self,
            _probe: &MinutiaeTemplate,
            gallery: &MinutiaeTemplate,
        ) -> Result<u32, PipelineError> {
            Ok(gallery.minutiae()[0].x as u32)
        }
    }

    fn candidates(images: &[&str]) -> Vec<Candidate> {
        images
            .iter()
            .enumerate()
            .map(|(i, img)| Candidate {
                id: format!("c{}", i + 1),
                image: Ok(img.as_bytes().to_vec()),
            })
            .collect()
    }

    fn ranker(policy: BatchFailurePolicy) -> (Arc<ScriptedBackend>, BatchRanker) {
        let backend = Arc::new(ScriptedBackend::default());
        let ranker = BatchRanker::new(backend.clone(), policy);
        (backend, ranker)
    }

    #[tokio::test]
    async fn test_best_match_is_highest_matched_score() {
        let (backend, ranker) = ranker(BatchFailurePolicy::Skip);
        let result = ranker
            .rank(b"0".to_vec(), candidates(&["30", "120", "90"]))
            .await
            .unwrap();

        let best = result.best_match.unwrap();
        assert_eq!(best.candidate_id, "c2");
        assert_eq!(best.index, 1);
        assert_eq!(best.result.raw_score, 120);
        assert_eq!(best.result.quality_tier, QualityTier::Good);

        let first = result.per_candidate[0].outcome.as_ref().unwrap();
        assert!(!first.result.matched);
        assert_eq!(first.template_count, 2);
        assert_eq!(result.query_template_count, 2);

        // query once + three candidates
        assert_eq!(backend.extractions.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_ties_keep_first_candidate() {
        let (_, ranker) = ranker(BatchFailurePolicy::Skip);
        let result = ranker
            .rank(b"0".to_vec(), candidates(&["150", "80", "150"]))
            .await
            .unwrap();

        assert_eq!(result.best_match.unwrap().candidate_id, "c1");
    }

    #[tokio::test]
    async fn test_no_matched_candidate_means_no_best() {
        let (_, ranker) = ranker(BatchFailurePolicy::Skip);
        let result = ranker
            .rank(b"0".to_vec(), candidates(&["10", "39"]))
            .await
            .unwrap();

        assert!(result.best_match.is_none());
        assert_eq!(result.per_candidate.len(), 2);
    }

    #[tokio::test]
    async fn test_skip_policy_records_decode_error_and_continues() {
        let (_, ranker) = ranker(BatchFailurePolicy::Skip);
        let result = ranker
            .rank(b"0".to_vec(), candidates(&["45", "garbage", "60"]))
            .await
            .unwrap();

        assert!(matches!(
            result.per_candidate[1].outcome,
            Err(PipelineError::Decode(_))
        ));
        assert_eq!(result.best_match.unwrap().candidate_id, "c3");
    }

    #[tokio::test]
    async fn test_abort_policy_fails_whole_batch() {
        let (backend, ranker) = ranker(BatchFailurePolicy::Abort);
        let err = ranker
            .rank(b"0".to_vec(), candidates(&["45", "garbage", "60"]))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Decode(_)));
        // third candidate never extracted
        assert_eq!(backend.extractions.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_query_failure_fails_batch() {
        let (_, ranker) = ranker(BatchFailurePolicy::Skip);
        let err = ranker
            .rank(b"garbage".to_vec(), candidates(&["45"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let (_, ranker) = ranker(BatchFailurePolicy::Skip);
        let images = ["70", "200", "200", "5"];
        let first = ranker.rank(b"0".to_vec(), candidates(&images)).await.unwrap();
        let second = ranker.rank(b"0".to_vec(), candidates(&images)).await.unwrap();

        assert_eq!(first.best_match, second.best_match);
        assert_eq!(first.best_match.unwrap().candidate_id, "c2");
    }
}
