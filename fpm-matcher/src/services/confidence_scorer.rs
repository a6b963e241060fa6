//! Confidence scoring policy
//!
//! Pure mapping from a raw `bozorth3` score to a verdict, a calibrated
//! percentage and a quality tier. Piecewise linear and continuous:
//!
//! | raw score  | confidence                    | tier       |
//! |------------|-------------------------------|------------|
//! | `< 40`     | `score / 40 * 60`             | `no_match` |
//! | `40..100`  | `60 + (score - 40) / 60 * 20` | `possible` |
//! | `100..200` | `80 + (score - 100) / 5`      | `good`     |
//! | `>= 200`   | `100` (capped)                | `excellent`|

use serde::Serialize;

/// Minimum raw score counted as a match
pub const MATCH_THRESHOLD: u32 = 40;

/// Raw score where high-confidence scaling starts
pub const HIGH_CONFIDENCE_THRESHOLD: u32 = 100;

/// Raw score of an excellent match
pub const EXCELLENT_THRESHOLD: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    NoMatch,
    Possible,
    Good,
    Excellent,
}

impl QualityTier {
    pub fn from_score(raw_score: u32) -> Self {
        if raw_score >= EXCELLENT_THRESHOLD {
            QualityTier::Excellent
        } else if raw_score >= HIGH_CONFIDENCE_THRESHOLD {
            QualityTier::Good
        } else if raw_score >= MATCH_THRESHOLD {
            QualityTier::Possible
        } else {
            QualityTier::NoMatch
        }
    }
}

/// Verdict derived from one raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub raw_score: u32,
    pub matched: bool,
    /// Percentage in `[0, 100]`, one decimal place
    pub confidence: f64,
    pub quality_tier: QualityTier,
}

/// Score `raw_score` under the fixed calibration
pub fn score(raw_score: u32) -> MatchResult {
    let s = f64::from(raw_score);
    let match_t = f64::from(MATCH_THRESHOLD);
    let high_t = f64::from(HIGH_CONFIDENCE_THRESHOLD);

    let confidence = if raw_score >= HIGH_CONFIDENCE_THRESHOLD {
        (80.0 + (s - high_t) / 5.0).min(100.0)
    } else if raw_score >= MATCH_THRESHOLD {
        60.0 + (s - match_t) / (high_t - match_t) * 20.0
    } else {
        (s / match_t) * 60.0
    };

    MatchResult {
        raw_score,
        matched: raw_score >= MATCH_THRESHOLD,
        confidence: round_one_decimal(confidence),
        quality_tier: QualityTier::from_score(raw_score),
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_threshold_40() {
        let r = score(40);
        assert!(r.matched);
        assert_eq!(r.confidence, 60.0);
        assert_eq!(r.quality_tier, QualityTier::Possible);
    }

    #[test]
    fn test_scenario_high_confidence_100() {
        let r = score(100);
        assert!(r.matched);
        assert_eq!(r.confidence, 80.0);
        assert_eq!(r.quality_tier, QualityTier::Good);
    }

    #[test]
    fn test_scenario_capped_250() {
        let r = score(250);
        assert_eq!(r.confidence, 100.0);
        assert_eq!(r.quality_tier, QualityTier::Excellent);
    }

    #[test]
    fn test_below_threshold_linear_and_unmatched() {
        for s in 0..MATCH_THRESHOLD {
            let r = score(s);
            assert!(!r.matched);
            assert_eq!(r.confidence, round_one_decimal(f64::from(s) / 40.0 * 60.0));
            assert_eq!(r.quality_tier, QualityTier::NoMatch);
        }
        assert_eq!(score(0).confidence, 0.0);
        assert_eq!(score(39).confidence, 58.5);
    }

    #[test]
    fn test_possible_band() {
        assert_eq!(score(41).confidence, 60.3);
        assert_eq!(score(70).confidence, 70.0);
        assert_eq!(score(99).confidence, 79.7);
        for s in MATCH_THRESHOLD..HIGH_CONFIDENCE_THRESHOLD {
            assert!(score(s).matched);
            assert!(score(s).confidence < 80.0);
        }
    }

    #[test]
    fn test_good_band_and_cap() {
        assert_eq!(score(120).confidence, 84.0);
        assert_eq!(score(199).confidence, 99.8);
        assert_eq!(score(200).confidence, 100.0);
        assert_eq!(score(10_000).confidence, 100.0);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(QualityTier::from_score(39), QualityTier::NoMatch);
        assert_eq!(QualityTier::from_score(40), QualityTier::Possible);
        assert_eq!(QualityTier::from_score(99), QualityTier::Possible);
        assert_eq!(QualityTier::from_score(100), QualityTier::Good);
        assert_eq!(QualityTier::from_score(199), QualityTier::Good);
        assert_eq!(QualityTier::from_score(200), QualityTier::Excellent);
    }

    #[test]
    fn test_confidence_monotonic_and_bounded() {
        let mut previous = -1.0;
        for s in 0..400 {
            let c = score(s).confidence;
            assert!(c >= previous, "confidence dropped at {}", s);
            assert!((0.0..=100.0).contains(&c));
            previous = c;
        }
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        let json = serde_json::to_string(&QualityTier::NoMatch).unwrap();
        assert_eq!(json, "\"no_match\"");
    }
}
