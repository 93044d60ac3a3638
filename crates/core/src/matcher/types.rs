//! Types for confidence matching.

use serde::{Deserialize, Serialize};

/// Fixed classification of a confidence score.
///
/// Tier boundaries are not configurable; the admission threshold the
/// orchestrator applies is a separate concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// Score >= 80.
    High,
    /// Score 50-79.
    Medium,
    /// Score < 50.
    Low,
}

impl ConfidenceTier {
    /// Derive the tier from a score.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => ConfidenceTier::High,
            50..=79 => ConfidenceTier::Medium,
            _ => ConfidenceTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

/// Result of scoring one candidate against one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Total score, 0-100.
    pub score: u8,
    /// Tier derived solely from the score.
    pub tier: ConfidenceTier,
}

impl MatchResult {
    pub fn from_score(score: u8) -> Self {
        Self {
            score,
            tier: ConfidenceTier::from_score(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ConfidenceTier::from_score(100), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(80), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(79), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(50), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(49), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0), ConfidenceTier::Low);
    }

    #[test]
    fn test_match_result_from_score() {
        let result = MatchResult::from_score(85);
        assert_eq!(result.score, 85);
        assert_eq!(result.tier, ConfidenceTier::High);
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(
            serde_json::to_string(&ConfidenceTier::High).unwrap(),
            "\"high\""
        );
        assert_eq!(ConfidenceTier::Medium.as_str(), "medium");
    }
}
