//! Risk score accumulator and tunable per-outcome weights.

use serde::{Deserialize, Serialize};

/// Per-request risk accumulator.
///
/// Unsigned and add-only while a traversal runs, so the score can never go
/// negative or decrease. `take` reads the finalized value and zeroes it in
/// one step.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RiskScore(u32);

impl RiskScore {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Add one edge's contribution. Saturates instead of wrapping.
    pub fn add(&mut self, delta: u32) {
        self.0 = self.0.saturating_add(delta);
    }

    /// Return the finalized score and reset to zero.
    pub fn take(&mut self) -> u32 {
        std::mem::take(&mut self.0)
    }
}

/// Score deltas per outcome. Outcomes not listed here contribute nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Validity check could not confirm the contacts in a message
    #[serde(default = "default_validity_unverified")]
    pub validity_unverified: u32,

    #[serde(default = "default_message_high_risk")]
    pub message_high_risk: u32,

    #[serde(default = "default_message_low_risk")]
    pub message_low_risk: u32,

    #[serde(default = "default_domain_high_risk")]
    pub domain_high_risk: u32,

    #[serde(default = "default_phone_high_risk")]
    pub phone_high_risk: u32,

    #[serde(default = "default_transcript_high_risk")]
    pub transcript_high_risk: u32,

    #[serde(default = "default_transcript_low_risk")]
    pub transcript_low_risk: u32,
}

fn default_validity_unverified() -> u32 {
    4
}

fn default_message_high_risk() -> u32 {
    3
}

fn default_message_low_risk() -> u32 {
    1
}

fn default_domain_high_risk() -> u32 {
    3
}

fn default_phone_high_risk() -> u32 {
    3
}

fn default_transcript_high_risk() -> u32 {
    6 // transcripts carry no URL evidence, so content weighs double
}

fn default_transcript_low_risk() -> u32 {
    3
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            validity_unverified: default_validity_unverified(),
            message_high_risk: default_message_high_risk(),
            message_low_risk: default_message_low_risk(),
            domain_high_risk: default_domain_high_risk(),
            phone_high_risk: default_phone_high_risk(),
            transcript_high_risk: default_transcript_high_risk(),
            transcript_low_risk: default_transcript_low_risk(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_accumulates_and_takes() {
        let mut score = RiskScore::new();
        score.add(4);
        score.add(0);
        score.add(3);
        assert_eq!(score.value(), 7);
        assert_eq!(score.take(), 7);
        assert_eq!(score.value(), 0);
    }

    #[test]
    fn test_score_saturates() {
        let mut score = RiskScore::new();
        score.add(u32::MAX);
        score.add(5);
        assert_eq!(score.value(), u32::MAX);
    }

    #[test]
    fn test_partial_weights_fill_defaults() {
        let weights: ScoreWeights = serde_json::from_str(r#"{"transcript_high_risk": 8}"#).unwrap();
        assert_eq!(weights.transcript_high_risk, 8);
        assert_eq!(weights.validity_unverified, 4);
    }
}
