//! HTTP API types shared by baitd and baitctl.

use crate::severity::Severity;
use crate::verdict::{Branch, StepRecord, Verdict};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /v1/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

/// Answer of `POST /v1/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictResponse {
    pub request_id: Uuid,
    pub branch: Branch,
    pub score: u32,
    pub severity: Severity,
    pub conclusion: String,
    pub steps: Vec<StepRecord>,
}

impl From<Verdict> for VerdictResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            request_id: verdict.request_id,
            branch: verdict.branch,
            score: verdict.score,
            severity: verdict.conclusion.severity,
            conclusion: verdict.conclusion.text,
            steps: verdict.steps,
        }
    }
}

/// Answer of `GET /v1/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error body of the JSON routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_response_wire_shape() {
        let json = r#"{
            "request_id": "6f1c1b9e-8f43-4a53-9d0e-0e5b8a1f2c3d",
            "branch": "voicemail",
            "score": 9,
            "severity": "high",
            "conclusion": "This is very likely a scam. Do not call back.",
            "steps": [
                {"stage": "category", "outcome": "is_voicemail", "delta": 0},
                {"stage": "phone_number", "outcome": "high_risk", "delta": 3},
                {"stage": "transcript_content", "outcome": "high_risk", "delta": 6}
            ]
        }"#;

        let response: VerdictResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.branch, Branch::Voicemail);
        assert_eq!(response.severity, Severity::High);
        assert_eq!(response.steps.len(), 3);
        assert_eq!(response.steps.iter().map(|s| s.delta).sum::<u32>(), response.score);
    }
}
