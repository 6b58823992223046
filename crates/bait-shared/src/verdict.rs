//! Auditable record of one traversal.

use crate::conversation::ConversationContext;
use crate::severity::Conclusion;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Path selected by the category stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Message,
    Voicemail,
}

impl Branch {
    /// Classifier stages run after the category stage, in order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::Message => &[Stage::Validity, Stage::MessageContent, Stage::DomainReputation],
            Self::Voicemail => &[Stage::PhoneNumber, Stage::TranscriptContent],
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Voicemail => write!(f, "voicemail"),
        }
    }
}

/// One traversed edge: the stage, the flag it resolved to, what it added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub stage: Stage,
    pub outcome: String,
    pub delta: u32,
}

impl StepRecord {
    pub fn new(stage: Stage, outcome: &str, delta: u32) -> Self {
        Self {
            stage,
            outcome: outcome.to_string(),
            delta,
        }
    }
}

/// Result of a successful traversal.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub request_id: Uuid,
    pub branch: Branch,
    pub steps: Vec<StepRecord>,
    /// Score handed to the conclusion stage, before the reset
    pub score: u32,
    /// Tier and narrative, the request's answer
    pub conclusion: Conclusion,
    pub context: ConversationContext,
    pub completed_at: DateTime<Utc>,
}

impl Verdict {
    /// Sum of recorded deltas. Equals `score` for every traversal.
    pub fn step_total(&self) -> u32 {
        self.steps.iter().fold(0u32, |acc, step| acc.saturating_add(step.delta))
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.steps.iter().map(|step| step.stage).collect()
    }
}
