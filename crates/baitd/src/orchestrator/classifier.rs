//! Stage capability traits.
//!
//! Each classification stage is one async call that reads the conversation
//! and answers with raw flags; the conclusion stage turns a finalized score
//! into narrative text. Production wires LLM-backed implementations, tests
//! wire the fakes from `super::fake`.

use async_trait::async_trait;
use bait_shared::{
    ConversationContext, FlagSet, Severity, Stage, StageError, TraceMetadata,
};
use std::sync::Arc;

// ============================================================================
// Traits
// ============================================================================

/// One classification stage.
///
/// Any bounded retry or search budget is internal to the implementation;
/// the sequencer calls `classify` exactly once per traversed stage.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Stage this classifier answers for.
    fn stage(&self) -> Stage;

    async fn classify(
        &self,
        context: &ConversationContext,
        trace: &TraceMetadata,
    ) -> Result<FlagSet, StageError>;
}

/// Input of the conclusion stage.
#[derive(Debug, Clone, Copy)]
pub struct ConclusionRequest<'a> {
    pub context: &'a ConversationContext,
    /// Finalized score, before the reset
    pub score: u32,
    /// Tier already derived from `score`
    pub severity: Severity,
    pub trace: &'a TraceMetadata,
}

/// The conclusion stage: writes the verdict for an already-derived tier.
#[async_trait]
pub trait ConclusionWriter: Send + Sync {
    async fn conclude(&self, request: &ConclusionRequest<'_>) -> Result<String, StageError>;
}

// ============================================================================
// Template Writer
// ============================================================================

/// Deterministic writer: the tier's fixed advisory text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateConclusionWriter;

#[async_trait]
impl ConclusionWriter for TemplateConclusionWriter {
    async fn conclude(&self, request: &ConclusionRequest<'_>) -> Result<String, StageError> {
        Ok(request.severity.advisory().to_string())
    }
}

// ============================================================================
// Classifier Set
// ============================================================================

/// One classifier per role of the decision tree.
#[derive(Clone)]
pub struct ClassifierSet {
    pub category: Arc<dyn Classifier>,
    pub validity: Arc<dyn Classifier>,
    pub message_content: Arc<dyn Classifier>,
    pub domain_reputation: Arc<dyn Classifier>,
    pub phone_number: Arc<dyn Classifier>,
    pub transcript_content: Arc<dyn Classifier>,
}

impl ClassifierSet {
    /// Build a set from a per-stage factory.
    pub fn from_fn<F>(mut make: F) -> Self
    where
        F: FnMut(Stage) -> Arc<dyn Classifier>,
    {
        Self {
            category: make(Stage::Category),
            validity: make(Stage::Validity),
            message_content: make(Stage::MessageContent),
            domain_reputation: make(Stage::DomainReputation),
            phone_number: make(Stage::PhoneNumber),
            transcript_content: make(Stage::TranscriptContent),
        }
    }

    pub fn get(&self, stage: Stage) -> Option<&Arc<dyn Classifier>> {
        match stage {
            Stage::Category => Some(&self.category),
            Stage::Validity => Some(&self.validity),
            Stage::MessageContent => Some(&self.message_content),
            Stage::DomainReputation => Some(&self.domain_reputation),
            Stage::PhoneNumber => Some(&self.phone_number),
            Stage::TranscriptContent => Some(&self.transcript_content),
            Stage::Conclusion => None,
        }
    }

    /// Stages whose classifier reports a different role than its slot.
    pub fn miswired(&self) -> Vec<Stage> {
        Stage::CLASSIFIERS
            .into_iter()
            .filter(|stage| {
                self.get(*stage)
                    .map(|classifier| classifier.stage() != *stage)
                    .unwrap_or(true)
            })
            .collect()
    }
}
