//! Stage sequencer: the phishing decision tree.
//!
//! Flow:
//! 1. Category stage picks the branch
//! 2. Message branch: validity → message content → domain reputation
//!    Voicemail branch: phone number → transcript content
//! 3. Finalize: conclusion stage runs once on the accumulated score,
//!    its narrative is appended to the context, the score is reset
//!
//! Invariants:
//! - Every stage of the selected branch runs; no early exit
//! - Each traversed stage adds its delta exactly once
//! - Any stage failure aborts the request; nothing is retried here and no
//!   default conclusion is produced
//! - Score and context belong to one traversal; the sequencer itself is
//!   immutable and shared across requests

use super::classifier::{Classifier, ClassifierSet, ConclusionRequest, ConclusionWriter};
use crate::config::Config;
use bait_shared::severity::{limit_sentences, MAX_CONCLUSION_SENTENCES};
use bait_shared::{
    AmbiguityPolicy, AnalysisError, Branch, CategoryOutcome, Conclusion, ConversationContext,
    DomainOutcome, Message, MessageContentOutcome, PhoneOutcome, RiskScore, ScoreWeights, Severity, StageError,
    StageOutcome, StepRecord, TraceMetadata, TranscriptContentOutcome, ValidityOutcome, Verdict,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Read-only settings threaded through every traversal.
#[derive(Debug, Clone, Default)]
pub struct SequencerSettings {
    pub ambiguity: AmbiguityPolicy,
    pub concurrent_evidence: bool,
    pub weights: ScoreWeights,
    pub trace: TraceMetadata,
}

impl SequencerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ambiguity: config.sequencer.ambiguity,
            concurrent_evidence: config.sequencer.concurrent_evidence,
            weights: config.weights,
            trace: config.trace.clone(),
        }
    }
}

// ============================================================================
// Traversal State
// ============================================================================

/// Mutable state of one request: context, score and audit steps.
struct Traversal {
    request_id: Uuid,
    context: ConversationContext,
    score: RiskScore,
    steps: Vec<StepRecord>,
}

impl Traversal {
    fn begin(message: &Message) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            context: ConversationContext::seed(message),
            score: RiskScore::new(),
            steps: Vec::new(),
        }
    }

    /// Apply one edge's delta and record it.
    fn commit<O: StageOutcome>(&mut self, outcome: O, weights: &ScoreWeights) {
        let delta = outcome.delta(weights);
        self.score.add(delta);
        self.steps.push(StepRecord::new(O::STAGE, outcome.flag(), delta));
        info!(
            "[{}] {} -> {} (+{}, score {})",
            self.request_id,
            O::STAGE,
            outcome.flag(),
            delta,
            self.score.value()
        );
    }
}

// ============================================================================
// Sequencer
// ============================================================================

pub struct StageSequencer {
    classifiers: ClassifierSet,
    writer: Arc<dyn ConclusionWriter>,
    settings: SequencerSettings,
}

impl StageSequencer {
    pub fn new(
        classifiers: ClassifierSet,
        writer: Arc<dyn ConclusionWriter>,
        settings: SequencerSettings,
    ) -> Self {
        let miswired = classifiers.miswired();
        if !miswired.is_empty() {
            warn!("Classifier slots report a different stage: {:?}", miswired);
        }
        Self {
            classifiers,
            writer,
            settings,
        }
    }

    /// Text in, conclusion narrative out.
    pub async fn analyze_text(&self, text: &str) -> Result<String, AnalysisError> {
        let message = Message::new(text)?;
        Ok(self.analyze(message).await?.conclusion.text)
    }

    /// Run one full traversal with a fresh context and score.
    pub async fn analyze(&self, message: Message) -> Result<Verdict, AnalysisError> {
        let mut traversal = Traversal::begin(&message);
        info!(
            "[{}] analyzing message ({} chars, ambiguity {}, concurrent {})",
            traversal.request_id,
            message.len(),
            self.settings.ambiguity,
            self.settings.concurrent_evidence
        );

        let result = self.traverse(&mut traversal).await;
        match &result {
            Ok(verdict) => info!(
                "[{}] {} branch concluded: score {} ({})",
                verdict.request_id, verdict.branch, verdict.score, verdict.conclusion.severity
            ),
            Err(e) => error!("[{}] analysis aborted: {}", traversal.request_id, e),
        }
        result
    }

    async fn traverse(&self, traversal: &mut Traversal) -> Result<Verdict, AnalysisError> {
        let category: CategoryOutcome = self
            .classify(self.classifiers.category.as_ref(), &traversal.context)
            .await?;
        traversal.commit(category, &self.settings.weights);

        let branch = match category {
            CategoryOutcome::TextOrEmail => Branch::Message,
            CategoryOutcome::Voicemail => Branch::Voicemail,
        };

        match branch {
            Branch::Message => self.run_message_branch(traversal).await?,
            Branch::Voicemail => self.run_voicemail_branch(traversal).await?,
        }

        self.finalize(traversal, branch).await
    }

    /// Validity, content and domain checks, all three regardless of results.
    async fn run_message_branch(&self, traversal: &mut Traversal) -> Result<(), AnalysisError> {
        let set = &self.classifiers;
        let weights = &self.settings.weights;

        if self.settings.concurrent_evidence {
            let context = &traversal.context;
            let (validity, content, domain) = tokio::try_join!(
                self.classify::<ValidityOutcome>(set.validity.as_ref(), context),
                self.classify::<MessageContentOutcome>(set.message_content.as_ref(), context),
                self.classify::<DomainOutcome>(set.domain_reputation.as_ref(), context),
            )?;
            traversal.commit(validity, weights);
            traversal.commit(content, weights);
            traversal.commit(domain, weights);
        } else {
            let validity: ValidityOutcome = self
                .classify(set.validity.as_ref(), &traversal.context)
                .await?;
            traversal.commit(validity, weights);

            let content: MessageContentOutcome = self
                .classify(set.message_content.as_ref(), &traversal.context)
                .await?;
            traversal.commit(content, weights);

            let domain: DomainOutcome = self
                .classify(set.domain_reputation.as_ref(), &traversal.context)
                .await?;
            traversal.commit(domain, weights);
        }

        Ok(())
    }

    /// Phone number and transcript checks. No URL artifact, so no domain check.
    async fn run_voicemail_branch(&self, traversal: &mut Traversal) -> Result<(), AnalysisError> {
        let set = &self.classifiers;
        let weights = &self.settings.weights;

        if self.settings.concurrent_evidence {
            let context = &traversal.context;
            let (phone, transcript) = tokio::try_join!(
                self.classify::<PhoneOutcome>(set.phone_number.as_ref(), context),
                self.classify::<TranscriptContentOutcome>(set.transcript_content.as_ref(), context),
            )?;
            traversal.commit(phone, weights);
            traversal.commit(transcript, weights);
        } else {
            let phone: PhoneOutcome = self
                .classify(set.phone_number.as_ref(), &traversal.context)
                .await?;
            traversal.commit(phone, weights);

            let transcript: TranscriptContentOutcome = self
                .classify(set.transcript_content.as_ref(), &traversal.context)
                .await?;
            traversal.commit(transcript, weights);
        }

        Ok(())
    }

    /// Invoke one classifier and resolve its flags into the stage outcome.
    async fn classify<O: StageOutcome>(
        &self,
        classifier: &dyn Classifier,
        context: &ConversationContext,
    ) -> Result<O, AnalysisError> {
        let flags = classifier
            .classify(context, &self.settings.trace)
            .await
            .map_err(|source| AnalysisError::ClassifierInvocation {
                stage: O::STAGE,
                source,
            })?;
        debug!("{} flags: {:?}", O::STAGE, flags.true_flags());
        O::resolve(&flags, self.settings.ambiguity)
    }

    /// The single leaf of every path: conclude, append, reset.
    async fn finalize(
        &self,
        traversal: &mut Traversal,
        branch: Branch,
    ) -> Result<Verdict, AnalysisError> {
        let score = traversal.score.value();
        let severity = Severity::from_score(score);
        let request = ConclusionRequest {
            context: &traversal.context,
            score,
            severity,
            trace: &self.settings.trace,
        };

        let narrative = self
            .writer
            .conclude(&request)
            .await
            .map_err(AnalysisError::ConclusionGeneration)?;
        let narrative = limit_sentences(&narrative, MAX_CONCLUSION_SENTENCES);
        if narrative.is_empty() {
            return Err(AnalysisError::ConclusionGeneration(StageError::EmptyResponse));
        }

        traversal.context.append_conclusion(&narrative);
        let finalized = traversal.score.take();

        Ok(Verdict {
            request_id: traversal.request_id,
            branch,
            steps: traversal.steps.clone(),
            score: finalized,
            conclusion: Conclusion::new(severity, narrative),
            context: traversal.context.clone(),
            completed_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::fake::{FakeClassifiers, FakeConclusionWriter};

    fn sequencer(fakes: &FakeClassifiers, writer: Arc<FakeConclusionWriter>) -> StageSequencer {
        StageSequencer::new(fakes.set(), writer, SequencerSettings::default())
    }

    #[tokio::test]
    async fn test_score_is_zero_after_finalize() {
        let fakes = FakeClassifiers::message("na", "high_risk", "high_risk");
        let writer = Arc::new(FakeConclusionWriter::new());
        let seq = sequencer(&fakes, writer.clone());

        let message = Message::new("URGENT: verify your account at paypa1-secure.top").unwrap();
        let mut traversal = Traversal::begin(&message);
        seq.run_message_branch(&mut traversal).await.unwrap();
        assert_eq!(traversal.score.value(), 10);

        let verdict = seq.finalize(&mut traversal, Branch::Message).await.unwrap();
        assert_eq!(verdict.score, 10);
        assert_eq!(traversal.score.value(), 0);
        assert_eq!(traversal.context.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_conclusion_appends_nothing() {
        let fakes = FakeClassifiers::voicemail("na", "no_risk");
        let writer = Arc::new(FakeConclusionWriter::failing(StageError::Timeout(30)));
        let seq = sequencer(&fakes, writer.clone());

        let message = Message::new("Hi, it's Sam, call me back").unwrap();
        let mut traversal = Traversal::begin(&message);
        let err = seq.finalize(&mut traversal, Branch::Voicemail).await.unwrap_err();

        assert_eq!(err, AnalysisError::ConclusionGeneration(StageError::Timeout(30)));
        assert_eq!(traversal.context.len(), 1);
        assert_eq!(writer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_narrative_is_a_conclusion_failure() {
        let fakes = FakeClassifiers::voicemail("na", "no_risk");
        let writer = Arc::new(FakeConclusionWriter::with_narrative("   "));
        let seq = sequencer(&fakes, writer);

        let err = seq.analyze_text("Hello, returning your call").await.unwrap_err();
        assert_eq!(err, AnalysisError::ConclusionGeneration(StageError::EmptyResponse));
    }
}
