//! Fake stage implementations for deterministic testing.
//!
//! No network calls: every fake answers from pre-configured responses and
//! counts its calls so tests can assert which stages ran.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let fakes = FakeClassifiers::message("na", "high_risk", "high_risk");
//! let writer = Arc::new(FakeConclusionWriter::new());
//! let seq = StageSequencer::new(fakes.set(), writer.clone(), SequencerSettings::default());
//!
//! let verdict = seq.analyze(Message::new("...")?).await?;
//! assert_eq!(verdict.score, 10);
//! assert_eq!(writer.call_count(), 1);
//! ```

use super::classifier::{Classifier, ClassifierSet, ConclusionRequest, ConclusionWriter};
use async_trait::async_trait;
use bait_shared::{ConversationContext, FlagSet, Severity, Stage, StageError, TraceMetadata};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fake Classifier
// ============================================================================

/// Classifier answering from a response queue.
///
/// Responses are handed out in order; the last one repeats forever.
pub struct FakeClassifier {
    stage: Stage,
    responses: Mutex<Vec<Result<FlagSet, StageError>>>,
    call_count: Mutex<usize>,
    delay: Option<Duration>,
}

impl FakeClassifier {
    pub fn new(stage: Stage, responses: Vec<Result<FlagSet, StageError>>) -> Self {
        Self {
            stage,
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            delay: None,
        }
    }

    /// Always answer with a single true flag.
    pub fn answering(stage: Stage, flag: &str) -> Self {
        Self::new(stage, vec![Ok(FlagSet::single(flag))])
    }

    /// Always answer with the given raw flags.
    pub fn with_flags(stage: Stage, flags: FlagSet) -> Self {
        Self::new(stage, vec![Ok(flags)])
    }

    /// Always fail.
    pub fn failing(stage: Stage, error: StageError) -> Self {
        Self::new(stage, vec![Err(error)])
    }

    /// A stage the test expects never to run.
    pub fn unused(stage: Stage) -> Self {
        Self::failing(stage, StageError::Unavailable(format!("{} was not expected to run", stage)))
    }

    /// Sleep before answering, to exercise concurrent evidence gathering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    fn next_response(&self) -> Result<FlagSet, StageError> {
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(StageError::EmptyResponse),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn classify(
        &self,
        _context: &ConversationContext,
        _trace: &TraceMetadata,
    ) -> Result<FlagSet, StageError> {
        {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response()
    }
}

// ============================================================================
// Fake Classifier Set
// ============================================================================

/// One fake per role, kept as concrete `Arc`s so call counts stay readable.
pub struct FakeClassifiers {
    pub category: Arc<FakeClassifier>,
    pub validity: Arc<FakeClassifier>,
    pub message_content: Arc<FakeClassifier>,
    pub domain_reputation: Arc<FakeClassifier>,
    pub phone_number: Arc<FakeClassifier>,
    pub transcript_content: Arc<FakeClassifier>,
}

impl FakeClassifiers {
    /// Every stage unused; replace slots with `with`.
    pub fn none() -> Self {
        Self {
            category: Arc::new(FakeClassifier::unused(Stage::Category)),
            validity: Arc::new(FakeClassifier::unused(Stage::Validity)),
            message_content: Arc::new(FakeClassifier::unused(Stage::MessageContent)),
            domain_reputation: Arc::new(FakeClassifier::unused(Stage::DomainReputation)),
            phone_number: Arc::new(FakeClassifier::unused(Stage::PhoneNumber)),
            transcript_content: Arc::new(FakeClassifier::unused(Stage::TranscriptContent)),
        }
    }

    /// Text/email path with the given validity, content and domain flags.
    pub fn message(validity: &str, content: &str, domain: &str) -> Self {
        Self::none()
            .with(FakeClassifier::answering(Stage::Category, "is_textoremail"))
            .with(FakeClassifier::answering(Stage::Validity, validity))
            .with(FakeClassifier::answering(Stage::MessageContent, content))
            .with(FakeClassifier::answering(Stage::DomainReputation, domain))
    }

    /// Voicemail path with the given phone and transcript flags.
    pub fn voicemail(phone: &str, transcript: &str) -> Self {
        Self::none()
            .with(FakeClassifier::answering(Stage::Category, "is_voicemail"))
            .with(FakeClassifier::answering(Stage::PhoneNumber, phone))
            .with(FakeClassifier::answering(Stage::TranscriptContent, transcript))
    }

    /// Put `fake` in the slot of its stage.
    pub fn with(mut self, fake: FakeClassifier) -> Self {
        let fake = Arc::new(fake);
        match fake.stage() {
            Stage::Category => self.category = fake,
            Stage::Validity => self.validity = fake,
            Stage::MessageContent => self.message_content = fake,
            Stage::DomainReputation => self.domain_reputation = fake,
            Stage::PhoneNumber => self.phone_number = fake,
            Stage::TranscriptContent => self.transcript_content = fake,
            Stage::Conclusion => {}
        }
        self
    }

    pub fn set(&self) -> ClassifierSet {
        ClassifierSet {
            category: self.category.clone(),
            validity: self.validity.clone(),
            message_content: self.message_content.clone(),
            domain_reputation: self.domain_reputation.clone(),
            phone_number: self.phone_number.clone(),
            transcript_content: self.transcript_content.clone(),
        }
    }

    pub fn call_count(&self, stage: Stage) -> usize {
        match stage {
            Stage::Category => self.category.call_count(),
            Stage::Validity => self.validity.call_count(),
            Stage::MessageContent => self.message_content.call_count(),
            Stage::DomainReputation => self.domain_reputation.call_count(),
            Stage::PhoneNumber => self.phone_number.call_count(),
            Stage::TranscriptContent => self.transcript_content.call_count(),
            Stage::Conclusion => 0,
        }
    }

    pub fn total_calls(&self) -> usize {
        Stage::CLASSIFIERS.iter().map(|stage| self.call_count(*stage)).sum()
    }
}

// ============================================================================
// Fake Conclusion Writer
// ============================================================================

/// Conclusion writer that records what it was asked to conclude.
pub struct FakeConclusionWriter {
    response: Result<Option<String>, StageError>,
    seen: Mutex<Vec<(u32, Severity)>>,
}

impl FakeConclusionWriter {
    /// Answer with the tier's advisory text.
    pub fn new() -> Self {
        Self {
            response: Ok(None),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer with fixed text.
    pub fn with_narrative(text: &str) -> Self {
        Self {
            response: Ok(Some(text.to_string())),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: StageError) -> Self {
        Self {
            response: Err(error),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// (score, severity) of every call, in order.
    pub fn seen(&self) -> Vec<(u32, Severity)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Default for FakeConclusionWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConclusionWriter for FakeConclusionWriter {
    async fn conclude(&self, request: &ConclusionRequest<'_>) -> Result<String, StageError> {
        self.seen
            .lock()
            .unwrap()
            .push((request.score, request.severity));

        match &self.response {
            Ok(Some(text)) => Ok(text.clone()),
            Ok(None) => Ok(request.severity.advisory().to_string()),
            Err(e) => Err(e.clone()),
        }
    }
}
