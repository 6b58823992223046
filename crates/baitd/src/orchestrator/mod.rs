//! Analysis orchestration.
//!
//! Category → branch stages → conclusion, over pluggable stage backends:
//! - `classifier`: capability traits and the per-role classifier set
//! - `sequencer`: the decision tree, score accumulation and finalize
//! - `llm_client` / `prompts`: stages backed by a reasoning service
//! - `fake`: deterministic stand-ins for tests

pub mod classifier;
pub mod fake;
pub mod llm_client;
pub mod prompts;
pub mod sequencer;

pub use classifier::{
    Classifier, ClassifierSet, ConclusionRequest, ConclusionWriter, TemplateConclusionWriter,
};
pub use fake::{FakeClassifier, FakeClassifiers, FakeConclusionWriter};
pub use llm_client::{LlmClassifier, LlmClient, LlmConclusionWriter};
pub use sequencer::{SequencerSettings, StageSequencer};
