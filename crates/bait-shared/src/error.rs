//! Error types for bait.

use crate::stage::Stage;
use thiserror::Error;

/// Failure of a single stage backend (classifier or conclusion writer).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("stage backend is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("stage returned an empty response")]
    EmptyResponse,

    #[error("stage unavailable: {0}")]
    Unavailable(String),
}

/// Failure of one traversal. Every variant aborts the request; there is no
/// partial or default conclusion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("{stage} classifier failed: {source}")]
    ClassifierInvocation {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("{stage} classifier returned {} true flags [{}], exactly one expected", .flags.len(), .flags.join(", "))]
    OutcomeAmbiguous { stage: Stage, flags: Vec<String> },

    #[error("{stage} classifier returned an outcome outside its closed set: {detail}")]
    OutcomeMalformed { stage: Stage, detail: String },

    #[error("conclusion stage failed: {0}")]
    ConclusionGeneration(#[source] StageError),
}

impl AnalysisError {
    /// Stage the failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::EmptyMessage => None,
            Self::ClassifierInvocation { stage, .. }
            | Self::OutcomeAmbiguous { stage, .. }
            | Self::OutcomeMalformed { stage, .. } => Some(*stage),
            Self::ConclusionGeneration(_) => Some(Stage::Conclusion),
        }
    }
}

/// Failure to turn an uploaded medium into message text.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("unsupported file type or encoding")]
    UnsupportedEncoding,

    #[error("error processing image for OCR: {0}")]
    Ocr(String),

    #[error("error transcribing audio: {0}")]
    Transcription(String),

    #[error("no text could be extracted")]
    NoText,
}
