//! Shared types for bait components.
//!
//! Everything here is pure data and pure decision logic: stage identities,
//! outcome resolution, the risk score, the severity mapper and the error
//! types. No I/O lives in this crate.

pub mod api;
pub mod conversation;
pub mod error;
pub mod outcome;
pub mod score;
pub mod severity;
pub mod stage;
pub mod trace;
pub mod verdict;

pub use api::{AnalyzeRequest, ErrorResponse, HealthResponse, VerdictResponse};
pub use conversation::{ConversationContext, Message, Role, Turn};
pub use error::{AnalysisError, IngestError, StageError};
pub use outcome::{
    AmbiguityPolicy, CategoryOutcome, DomainOutcome, FlagSet, MessageContentOutcome,
    PhoneOutcome, StageOutcome, TranscriptContentOutcome, ValidityOutcome,
};
pub use score::{RiskScore, ScoreWeights};
pub use severity::{Conclusion, Severity};
pub use stage::Stage;
pub use trace::TraceMetadata;
pub use verdict::{Branch, StepRecord, Verdict};

/// Version of the bait workspace, shared by daemon and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default address the daemon binds to.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";
