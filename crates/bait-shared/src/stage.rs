//! Classification stages of the decision tree.

use serde::{Deserialize, Serialize};

/// One classification stage. `Conclusion` is the leaf that writes the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Category,
    Validity,
    MessageContent,
    DomainReputation,
    PhoneNumber,
    TranscriptContent,
    Conclusion,
}

impl Stage {
    /// All classifier stages, in the order a reader meets them in the tree.
    pub const CLASSIFIERS: [Stage; 6] = [
        Stage::Category,
        Stage::Validity,
        Stage::MessageContent,
        Stage::DomainReputation,
        Stage::PhoneNumber,
        Stage::TranscriptContent,
    ];

    /// Stable snake_case identifier, used in config keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Validity => "validity",
            Self::MessageContent => "message_content",
            Self::DomainReputation => "domain_reputation",
            Self::PhoneNumber => "phone_number",
            Self::TranscriptContent => "transcript_content",
            Self::Conclusion => "conclusion",
        }
    }

    /// Flag vocabulary of the stage, in declared precedence order.
    /// The conclusion stage produces text, not flags.
    pub fn flag_names(&self) -> &'static [&'static str] {
        match self {
            Self::Category => &["is_textoremail", "is_voicemail"],
            Self::Validity => &["is_legitimate", "na"],
            Self::MessageContent | Self::TranscriptContent => &["high_risk", "low_risk", "no_risk"],
            Self::DomainReputation => &["high_risk", "no_risk", "na"],
            Self::PhoneNumber => &["high_risk", "na"],
            Self::Conclusion => &[],
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
