//! Stage outcomes and flag resolution.
//!
//! Stage services answer with a set of named boolean flags. The contract
//! expects exactly one of them to be true; `StageOutcome::resolve` turns the
//! raw `FlagSet` into the stage's closed enum under an explicit
//! `AmbiguityPolicy`, so a malformed answer never silently picks a branch.

use crate::error::AnalysisError;
use crate::score::ScoreWeights;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keys that carry a single outcome name instead of boolean flags,
/// e.g. `{"type": "is_voicemail"}`.
const SELECTOR_KEYS: [&str; 3] = ["type", "result", "outcome"];

// ============================================================================
// Ambiguity Policy
// ============================================================================

/// What to do when a stage reports zero or several true flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Exactly one true flag or `AnalysisError::OutcomeAmbiguous`.
    #[default]
    Strict,
    /// First true flag in declared order wins; none set selects the
    /// stage's fallback outcome.
    Precedence,
}

impl std::fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Precedence => write!(f, "precedence"),
        }
    }
}

// ============================================================================
// Flag Set
// ============================================================================

/// Raw flags reported by one stage invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet {
    flags: BTreeMap<String, bool>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with exactly one true flag.
    pub fn single(name: &str) -> Self {
        Self::new().with(name, true)
    }

    pub fn with(mut self, name: &str, value: bool) -> Self {
        self.flags.insert(normalize_flag(name), value);
        self
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Names of all true flags, sorted.
    pub fn true_flags(&self) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(_, set)| **set)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Parse the shapes stage services emit: an object of booleans, an
    /// object with a single selector string, or a bare string.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(name) => {
                let name = normalize_flag(name);
                if name.is_empty() {
                    return Err("empty outcome string".to_string());
                }
                Ok(Self::single(&name))
            }
            Value::Object(map) => {
                let mut set = Self::new();
                for (key, value) in map {
                    match value {
                        Value::Bool(b) => set = set.with(key, *b),
                        Value::String(s) if SELECTOR_KEYS.contains(&key.as_str()) => {
                            set = set.with(s, true);
                        }
                        // Reasoning text and other extras are not flags
                        _ => {}
                    }
                }
                if set.is_empty() {
                    Err(format!("no outcome flags in {}", value))
                } else {
                    Ok(set)
                }
            }
            other => Err(format!("expected object or string, got {}", other)),
        }
    }
}

/// Lowercase, strip quotes and trailing punctuation, unify separators.
fn normalize_flag(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim()
        .to_lowercase()
        .replace(['-', ' '], "_")
}

// ============================================================================
// Stage Outcome Trait
// ============================================================================

/// Closed outcome set of one classifier stage.
pub trait StageOutcome: Copy + PartialEq + std::fmt::Debug + Send + 'static {
    const STAGE: Stage;

    /// Variants paired with their flag name, in declared precedence order.
    const VARIANTS: &'static [(&'static str, Self)];

    /// Outcome the precedence policy selects when no flag is set.
    const FALLBACK: Self;

    /// Score contribution of this outcome.
    fn delta(&self, weights: &ScoreWeights) -> u32;

    /// Flag name of this outcome.
    fn flag(&self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(_, variant)| variant == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Resolve raw flags into this stage's outcome.
    fn resolve(flags: &FlagSet, policy: AmbiguityPolicy) -> Result<Self, AnalysisError> {
        let known = |name: &str| Self::VARIANTS.iter().any(|(flag, _)| *flag == name);
        if let Some(unknown) = flags.true_flags().into_iter().find(|name| !known(*name)) {
            return Err(AnalysisError::OutcomeMalformed {
                stage: Self::STAGE,
                detail: format!("unknown flag '{}'", unknown),
            });
        }

        let set: Vec<(&'static str, Self)> = Self::VARIANTS
            .iter()
            .filter(|(name, _)| flags.is_set(name))
            .copied()
            .collect();

        match (policy, set.as_slice()) {
            (_, [(_, only)]) => Ok(*only),
            (AmbiguityPolicy::Precedence, [(_, first), ..]) => Ok(*first),
            (AmbiguityPolicy::Precedence, []) => Ok(Self::FALLBACK),
            (AmbiguityPolicy::Strict, _) => Err(AnalysisError::OutcomeAmbiguous {
                stage: Self::STAGE,
                flags: set.iter().map(|(name, _)| name.to_string()).collect(),
            }),
        }
    }
}

// ============================================================================
// Per-stage Outcomes
// ============================================================================

/// Which branch of the tree the message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryOutcome {
    TextOrEmail,
    Voicemail,
}

impl StageOutcome for CategoryOutcome {
    const STAGE: Stage = Stage::Category;
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("is_textoremail", Self::TextOrEmail),
        ("is_voicemail", Self::Voicemail),
    ];
    const FALLBACK: Self = Self::Voicemail;

    fn delta(&self, _weights: &ScoreWeights) -> u32 {
        0
    }
}

/// Whether every phone number, address and URL in the message checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityOutcome {
    Legitimate,
    Unverified,
}

impl StageOutcome for ValidityOutcome {
    const STAGE: Stage = Stage::Validity;
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("is_legitimate", Self::Legitimate),
        ("na", Self::Unverified),
    ];
    const FALLBACK: Self = Self::Unverified;

    fn delta(&self, weights: &ScoreWeights) -> u32 {
        match self {
            Self::Legitimate => 0,
            Self::Unverified => weights.validity_unverified,
        }
    }
}

/// Phishing cues found in a text message or email body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageContentOutcome {
    HighRisk,
    LowRisk,
    NoRisk,
}

impl StageOutcome for MessageContentOutcome {
    const STAGE: Stage = Stage::MessageContent;
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("high_risk", Self::HighRisk),
        ("low_risk", Self::LowRisk),
        ("no_risk", Self::NoRisk),
    ];
    const FALLBACK: Self = Self::NoRisk;

    fn delta(&self, weights: &ScoreWeights) -> u32 {
        match self {
            Self::HighRisk => weights.message_high_risk,
            Self::LowRisk => weights.message_low_risk,
            Self::NoRisk => 0,
        }
    }
}

/// Registration signals for the domain linked from the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOutcome {
    HighRisk,
    NoRisk,
    Unknown,
}

impl StageOutcome for DomainOutcome {
    const STAGE: Stage = Stage::DomainReputation;
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("high_risk", Self::HighRisk),
        ("no_risk", Self::NoRisk),
        ("na", Self::Unknown),
    ];
    const FALLBACK: Self = Self::Unknown;

    fn delta(&self, weights: &ScoreWeights) -> u32 {
        match self {
            Self::HighRisk => weights.domain_high_risk,
            Self::NoRisk | Self::Unknown => 0,
        }
    }
}

/// Scam reports for the callback number left in a voicemail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneOutcome {
    HighRisk,
    Unknown,
}

impl StageOutcome for PhoneOutcome {
    const STAGE: Stage = Stage::PhoneNumber;
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("high_risk", Self::HighRisk),
        ("na", Self::Unknown),
    ];
    const FALLBACK: Self = Self::Unknown;

    fn delta(&self, weights: &ScoreWeights) -> u32 {
        match self {
            Self::HighRisk => weights.phone_high_risk,
            Self::Unknown => 0,
        }
    }
}

/// Phishing cues found in a voicemail transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptContentOutcome {
    HighRisk,
    LowRisk,
    NoRisk,
}

impl StageOutcome for TranscriptContentOutcome {
    const STAGE: Stage = Stage::TranscriptContent;
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("high_risk", Self::HighRisk),
        ("low_risk", Self::LowRisk),
        ("no_risk", Self::NoRisk),
    ];
    const FALLBACK: Self = Self::NoRisk;

    fn delta(&self, weights: &ScoreWeights) -> u32 {
        match self {
            Self::HighRisk => weights.transcript_high_risk,
            Self::LowRisk => weights.transcript_low_risk,
            Self::NoRisk => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared<O: StageOutcome>() -> Vec<&'static str> {
        O::VARIANTS.iter().map(|(name, _)| *name).collect()
    }

    #[test]
    fn test_variants_match_stage_vocabulary() {
        assert_eq!(declared::<CategoryOutcome>(), Stage::Category.flag_names());
        assert_eq!(declared::<ValidityOutcome>(), Stage::Validity.flag_names());
        assert_eq!(declared::<MessageContentOutcome>(), Stage::MessageContent.flag_names());
        assert_eq!(declared::<DomainOutcome>(), Stage::DomainReputation.flag_names());
        assert_eq!(declared::<PhoneOutcome>(), Stage::PhoneNumber.flag_names());
        assert_eq!(
            declared::<TranscriptContentOutcome>(),
            Stage::TranscriptContent.flag_names()
        );
    }

    #[test]
    fn test_flag_set_from_bool_object_ignores_extras() {
        let value = json!({"high_risk": false, "low_risk": true, "no_risk": false, "why": "two cues"});
        let flags = FlagSet::from_value(&value).unwrap();
        assert_eq!(flags.true_flags(), vec!["low_risk"]);
    }

    #[test]
    fn test_flag_set_from_selector_and_string() {
        let flags = FlagSet::from_value(&json!({"type": "is_voicemail"})).unwrap();
        assert!(flags.is_set("is_voicemail"));

        let flags = FlagSet::from_value(&json!(" \"NA\". ")).unwrap();
        assert_eq!(flags.true_flags(), vec!["na"]);

        let flags = FlagSet::from_value(&json!("high-risk")).unwrap();
        assert!(flags.is_set("high_risk"));
    }

    #[test]
    fn test_flag_set_rejects_shapes_without_flags() {
        assert!(FlagSet::from_value(&json!({"reasoning": "none"})).is_err());
        assert!(FlagSet::from_value(&json!(42)).is_err());
        assert!(FlagSet::from_value(&json!("  ")).is_err());
    }

    #[test]
    fn test_strict_rejects_zero_and_many() {
        let none = FlagSet::new().with("high_risk", false);
        let err = MessageContentOutcome::resolve(&none, AmbiguityPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::OutcomeAmbiguous { stage: Stage::MessageContent, flags: vec![] }
        );

        let many = FlagSet::single("high_risk").with("no_risk", true);
        let err = MessageContentOutcome::resolve(&many, AmbiguityPolicy::Strict).unwrap_err();
        assert!(matches!(err, AnalysisError::OutcomeAmbiguous { ref flags, .. } if flags.len() == 2));
    }

    #[test]
    fn test_precedence_first_declared_wins() {
        let many = FlagSet::single("no_risk").with("high_risk", true);
        let outcome = MessageContentOutcome::resolve(&many, AmbiguityPolicy::Precedence).unwrap();
        assert_eq!(outcome, MessageContentOutcome::HighRisk);

        let both = FlagSet::single("is_legitimate").with("na", true);
        let outcome = ValidityOutcome::resolve(&both, AmbiguityPolicy::Precedence).unwrap();
        assert_eq!(outcome, ValidityOutcome::Legitimate);
    }

    #[test]
    fn test_precedence_none_takes_fallback() {
        let none = FlagSet::new().with("is_legitimate", false).with("na", false);
        let outcome = ValidityOutcome::resolve(&none, AmbiguityPolicy::Precedence).unwrap();
        assert_eq!(outcome, ValidityOutcome::Unverified);

        let none = FlagSet::new().with("is_textoremail", false);
        let outcome = CategoryOutcome::resolve(&none, AmbiguityPolicy::Precedence).unwrap();
        assert_eq!(outcome, CategoryOutcome::Voicemail);
    }

    #[test]
    fn test_unknown_true_flag_is_malformed() {
        let flags = FlagSet::single("low_risk");
        let err = PhoneOutcome::resolve(&flags, AmbiguityPolicy::Precedence).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::OutcomeMalformed { stage: Stage::PhoneNumber, .. }
        ));
    }

    #[test]
    fn test_default_deltas() {
        let w = ScoreWeights::default();
        assert_eq!(ValidityOutcome::Unverified.delta(&w), 4);
        assert_eq!(ValidityOutcome::Legitimate.delta(&w), 0);
        assert_eq!(MessageContentOutcome::LowRisk.delta(&w), 1);
        assert_eq!(DomainOutcome::Unknown.delta(&w), 0);
        assert_eq!(TranscriptContentOutcome::HighRisk.delta(&w), 6);
        assert_eq!(TranscriptContentOutcome::HighRisk.flag(), "high_risk");
    }
}
