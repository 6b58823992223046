//! Severity tiers and the score → conclusion mapping.
//!
//! Pure decision functions: the tier depends on the finalized score and
//! nothing else.

use serde::{Deserialize, Serialize};

/// Minimum score for each tier.
pub const HIGH_THRESHOLD: u32 = 7;
pub const MEDIUM_THRESHOLD: u32 = 5;
pub const LOW_THRESHOLD: u32 = 1;

/// Most sentences a conclusion may contain.
pub const MAX_CONCLUSION_SENTENCES: usize = 2;

/// Severity tier derived from a finalized risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= HIGH_THRESHOLD => Self::High,
            s if s >= MEDIUM_THRESHOLD => Self::Medium,
            s if s >= LOW_THRESHOLD => Self::Low,
            _ => Self::None,
        }
    }

    /// Short verdict label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high risk, phishing likely",
            Self::Medium => "medium risk, possibly phishing",
            Self::Low => "low risk, unlikely phishing",
            Self::None => "no risk",
        }
    }

    /// Fixed advisory text for this tier, at most two sentences.
    pub fn advisory(&self) -> &'static str {
        match self {
            Self::High => "The message is very suspicious and highly likely to be a phishing scam. Do not reply, open its links, or call back any number it gives.",
            Self::Medium => "The message might be a phishing scam. Verify the sender through an official channel before you act on it.",
            Self::Low => "The message is not likely to be a phishing scam. Stay cautious if it asks for personal or payment details.",
            Self::None => "There is no sign of phishing in this message. You don't need to take any further action.",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Answer of one request: the tier and its advisory text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conclusion {
    pub severity: Severity,
    pub text: String,
}

impl Conclusion {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// Titles that end in a period without ending the sentence.
const TITLES: &[&str] = &["mr", "mrs", "ms", "dr", "prof", "st", "jr", "sr", "vs"];

/// Keep at most `max` sentences of `text`, joined onto one line.
///
/// A word ending in `.`, `!` or `?` closes a sentence only when the next
/// word starts with an uppercase letter or a digit. A period after a single
/// letter ("U.S.", "e.g.") or a title ("Mr.") never does.
pub fn limit_sentences(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut kept = words.len();
    let mut seen = 0;
    for (i, word) in words.iter().enumerate() {
        if ends_sentence(word, words.get(i + 1).copied()) {
            seen += 1;
            if seen == max {
                kept = i + 1;
                break;
            }
        }
    }

    words[..kept].join(" ")
}

fn ends_sentence(word: &str, next: Option<&str>) -> bool {
    let body = word.trim_end_matches(['"', '\'', ')', ']']);
    let stem = body.trim_end_matches(['.', '!', '?']);
    if stem.len() == body.len() {
        return false;
    }

    let Some(next) = next else {
        return true;
    };
    let opens_sentence = next
        .trim_start_matches(['"', '\'', '(', '['])
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit());
    if !opens_sentence {
        return false;
    }

    if body.ends_with('.') {
        let tail: String = stem
            .chars()
            .rev()
            .take_while(|c| c.is_alphanumeric())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let letters = tail.chars().filter(|c| c.is_alphabetic()).count();
        if letters == 1 || TITLES.contains(&tail.to_lowercase().as_str()) {
            return false;
        }
    }
    true
}
