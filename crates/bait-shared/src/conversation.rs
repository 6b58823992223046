//! Message and conversation context for one request.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Text under analysis, already extracted from its original medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message(String);

impl Message {
    /// Reject empty or whitespace-only input before any stage runs.
    pub fn new(text: impl Into<String>) -> Result<Self, AnalysisError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyMessage);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Append-only turn log shared read-only by every stage of one traversal.
///
/// Seeded with the message as the sole user turn. The only later write is
/// the conclusion narrative, appended once after finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationContext {
    turns: Vec<Turn>,
}

impl ConversationContext {
    pub fn seed(message: &Message) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::User,
                content: message.as_str().to_string(),
            }],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The message being analyzed.
    pub fn message(&self) -> &str {
        self.turns
            .first()
            .map(|turn| turn.content.as_str())
            .unwrap_or_default()
    }

    /// Append the conclusion narrative. Returns false if a conclusion is
    /// already present, leaving the log unchanged.
    pub fn append_conclusion(&mut self, narrative: &str) -> bool {
        if self.conclusion().is_some() {
            return false;
        }
        self.turns.push(Turn {
            role: Role::Assistant,
            content: narrative.to_string(),
        });
        true
    }

    pub fn conclusion(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_rejects_blank() {
        assert_eq!(Message::new("  \n\t"), Err(AnalysisError::EmptyMessage));
        assert!(Message::new("Your parcel is waiting").is_ok());
    }

    #[test]
    fn test_context_seeded_with_single_user_turn() {
        let message = Message::new("Call 555-0100 now").unwrap();
        let ctx = ConversationContext::seed(&message);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.turns()[0].role, Role::User);
        assert_eq!(ctx.message(), "Call 555-0100 now");
        assert!(ctx.conclusion().is_none());
    }

    #[test]
    fn test_conclusion_appended_once() {
        let message = Message::new("hello").unwrap();
        let mut ctx = ConversationContext::seed(&message);
        assert!(ctx.append_conclusion("No risk."));
        assert!(!ctx.append_conclusion("High risk."));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.conclusion(), Some("No risk."));
    }
}
