//! The core models for managing a stateful chat with an LLM.
use serde::{Deserialize, Serialize};

use crate::openai::{Message, Role};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    #[default]
    Complete,
    /// The response stream failed after some text was received
    Partial,
    /// The response failed before any text was received
    Error,
}

impl TurnStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, TurnStatus::Complete)
    }
}

/// One role tagged message in a conversation. Never modified after
/// being appended to a `Conversation`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "TurnStatus::is_complete")]
    pub status: TurnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Turn {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            status: TurnStatus::Complete,
            error: None,
        }
    }

    /// An assistant turn for a response that did not finish. Whatever
    /// text arrived is kept and the turn is marked `Partial`, or
    /// `Error` if nothing arrived.
    pub fn failed(partial: &str, error: &str) -> Self {
        let status = if partial.is_empty() {
            TurnStatus::Error
        } else {
            TurnStatus::Partial
        };
        Self {
            role: Role::Assistant,
            content: partial.to_string(),
            status,
            error: Some(error.to_string()),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::new(self.role, &self.content)
    }
}

/// The ordered turns of one session. Starts with exactly one system
/// turn and only ever grows.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation(Vec<Turn>);

impl Conversation {
    pub fn new(system_prompt: &str) -> Self {
        Self(vec![Turn::new(Role::System, system_prompt)])
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True until the first user input.
    pub fn is_fresh(&self) -> bool {
        self.0.len() == 1
    }

    pub fn system_turn(&self) -> &Turn {
        &self.0[0]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.0.last()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.0.push(turn)
    }

    /// The history replayed to the completion API on every request.
    /// Everything is sent except responses that did not complete.
    // Nothing here caps the length so long sessions grow without
    // bound.
    pub fn history(&self) -> Vec<Message> {
        self.0
            .iter()
            .filter(|t| t.status.is_complete())
            .map(Turn::to_message)
            .collect()
    }
}
