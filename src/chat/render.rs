//! Turns a conversation into role tagged blocks for display.

use serde::{Deserialize, Serialize};

use super::models::{Conversation, Turn, TurnStatus};
use super::processor::live_display;
use crate::openai::Role;

/// Canned inputs offered before the first question. Picking one is
/// the same as typing it.
pub const PRESET_PROMPTS: [&str; 2] = ["What is ChatGPT?", "Explain how LLMs work"];

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RenderedTurn {
    pub role: Role,
    pub text: String,
    pub status: TurnStatus,
    /// Still being typed out
    pub streaming: bool,
}

fn turn_text(turn: &Turn) -> String {
    let error = turn.error.as_deref().unwrap_or("unknown error");
    match turn.status {
        TurnStatus::Complete => turn.content.clone(),
        TurnStatus::Partial => format!("{}\n\n[response interrupted: {}]", turn.content, error),
        TurnStatus::Error => format!("[response failed: {}]", error),
    }
}

/// Render every turn in order. A `live` buffer is shown as a trailing
/// assistant block with the cursor in place of the response that
/// hasn't been committed yet. Rendering the same input always gives
/// the same output.
pub fn render(conversation: &Conversation, live: Option<&str>) -> Vec<RenderedTurn> {
    let mut blocks: Vec<RenderedTurn> = conversation
        .turns()
        .iter()
        .map(|turn| RenderedTurn {
            role: turn.role,
            text: turn_text(turn),
            status: turn.status,
            streaming: false,
        })
        .collect();

    if let Some(buffer) = live {
        blocks.push(RenderedTurn {
            role: Role::Assistant,
            text: live_display(buffer),
            status: TurnStatus::Complete,
            streaming: true,
        });
    }

    blocks
}

/// The presets to offer, only while nothing has been asked yet.
pub fn presets(conversation: &Conversation) -> &'static [&'static str] {
    if conversation.is_fresh() {
        &PRESET_PROMPTS
    } else {
        &[]
    }
}

/// Look up a preset by its 1-based position.
pub fn preset(conversation: &Conversation, choice: usize) -> Option<&'static str> {
    choice
        .checked_sub(1)
        .and_then(|idx| presets(conversation).get(idx).copied())
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Plain text rendering for a terminal.
pub fn format_block(block: &RenderedTurn) -> String {
    format!("[{}]\n{}\n", role_label(block.role), block.text)
}
