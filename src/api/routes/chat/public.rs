//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::chat::RenderedTurn;

/// Header carrying the session ID of a chat request, useful when the
/// server picked one.
pub const SESSION_ID_HEADER: &str = "x-session-id";

#[derive(Deserialize)]
pub struct ChatRequest {
    // A new session is started when missing
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatTranscriptResponse {
    pub session_id: String,
    pub transcript: Vec<RenderedTurn>,
    pub presets: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ChatPresetsResponse {
    pub presets: Vec<String>,
}
