//! Conversation state and the streaming turn loop.

pub mod models;
pub mod processor;
pub mod provider;
pub mod render;
pub mod session;

pub use models::{Conversation, Turn, TurnStatus};
pub use processor::{CURSOR, TurnEvent, TurnOutcome, live_display, process_user_turn};
pub use provider::{CompletionProvider, OpenAiProvider, SharedCompletionProvider};
pub use render::{PRESET_PROMPTS, RenderedTurn, format_block, preset, presets, render};
pub use session::{SessionStore, SharedConversation, init_state};
