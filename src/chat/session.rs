use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Error, Result, anyhow};
use tokio::sync::Mutex;

use super::models::Conversation;
use crate::ai::prompt::system_prompt;

/// A conversation shared between request handlers. The lock is held
/// for a whole turn so a session only ever has one request in flight.
pub type SharedConversation = Arc<Mutex<Conversation>>;

/// Create the conversation for a new session: a single system turn
/// with the scraped context embedded.
pub fn init_state(instruction: &str, context: &str) -> Result<Conversation, Error> {
    let prompt = system_prompt(instruction, context)?;
    Ok(Conversation::new(&prompt))
}

/// In memory conversations keyed by session ID. Sessions never share
/// state and live until removed or the process exits.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedConversation>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Result<Option<SharedConversation>, Error> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        Ok(sessions.get(session_id).map(Arc::clone))
    }

    /// Return the session's conversation, creating it with `init` the
    /// first time. `init` is not called when the session exists.
    pub fn get_or_init<F>(&self, session_id: &str, init: F) -> Result<SharedConversation, Error>
    where
        F: FnOnce() -> Result<Conversation, Error>,
    {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        if let Some(existing) = sessions.get(session_id) {
            return Ok(Arc::clone(existing));
        }

        let conversation = Arc::new(Mutex::new(init()?));
        sessions.insert(session_id.to_string(), Arc::clone(&conversation));
        tracing::debug!("Created chat session {}", session_id);
        Ok(conversation)
    }

    /// Drop the session's conversation. Returns whether it existed. A
    /// turn still streaming keeps its own handle and finishes normally.
    pub fn remove(&self, session_id: &str) -> Result<bool, Error> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        Ok(sessions.remove(session_id).is_some())
    }

    pub fn len(&self) -> Result<usize, Error> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        Ok(sessions.len())
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }
}
