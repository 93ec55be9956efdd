use std::sync::Arc;

use anyhow::{Error, Result};

use crate::chat::{SessionStore, SharedCompletionProvider, SharedConversation, init_state};
use crate::core::AppConfig;
use crate::scrape::ContextLoader;

pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionStore,
    // Scraped once and shared read-only by every session
    pub context: Arc<ContextLoader>,
    pub provider: SharedCompletionProvider,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        context: Arc<ContextLoader>,
        provider: SharedCompletionProvider,
    ) -> Self {
        Self {
            config,
            sessions: SessionStore::new(),
            context,
            provider,
        }
    }

    /// Get the conversation for the session, seeding a new one with
    /// the system turn on first use.
    pub async fn conversation(&self, session_id: &str) -> Result<SharedConversation, Error> {
        if let Some(existing) = self.sessions.get(session_id)? {
            return Ok(existing);
        }
        let context = self.context.load().await;
        self.sessions.get_or_init(session_id, || {
            init_state(&self.config.system_message, context)
        })
    }
}
