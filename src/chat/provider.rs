use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::core::AppConfig;
use crate::openai::{CompletionOptions, FragmentStream, Message, completion_stream};

/// Anything that can turn a chat history into a stream of response
/// fragments. The provider is stateless so the full history is sent
/// every time.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<FragmentStream, Error>;
}

pub type SharedCompletionProvider = Arc<dyn CompletionProvider + 'static>;

/// Streams completions from an OpenAI compatible API.
#[derive(Clone, Debug)]
pub struct OpenAiProvider {
    api_hostname: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_hostname: &str, api_key: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.openai_api_hostname, &config.openai_api_key)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<FragmentStream, Error> {
        tracing::debug!(
            "Requesting completion from {} with {} messages",
            self.api_hostname,
            messages.len()
        );
        completion_stream(messages, options, &self.api_hostname, &self.api_key).await
    }
}
