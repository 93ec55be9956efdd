use std::env;

use anyhow::{Context, Error, Result, anyhow};

use crate::openai::CompletionOptions;

pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are a helpful assistant. You can answer general questions and provide useful insights.";

pub const DEFAULT_CONTEXT_URLS: &[&str] = &[
    "https://en.wikipedia.org/wiki/OpenAI",
    "https://en.wikipedia.org/wiki/ChatGPT",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub temperature: f64,
    pub system_message: String,
    pub context_urls: Vec<String>,
}

impl AppConfig {
    /// Load the config from the process environment. A missing
    /// `OPENAI_API_KEY` is fatal since no chat can work without it.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(anyhow!("Missing env var OPENAI_API_KEY"))?;
        let openai_api_hostname = lookup("CHATBOT_LLM_HOST")
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let openai_model =
            lookup("CHATBOT_LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let temperature = match lookup("CHATBOT_TEMPERATURE") {
            Some(t) => t
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid CHATBOT_TEMPERATURE: {}", t))?,
            None => 0.7,
        };
        let system_message = lookup("CHATBOT_SYSTEM_MESSAGE")
            .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string());
        let context_urls = context_urls_from(&lookup);

        Ok(Self {
            openai_api_hostname,
            openai_api_key,
            openai_model,
            temperature,
            system_message,
            context_urls,
        })
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.openai_model.clone(),
            temperature: self.temperature,
        }
    }
}

/// The context page URLs from `CHATBOT_CONTEXT_URLS`, falling back to
/// the defaults when unset. Needs no API key.
pub fn context_urls_from<F>(lookup: &F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("CHATBOT_CONTEXT_URLS") {
        Some(urls) => parse_urls(&urls),
        None => DEFAULT_CONTEXT_URLS.iter().map(|s| s.to_string()).collect(),
    }
}

// Comma separated, blanks dropped. An empty value disables scraping.
pub fn parse_urls(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
