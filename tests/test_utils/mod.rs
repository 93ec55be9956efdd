//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::Arc;

use axum::{Router, body::Body};

use chatbot::api::AppState;
use chatbot::api::app;
use chatbot::chat::OpenAiProvider;
use chatbot::core::AppConfig;
use chatbot::scrape::ContextLoader;

/// Creates a test application router that talks to a completion API
/// at `llm_host` (usually a `mockito` server) and scrapes the given
/// context pages.
pub fn test_app_with_context(llm_host: &str, context_urls: Vec<String>) -> Router {
    let app_config = AppConfig {
        openai_api_hostname: llm_host.to_string(),
        openai_api_key: String::from("test-api-key"),
        openai_model: String::from("gpt-4o-mini"),
        temperature: 0.7,
        system_message: String::from("You are a helpful assistant."),
        context_urls: context_urls.clone(),
    };
    let context = ContextLoader::new(context_urls).expect("Failed to build context loader");
    let provider = OpenAiProvider::from_config(&app_config);
    let app_state = AppState::new(app_config, Arc::new(context), Arc::new(provider));
    app(Arc::new(app_state))
}

/// Creates a test application router without any context pages.
pub fn test_app(llm_host: &str) -> Router {
    test_app_with_context(llm_host, vec![])
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

/// Collect the JSON payloads of every `data:` line of an SSE body.
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .map(|data| serde_json::from_str(data).expect("Invalid event JSON"))
        .collect()
}

/// An OpenAI style SSE body streaming `fragments` as content deltas.
pub fn sse_completion(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "delta": {"content": fragment}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
