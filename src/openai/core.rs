use std::time::Duration;

use anyhow::{Error, Result, anyhow, bail};
use futures::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Fixed per-request options sent along with every completion.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: String::from("gpt-4o-mini"),
            temperature: 0.7,
        }
    }
}

/// Incremental text fragments of a streamed completion in arrival
/// order. The stream ends when the completion is done.
pub type FragmentStream = BoxStream<'static, Result<String, Error>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delta {
    Content { content: String },

    Reasoning { reasoning: String },

    Stop {},
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    // The final usage chunk has no choices
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
    error: Option<Value>,
}

/// What a single server-sent event contributes to the stream.
#[derive(Debug, PartialEq)]
enum StreamItem {
    Fragment(String),
    Skip,
    Done,
}

fn parse_event(event_data: &str) -> Result<StreamItem, Error> {
    // An event is a block of `field: value` lines. Only `data` lines
    // matter and multiple ones are joined with a newline.
    let mut data_lines: Vec<&str> = Vec::new();
    for line in event_data.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data_lines.is_empty() {
        // Comments, keep-alives and events without data
        return Ok(StreamItem::Skip);
    }
    let joined = data_lines.join("\n");
    let data = joined.trim();

    // Data can sometimes be empty
    if data.is_empty() {
        return Ok(StreamItem::Skip);
    }
    if data == "[DONE]" {
        return Ok(StreamItem::Done);
    }

    let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
        tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
    })?;
    if let Some(err) = chunk.error {
        bail!("Completion stream returned an error: {}", err);
    }

    let Some(choice) = chunk.choices.first() else {
        return Ok(StreamItem::Skip);
    };
    match &choice.delta {
        // The last content delta can arrive together with the
        // `finish_reason` so it must still be kept
        Delta::Content { content } if !content.is_empty() => {
            Ok(StreamItem::Fragment(content.clone()))
        }
        Delta::Content { .. } => Ok(StreamItem::Skip),
        Delta::Reasoning { reasoning } => {
            tracing::trace!("Reasoning: {}", reasoning);
            Ok(StreamItem::Skip)
        }
        Delta::Stop {} => Ok(StreamItem::Skip),
    }
}

/// Request a streaming chat completion from an OpenAI compatible API
/// and return the content deltas as they arrive.
///
/// Errors before the first byte (connection, non-success status) are
/// returned directly. Errors after that are yielded by the stream.
pub async fn completion_stream(
    messages: &[Message],
    options: &CompletionOptions,
    api_hostname: &str,
    api_key: &str,
) -> Result<FragmentStream, Error> {
    let payload = json!({
        "model": options.model,
        "messages": messages,
        "temperature": options.temperature,
        "stream": true,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 5))
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Completion request failed with status {}: {}", status, body);
    }

    let mut stream = response.bytes_stream();

    Ok(Box::pin(async_stream::try_stream! {
        // Raw bytes are buffered so that an event (or a multi-byte
        // character) split across HTTP frames is only decoded once
        // complete.
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);

            while let Some((event_end, separator_len)) = find_event_end(&buffer) {
                let event: Vec<u8> = buffer.drain(..event_end + separator_len).collect();
                let event_data = std::str::from_utf8(&event[..event_end])?;

                match parse_event(event_data)? {
                    StreamItem::Fragment(fragment) => yield fragment,
                    StreamItem::Skip => continue,
                    StreamItem::Done => {
                        done = true;
                        break 'outer;
                    }
                }
            }
        }

        // Whatever is left is a final event without a trailing blank
        // line. Anything after `[DONE]` is ignored.
        if !done && !buffer.is_empty() {
            let event_data = std::str::from_utf8(&buffer)
                .map_err(|e| anyhow!("Invalid trailing completion data: {}", e))?;
            if let StreamItem::Fragment(fragment) = parse_event(event_data)? {
                yield fragment;
            }
        }
    }))
}

// Events end at a blank line. Returns where the event ends and the
// length of the separator, accepting both `\n\n` and `\r\n\r\n`.
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    buffer
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .find_map(|(idx, _)| match &buffer[idx + 1..] {
            [b'\n', ..] => Some((idx, 2)),
            [b'\r', b'\n', ..] => Some((idx, 3)),
            _ => None,
        })
}
