use anyhow::{Error, Result};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use super::models::{Conversation, Turn};
use super::provider::CompletionProvider;
use crate::openai::{CompletionOptions, Message, Role};

/// Shown after the in-progress response while it streams.
pub const CURSOR: &str = "▌";

/// The text to display for a response that is still streaming.
pub fn live_display(buffer: &str) -> String {
    format!("{}{}", buffer, CURSOR)
}

/// Updates sent while a turn is processed so a UI can render the
/// response as it is typed out.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A fragment arrived. `display` is the accumulated response so
    /// far followed by the cursor.
    Delta { fragment: String, display: String },
    /// The response finished and was committed.
    Done { content: String },
    /// The response failed. `partial` is whatever arrived before.
    Error { message: String, partial: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// Empty input, nothing happened
    Skipped,
    Completed(Turn),
    Failed(Turn),
}

// Pull fragments strictly in arrival order, publishing the growing
// buffer after every one of them.
async fn stream_response(
    provider: &dyn CompletionProvider,
    history: &[Message],
    options: &CompletionOptions,
    buffer: &mut String,
    tx: &mpsc::UnboundedSender<TurnEvent>,
) -> Result<(), Error> {
    let mut stream = provider.complete_stream(history, options).await?;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if fragment.is_empty() {
            continue;
        }
        buffer.push_str(&fragment);

        // The result is ignored because the turn must be committed
        // even if nobody is listening anymore
        let _ = tx.send(TurnEvent::Delta {
            fragment,
            display: live_display(buffer),
        });
    }

    Ok(())
}

/// Runs the next turn in chat: appends the user's input, streams the
/// response for the entire history and appends it once finished.
///
/// Blank input is ignored. A failed response never ends the session:
/// it is committed as a `Partial` or `Error` assistant turn (which
/// is not replayed on later turns) and reported through `tx`.
pub async fn process_user_turn(
    conversation: &mut Conversation,
    user_text: &str,
    provider: &dyn CompletionProvider,
    options: &CompletionOptions,
    tx: &mpsc::UnboundedSender<TurnEvent>,
) -> TurnOutcome {
    if user_text.trim().is_empty() {
        tracing::debug!("Ignoring empty user input");
        return TurnOutcome::Skipped;
    }

    conversation.push(Turn::new(Role::User, user_text));
    let history = conversation.history();

    let mut buffer = String::new();
    let result = stream_response(provider, &history, options, &mut buffer, tx).await;

    match result {
        Ok(()) => {
            let turn = Turn::new(Role::Assistant, &buffer);
            conversation.push(turn.clone());
            let _ = tx.send(TurnEvent::Done { content: buffer });
            TurnOutcome::Completed(turn)
        }
        Err(e) => {
            tracing::error!("Chat completion error: {}. Root cause: {}", e, e.root_cause());

            let message = format!("Something went wrong: {}", e);
            let turn = Turn::failed(&buffer, &message);
            conversation.push(turn.clone());
            let _ = tx.send(TurnEvent::Error {
                message,
                partial: buffer,
            });
            TurnOutcome::Failed(turn)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::chat::models::TurnStatus;
    use crate::openai::FragmentStream;

    /// Replays canned responses in order and records every history it
    /// was called with.
    struct ScriptedProvider {
        responses: Mutex<Vec<Script>>,
        calls: Mutex<Vec<Vec<Message>>>,
    }

    enum Script {
        Fragments(Vec<&'static str>),
        FailAfter(Vec<&'static str>, &'static str),
        FailToConnect(&'static str),
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Script>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<Message>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete_stream(
            &self,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<FragmentStream, Error> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let script = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .expect("No scripted response left");

            let items: Vec<Result<String, Error>> = match script {
                Script::Fragments(fragments) => {
                    fragments.into_iter().map(|f| Ok(f.to_string())).collect()
                }
                Script::FailAfter(fragments, error) => fragments
                    .into_iter()
                    .map(|f| Ok(f.to_string()))
                    .chain(std::iter::once(Err(anyhow!(error))))
                    .collect(),
                Script::FailToConnect(error) => return Err(anyhow!(error)),
            };
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TurnEvent>) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_streams_and_commits_response() {
        let provider = ScriptedProvider::new(vec![Script::Fragments(vec![
            "Chat", "GPT is ", "an AI.",
        ])]);
        let mut conversation = Conversation::new("system");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = process_user_turn(
            &mut conversation,
            "What is ChatGPT?",
            &provider,
            &CompletionOptions::default(),
            &tx,
        )
        .await;

        let expected = Turn::new(Role::Assistant, "ChatGPT is an AI.");
        assert_eq!(outcome, TurnOutcome::Completed(expected.clone()));
        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.turns()[1],
            Turn::new(Role::User, "What is ChatGPT?")
        );
        assert_eq!(conversation.last(), Some(&expected));

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                TurnEvent::Delta {
                    fragment: "Chat".to_string(),
                    display: "Chat▌".to_string(),
                },
                TurnEvent::Delta {
                    fragment: "GPT is ".to_string(),
                    display: "ChatGPT is ▌".to_string(),
                },
                TurnEvent::Delta {
                    fragment: "an AI.".to_string(),
                    display: "ChatGPT is an AI.▌".to_string(),
                },
                TurnEvent::Done {
                    content: "ChatGPT is an AI.".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_committed_content_equals_accumulated_fragments() {
        let fragments = vec!["Un", "ic", "ødé ", "", "✓\n", "done"];
        let provider = ScriptedProvider::new(vec![Script::Fragments(fragments.clone())]);
        let mut conversation = Conversation::new("system");
        let (tx, mut rx) = mpsc::unbounded_channel();

        process_user_turn(
            &mut conversation,
            "hi",
            &provider,
            &CompletionOptions::default(),
            &tx,
        )
        .await;

        let accumulated: String = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TurnEvent::Delta { fragment, .. } => Some(fragment),
                _ => None,
            })
            .collect();
        assert_eq!(accumulated, fragments.concat());
        assert_eq!(conversation.last().unwrap().content, accumulated);
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let provider = ScriptedProvider::new(vec![]);
        let mut conversation = Conversation::new("system");
        let before = conversation.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for input in ["", "   ", "\n"] {
            let outcome = process_user_turn(
                &mut conversation,
                input,
                &provider,
                &CompletionOptions::default(),
                &tx,
            )
            .await;
            assert_eq!(outcome, TurnOutcome::Skipped);
        }

        assert_eq!(conversation, before);
        assert!(provider.calls().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_grows_by_two_turns_per_exchange() {
        let provider = ScriptedProvider::new(vec![
            Script::Fragments(vec!["one"]),
            Script::Fragments(vec!["two"]),
            Script::Fragments(vec!["three"]),
        ]);
        let mut conversation = Conversation::new("system");
        let (tx, _rx) = mpsc::unbounded_channel();

        for (n, input) in ["a", "b", "c"].iter().enumerate() {
            process_user_turn(
                &mut conversation,
                input,
                &provider,
                &CompletionOptions::default(),
                &tx,
            )
            .await;
            assert_eq!(conversation.len(), 1 + 2 * (n + 1));
        }
        assert_eq!(conversation.turns()[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_replays_full_history() {
        let provider = ScriptedProvider::new(vec![
            Script::Fragments(vec!["one"]),
            Script::Fragments(vec!["two"]),
        ]);
        let mut conversation = Conversation::new("system");
        let (tx, _rx) = mpsc::unbounded_channel();
        let options = CompletionOptions::default();

        process_user_turn(&mut conversation, "a", &provider, &options, &tx).await;
        process_user_turn(&mut conversation, "b", &provider, &options, &tx).await;

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            vec![
                Message::new(Role::System, "system"),
                Message::new(Role::User, "a"),
            ]
        );
        assert_eq!(
            calls[1],
            vec![
                Message::new(Role::System, "system"),
                Message::new(Role::User, "a"),
                Message::new(Role::Assistant, "one"),
                Message::new(Role::User, "b"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_mid_stream_is_marked_partial() {
        let provider = ScriptedProvider::new(vec![Script::FailAfter(
            vec!["Hel"],
            "connection reset",
        )]);
        let mut conversation = Conversation::new("system");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = process_user_turn(
            &mut conversation,
            "Hello?",
            &provider,
            &CompletionOptions::default(),
            &tx,
        )
        .await;

        let TurnOutcome::Failed(turn) = outcome else {
            panic!("Expected a failed turn");
        };
        assert_eq!(turn.status, TurnStatus::Partial);
        assert_eq!(turn.content, "Hel");
        assert!(turn.error.as_ref().unwrap().contains("connection reset"));

        // No turn claims to be a complete answer
        assert_eq!(conversation.len(), 3);
        assert!(
            !conversation
                .turns()
                .iter()
                .any(|t| t.role == Role::Assistant && t.status.is_complete())
        );

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(TurnEvent::Error { partial, .. }) if partial == "Hel"));
    }

    #[tokio::test]
    async fn test_failure_before_stream_and_recovery() {
        let provider = ScriptedProvider::new(vec![
            Script::FailToConnect("missing credentials"),
            Script::Fragments(vec!["Recovered"]),
        ]);
        let mut conversation = Conversation::new("system");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let options = CompletionOptions::default();

        let outcome = process_user_turn(&mut conversation, "first", &provider, &options, &tx).await;
        let TurnOutcome::Failed(turn) = outcome else {
            panic!("Expected a failed turn");
        };
        assert_eq!(turn.status, TurnStatus::Error);
        assert_eq!(turn.content, "");
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TurnEvent::Error { message, .. }] if message.contains("missing credentials")
        ));

        // The session continues and the failed response isn't replayed
        let outcome = process_user_turn(&mut conversation, "second", &provider, &options, &tx).await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed(Turn::new(Role::Assistant, "Recovered"))
        );
        assert_eq!(conversation.len(), 5);
        assert_eq!(
            provider.calls()[1],
            vec![
                Message::new(Role::System, "system"),
                Message::new(Role::User, "first"),
                Message::new(Role::User, "second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_commits_when_receiver_is_gone() {
        let provider = ScriptedProvider::new(vec![Script::Fragments(vec!["still ", "saved"])]);
        let mut conversation = Conversation::new("system");
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let outcome = process_user_turn(
            &mut conversation,
            "hi",
            &provider,
            &CompletionOptions::default(),
            &tx,
        )
        .await;

        assert_eq!(
            outcome,
            TurnOutcome::Completed(Turn::new(Role::Assistant, "still saved"))
        );
    }

    #[test]
    fn test_turn_event_serialization() {
        let event = TurnEvent::Delta {
            fragment: "Hi".to_string(),
            display: "Hi▌".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"delta","fragment":"Hi","display":"Hi▌"}"#
        );
        let event = TurnEvent::Done {
            content: "Hi".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"done","content":"Hi"}"#
        );
    }
}
