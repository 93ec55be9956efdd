//! Router for the chat API

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use super::public;
use crate::api::state::AppState;
use crate::chat::{PRESET_PROMPTS, TurnEvent, TurnOutcome, presets, process_user_turn, render};

type SharedState = Arc<AppState>;

/// Get the rendered transcript of a chat session
async fn chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let Some(conversation) = state.sessions.get(&id)? else {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Chat session {} not found", id),
        )
            .into_response());
    };

    // Waits for a response that is still streaming to be committed
    let conversation = conversation.lock().await;
    let resp = public::ChatTranscriptResponse {
        session_id: id,
        transcript: render(&conversation, None),
        presets: presets(&conversation).iter().map(|p| p.to_string()).collect(),
    };

    Ok(axum::Json(resp).into_response())
}

/// End a chat session and drop its conversation
async fn delete_chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, crate::api::public::ApiError> {
    if state.sessions.remove(&id)? {
        tracing::debug!("Ended chat session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Get the preset prompts offered for a new session
async fn chat_presets() -> axum::Json<public::ChatPresetsResponse> {
    axum::Json(public::ChatPresetsResponse {
        presets: PRESET_PROMPTS.iter().map(|p| p.to_string()).collect(),
    })
}

/// Initiate or add to a chat session and stream the response
async fn chat_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    // Nothing to do for empty input and no session is created for it
    if payload.message.trim().is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // The ID is echoed back in a header so reject it before any state
    // is created for it
    let Ok(session_header) = HeaderValue::from_str(&session_id) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            "Session ID must be a valid header value",
        )
            .into_response());
    };
    let conversation = state.conversation(&session_id).await?;

    let (tx, rx) = mpsc::unbounded_channel::<TurnEvent>();
    let sse_stream =
        UnboundedReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    let provider = Arc::clone(&state.provider);
    let options = state.config.completion_options();
    let message = payload.message;
    let task_session_id = session_id.clone();

    // Process the turn in the background so the response can start
    // streaming immediately. The stream ends when `tx` is dropped.
    tokio::spawn(async move {
        let mut conversation = conversation.lock().await;
        let outcome =
            process_user_turn(&mut conversation, &message, provider.as_ref(), &options, &tx)
                .await;

        match outcome {
            TurnOutcome::Completed(_) => {
                tracing::debug!("Chat session {} completed a turn", task_session_id)
            }
            TurnOutcome::Failed(_) => {
                tracing::warn!("Chat session {} failed a turn", task_session_id)
            }
            TurnOutcome::Skipped => {}
        }
    });

    let mut resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();
    resp.headers_mut()
        .insert(public::SESSION_ID_HEADER, session_header);

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/presets", get(chat_presets))
        .route("/{id}", get(chat_session).delete(delete_chat_session))
}
