use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::chat::session::{ChatEvent, SessionInfo};
use crate::errors::AppError;
use crate::models::chat::ChatMessage;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ChatStateResponse {
    pub ready: bool,
    pub busy: bool,
    pub session: Option<SessionInfo>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// GET /api/v1/chat
pub async fn handle_get_chat(State(state): State<AppState>) -> Json<ChatStateResponse> {
    state.chat.activate(&state.chat_context());
    Json(ChatStateResponse {
        ready: state.chat.is_active(),
        busy: state.chat.is_busy(),
        session: state.chat.session_info(),
        messages: state.chat.messages(),
    })
}

/// POST /api/v1/chat/messages
///
/// The reply is driven on its own task, so it completes and lands in the log
/// even if the client goes away mid-stream.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut reply = state.chat.send(&req.text, &state.chat_context())?;

    let (tx, mut rx) = mpsc::unbounded_channel::<ChatEvent>();
    tokio::spawn(async move {
        while let Some(event) = reply.next().await {
            // A closed receiver only means nobody is watching any more.
            let _ = tx.send(event);
        }
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let name = match &event {
                ChatEvent::Delta { .. } => "delta",
                ChatEvent::Error { .. } => "error",
                ChatEvent::Done { .. } => "done",
            };
            let json = serde_json::to_string(&event).unwrap_or_default();
            yield Ok::<_, Infallible>(Event::default().event(name).data(json));
        }
    };

    Ok(Sse::new(stream))
}
