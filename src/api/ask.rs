//! `POST /api/ask` - stream the answer to a question as NDJSON.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::agent::AgentEvent;

use super::types::AskRequest;
use super::AppState;

/// Events buffered between the agent task and the response body.
const EVENT_BUFFER: usize = 64;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Start answering and return the live event stream.
///
/// The agent runs on its own task. Dropping the response body (client
/// disconnect) cancels it at its next suspension point.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Response, (StatusCode, String)> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question must not be empty".to_string()));
    }

    let request_id = Uuid::new_v4();
    tracing::info!(request_id = %request_id, question = %question, "Question received");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();

    let agent = Arc::clone(&state.agent);
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        agent.ask(&question, tx, run_cancel).await;
    });

    let body = Body::from_stream(ndjson_stream(rx, cancel.drop_guard(), request_id));
    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Serialize one event as a JSON line.
pub fn encode_line(event: &AgentEvent) -> serde_json::Result<Bytes> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Forward events as NDJSON lines until the terminal event.
///
/// If the agent task ends without a terminal event (it panicked, or an
/// agent implementation forgot one), a synthetic `error` closes the stream.
fn ndjson_stream(
    mut rx: mpsc::Receiver<AgentEvent>,
    cancel_guard: DropGuard,
    request_id: Uuid,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let _guard = cancel_guard;
        let mut terminated = false;

        while let Some(event) = rx.recv().await {
            terminated = event.is_terminal();
            tracing::debug!(request_id = %request_id, event = event.event_name(), "Streaming event");
            match encode_line(&event) {
                Ok(line) => yield Ok::<Bytes, Infallible>(line),
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Failed to serialize event; dropping");
                }
            }
            if terminated {
                break;
            }
        }

        if !terminated {
            tracing::warn!(request_id = %request_id, "Agent stopped without a terminal event");
            if let Ok(line) = encode_line(&AgentEvent::error("agent stopped without producing an answer")) {
                yield Ok(line);
            }
        }
        tracing::info!(request_id = %request_id, "Answer stream closed");
    }
}
