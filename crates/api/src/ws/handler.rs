use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use atelier_core::types::UserId;
use atelier_pipeline::FrameProcessingPipeline;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::manager::{SessionError, SessionManager};
use crate::ws::session::SessionWorker;

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    /// Optional access token used to attribute the session to a user.
    pub token: Option<String>,
}

/// GET /api/v1/ar/ws
///
/// Upgrades to a fitting session. Responds 503 until the pose estimator is
/// ready and 401 when a supplied token is invalid.
pub async fn session_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
) -> AppResult<Response> {
    let pipeline = Arc::clone(state.pipeline()?);
    if !state.sessions.is_ready() {
        return Err(SessionError::NotReady.into());
    }

    let user_id = params
        .token
        .as_deref()
        .map(|token| AuthUser::from_token(token, &state.config.jwt))
        .transpose()?
        .map(|user| user.user_id);

    let sessions = Arc::clone(&state.sessions);
    let idle_timeout = Duration::from_secs(state.config.session_idle_timeout_secs);

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, sessions, pipeline, user_id, idle_timeout))
        .into_response())
}

/// Run one session after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Opens and activates the session with `SessionManager`.
///   2. Spawns a sender task that forwards queued messages to the sink.
///   3. Answers inbound messages in order on the current task; a frame is
///      fully processed before the next message is read.
///   4. Cleans up on disconnect, termination, or sink failure.
async fn handle_socket(
    socket: WebSocket,
    sessions: Arc<SessionManager>,
    pipeline: Arc<FrameProcessingPipeline>,
    user_id: Option<UserId>,
    idle_timeout: Duration,
) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let ticket = match sessions.open(session_id.clone(), user_id).await {
        Ok(ticket) => ticket,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Session rejected after upgrade");
            return;
        }
    };
    sessions.activate(&ticket).await;

    let (mut worker, rx) = SessionWorker::from_ticket(ticket, pipeline);
    let (sink, mut stream) = socket.split();
    let mut send_task = tokio::spawn(forward_outbound(rx, sink, session_id.clone()));

    worker.send(worker.started_message());

    loop {
        let next = tokio::select! {
            _ = &mut send_task => break,
            next = tokio::time::timeout(idle_timeout, stream.next()) => next,
        };

        match next {
            Err(_elapsed) => {
                if !worker.idle_ping() {
                    break;
                }
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                let reply = worker.handle_text(text.as_str()).await;
                if !worker.send(reply) {
                    break;
                }
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(Message::Pong(_)))) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(Some(Ok(_))) => {}
        }
    }

    sessions.close(&session_id).await;
    let snapshot = worker.close();
    send_task.abort();
    tracing::info!(
        session_id = %session_id,
        frames = snapshot.frame_count,
        "Session disconnected"
    );
}

/// Forward queued messages to the WebSocket sink until the queue closes,
/// the sink fails, or a Close frame has been sent.
async fn forward_outbound(
    mut rx: mpsc::UnboundedReceiver<Message>,
    mut sink: SplitSink<WebSocket, Message>,
    session_id: String,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if sink.send(msg).await.is_err() {
            tracing::debug!(session_id = %session_id, "WebSocket sink closed");
            break;
        }
        if closing {
            break;
        }
    }
}
