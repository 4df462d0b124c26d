//! Measurement-only stream over WebSocket.
//!
//! The client sends camera frames and receives body measurements for each;
//! nothing is rendered and nothing is stored. Clients keep a result with
//! `POST /api/v1/measurements/save-realtime`.
//!
//! ```text
//! client -> server   {"type": "frame", "image": "<data URL or base64>"}
//!                    {"type": "heartbeat"}
//! server -> client   connection_established | measurement_update |
//!                    measurement_error | decode_error | processing_error |
//!                    heartbeat | ping | error
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use atelier_core::error::FrameError;
use atelier_core::measurement::MeasurementSet;
use atelier_core::types::{Timestamp, UserId};
use atelier_pipeline::{FramePayload, FrameProcessingPipeline};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::handler::SessionParams;
use crate::ws::manager::SessionError;

/// One inbound message. Anything without an image counts as a heartbeat.
#[derive(Debug, Default, Deserialize)]
struct MeasureRequest {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasurementMessage {
    ConnectionEstablished {
        user_id: Option<UserId>,
        timestamp: Timestamp,
    },
    MeasurementUpdate {
        measurements: MeasurementSet,
        confidence: f32,
        timestamp: Timestamp,
    },
    /// The frame decoded but no usable pose was found.
    MeasurementError {
        error: String,
        timestamp: Timestamp,
    },
    DecodeError {
        error: String,
        timestamp: Timestamp,
    },
    ProcessingError {
        error: String,
        timestamp: Timestamp,
    },
    Heartbeat {
        timestamp: Timestamp,
    },
    /// Sent when the client has been silent for the idle timeout.
    Ping {
        timestamp: Timestamp,
    },
    /// The message was not a JSON object.
    Error {
        message: String,
    },
}

impl MeasurementMessage {
    fn into_message(self) -> Option<Message> {
        match serde_json::to_string(&self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize measurement message");
                None
            }
        }
    }
}

/// Answer one inbound text message.
pub async fn answer(pipeline: &FrameProcessingPipeline, text: &str) -> MeasurementMessage {
    let timestamp = chrono::Utc::now();
    let request: MeasureRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            return MeasurementMessage::Error {
                message: format!("Invalid data format: {e}"),
            }
        }
    };

    let image = match request.image {
        Some(image) if !image.is_empty() && request.kind.as_deref() != Some("heartbeat") => image,
        _ => return MeasurementMessage::Heartbeat { timestamp },
    };

    match pipeline.measure(FramePayload::DataUrl(image)).await {
        Ok((measurements, confidence)) => MeasurementMessage::MeasurementUpdate {
            measurements,
            confidence,
            timestamp: chrono::Utc::now(),
        },
        Err(FrameError::InvalidFrame(reason)) => MeasurementMessage::DecodeError {
            error: reason,
            timestamp: chrono::Utc::now(),
        },
        Err(FrameError::NoPoseDetected) => MeasurementMessage::MeasurementError {
            error: FrameError::NoPoseDetected.to_string(),
            timestamp: chrono::Utc::now(),
        },
        Err(e) => MeasurementMessage::ProcessingError {
            error: e.to_string(),
            timestamp: chrono::Utc::now(),
        },
    }
}

/// GET /api/v1/measurements/realtime
///
/// Upgrades to a measurement stream. Responds 503 until the pose estimator
/// is ready and 401 when a supplied token is invalid.
pub async fn measurement_ws_handler(
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
    let idle_timeout = Duration::from_secs(state.config.session_idle_timeout_secs);

    Ok(ws
        .on_upgrade(move |socket| handle_stream(socket, pipeline, user_id, idle_timeout))
        .into_response())
}

/// Answer frames in order until the client goes away. Each frame is
/// measured before the next message is read.
async fn handle_stream(
    mut socket: WebSocket,
    pipeline: Arc<FrameProcessingPipeline>,
    user_id: Option<UserId>,
    idle_timeout: Duration,
) {
    let stream_id = uuid::Uuid::new_v4();
    tracing::info!(stream_id = %stream_id, user_id = ?user_id, "Measurement stream opened");

    let welcome = MeasurementMessage::ConnectionEstablished {
        user_id,
        timestamp: chrono::Utc::now(),
    };
    if !send(&mut socket, welcome).await {
        return;
    }

    let mut frames: u64 = 0;
    loop {
        let reply = match tokio::time::timeout(idle_timeout, socket.recv()).await {
            Err(_elapsed) => {
                tracing::debug!(stream_id = %stream_id, "Measurement stream idle, pinging client");
                MeasurementMessage::Ping {
                    timestamp: chrono::Utc::now(),
                }
            }
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(stream_id = %stream_id, error = %e, "WebSocket receive error");
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                let reply = answer(&pipeline, text.as_str()).await;
                if matches!(reply, MeasurementMessage::MeasurementUpdate { .. }) {
                    frames += 1;
                }
                reply
            }
            Ok(Some(Ok(_))) => continue,
        };
        if !send(&mut socket, reply).await {
            break;
        }
    }

    tracing::info!(stream_id = %stream_id, frames, "Measurement stream closed");
}

async fn send(socket: &mut WebSocket, message: MeasurementMessage) -> bool {
    match message.into_message() {
        Some(message) => socket.send(message).await.is_ok(),
        None => true,
    }
}
