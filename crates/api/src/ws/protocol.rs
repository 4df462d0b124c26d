//! JSON wire protocol of the interactive fitting session.
//!
//! Every message is an object with a `type` discriminator.
//!
//! ```text
//! client -> server   frame | change_dress | get_session_info | ping
//! server -> client   session_started | frame_result | dress_changed |
//!                    session_info | pong | ping | notice | error
//! ```

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use atelier_core::garment::GarmentConfig;
use atelier_core::types::{Timestamp, UserId};
use atelier_pipeline::FrameResult;

use super::manager::SessionStats;

const CLIENT_MESSAGE_TYPES: [&str; 4] = ["frame", "change_dress", "get_session_info", "ping"];

/* --------------------------------------------------------------------------
Inbound
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Frame(FrameMessage),
    ChangeDress { dress_config: Value },
    GetSessionInfo,
    Ping,
}

/// A camera frame to process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameMessage {
    /// `data:image/...;base64,` URL or bare base64.
    #[serde(default)]
    pub frame_data: Option<String>,
    /// Garment to render. The session's current garment is used when absent.
    #[serde(default)]
    pub dress_config: Option<Value>,
    #[serde(default)]
    pub enhance: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// The message says `frame` but its body does not parse. Still answered
    /// with a `frame_result`.
    #[error("Invalid frame message: {0}")]
    InvalidFrame(String),
}

/// Parse one inbound text message.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing \"type\" field".into()))?
        .to_string();

    if !CLIENT_MESSAGE_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|e| {
        if kind == "frame" {
            ProtocolError::InvalidFrame(e.to_string())
        } else {
            ProtocolError::Malformed(e.to_string())
        }
    })
}

/* --------------------------------------------------------------------------
Outbound
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    #[default]
    Info,
    Warning,
    Maintenance,
}

/// Operational message an administrator pushes to every active session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdminNotice {
    #[serde(default)]
    pub level: NoticeLevel,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionStarted {
        session_id: String,
        user_id: Option<UserId>,
        enhancement_available: bool,
        timestamp: Timestamp,
    },
    FrameResult {
        session_id: String,
        data: FrameResult,
        timestamp: Timestamp,
    },
    DressChanged {
        session_id: String,
        dress_config: GarmentConfig,
    },
    SessionInfo {
        session_id: String,
        data: SessionStats,
    },
    Pong {
        timestamp: Timestamp,
    },
    /// Sent when the client has been silent for the idle timeout.
    Ping {
        timestamp: Timestamp,
    },
    Notice {
        level: NoticeLevel,
        message: String,
        timestamp: Timestamp,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn notice(notice: &AdminNotice) -> Self {
        ServerMessage::Notice {
            level: notice.level,
            message: notice.message.clone(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Encode as a WebSocket text frame.
    pub fn into_message(self) -> Message {
        match serde_json::to_string(&self) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server message");
                Message::Text(r#"{"type":"error","message":"serialization failed"}"#.into())
            }
        }
    }
}
