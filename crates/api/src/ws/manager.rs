use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use atelier_core::garment::{GarmentConfig, GarmentType};
use atelier_core::types::{Timestamp, UserId};

use super::protocol::{AdminNotice, ServerMessage};

/// Channel sender half for pushing messages to a session's WebSocket.
pub type SessionSender = mpsc::UnboundedSender<Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// Point-in-time view of a session, published by its message loop.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: Option<UserId>,
    pub state: SessionState,
    pub connected_at: Timestamp,
    /// Frames answered with a `frame_result`, successful or not.
    pub frame_count: u64,
    pub current_garment: Option<GarmentConfig>,
    pub last_processing_time_ms: Option<f64>,
}

/// Session statistics as reported to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub user_id: Option<UserId>,
    pub state: SessionState,
    pub connected_at: Timestamp,
    pub duration_seconds: f64,
    pub frame_count: u64,
    pub current_dress: Option<GarmentType>,
    pub last_processing_time_ms: Option<f64>,
    pub fps_average: f64,
    pub is_active: bool,
}

impl SessionSnapshot {
    fn new(session_id: String, user_id: Option<UserId>) -> Self {
        Self {
            session_id,
            user_id,
            state: SessionState::Connecting,
            connected_at: chrono::Utc::now(),
            frame_count: 0,
            current_garment: None,
            last_processing_time_ms: None,
        }
    }

    pub fn duration_seconds(&self, now: Timestamp) -> f64 {
        ((now - self.connected_at).num_milliseconds() as f64 / 1000.0).max(0.0)
    }

    pub fn stats(&self, now: Timestamp) -> SessionStats {
        let duration_seconds = self.duration_seconds(now);
        let fps_average = if duration_seconds > 0.0 {
            self.frame_count as f64 / duration_seconds
        } else {
            0.0
        };
        SessionStats {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            state: self.state,
            connected_at: self.connected_at,
            duration_seconds,
            frame_count: self.frame_count,
            current_dress: self.current_garment.as_ref().map(|g| g.garment_type),
            last_processing_time_ms: self.last_processing_time_ms,
            fps_average,
            is_active: self.state == SessionState::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Pose estimator is not ready")]
    NotReady,

    #[error("Session {0} already exists")]
    DuplicateId(String),
}

/// Everything the owner of a freshly opened session needs.
///
/// `snapshot` is the only writer of the session's published state; whoever
/// holds the ticket owns the session.
pub struct SessionTicket {
    pub session_id: String,
    /// Outbound messages for the WebSocket sink.
    pub receiver: mpsc::UnboundedReceiver<Message>,
    pub sender: SessionSender,
    pub snapshot: watch::Sender<SessionSnapshot>,
}

struct SessionEntry {
    sender: SessionSender,
    snapshot: watch::Receiver<SessionSnapshot>,
}

/// Registry of live interactive sessions, keyed by session id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Sessions are not accepted until
/// [`mark_ready`](Self::mark_ready) has been called.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ready: AtomicBool,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the pose services as initialised.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Register a new session in the `Connecting` state.
    pub async fn open(
        &self,
        session_id: String,
        user_id: Option<UserId>,
    ) -> Result<SessionTicket, SessionError> {
        if !self.is_ready() {
            return Err(SessionError::NotReady);
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(SessionError::DuplicateId(session_id));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::new(session_id.clone(), user_id.clone()));

        sessions.insert(
            session_id.clone(),
            SessionEntry {
                sender: tx.clone(),
                snapshot: snapshot_rx,
            },
        );
        tracing::info!(session_id = %session_id, user_id = ?user_id, "Session opened");

        Ok(SessionTicket {
            session_id,
            receiver: rx,
            sender: tx,
            snapshot: snapshot_tx,
        })
    }

    /// Move a session to `Active`. Returns `false` if it was closed meanwhile.
    pub async fn activate(&self, ticket: &SessionTicket) -> bool {
        let registered = self.sessions.read().await.contains_key(&ticket.session_id);
        if registered {
            ticket.snapshot.send_modify(|s| s.state = SessionState::Active);
        }
        registered
    }

    /// Remove a session and ask its connection to close.
    ///
    /// Idempotent: returns `false` when the session was already gone.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(entry) => {
                let _ = entry.sender.send(Message::Close(None));
                tracing::info!(session_id = %session_id, "Session closed");
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.snapshot.borrow().clone())
    }

    /// Return the current number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Queue a message for one session. Returns `false` if it is unknown or
    /// its connection has gone away.
    pub async fn send_to(&self, session_id: &str, message: Message) -> bool {
        self.sessions
            .read()
            .await
            .get(session_id)
            .is_some_and(|entry| entry.sender.send(message).is_ok())
    }

    /// Push an administrative notice to every active session.
    ///
    /// Returns the number of sessions it was queued for.
    pub async fn broadcast_notice(&self, notice: &AdminNotice) -> usize {
        let message = ServerMessage::notice(notice).into_message();
        let sessions = self.sessions.read().await;
        let mut count = 0;
        for entry in sessions.values() {
            if entry.snapshot.borrow().state != SessionState::Active {
                continue;
            }
            if entry.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        tracing::info!(count, level = ?notice.level, "Broadcast admin notice");
        count
    }

    /// Send a Ping frame to every session.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every session, then clear the registry.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all sessions");
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
