//! Interactive fitting sessions over WebSocket.
//!
//! Provides the session registry, the per-session worker, the wire
//! protocol, heartbeat monitoring and the HTTP upgrade handlers used by
//! Axum routes. [`realtime`] is the separate measurement-only stream.

mod handler;
mod heartbeat;
pub mod manager;
pub mod protocol;
pub mod realtime;
pub mod session;

pub use handler::session_ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{SessionError, SessionManager, SessionSnapshot, SessionState, SessionStats};
pub use protocol::{AdminNotice, NoticeLevel, ServerMessage};
pub use realtime::measurement_ws_handler;
pub use session::SessionWorker;
