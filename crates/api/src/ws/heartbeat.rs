use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::SessionManager;

/// Spawn a background task that sends periodic Ping frames to every
/// session.
///
/// The task runs until aborted; the returned `JoinHandle` is aborted during
/// shutdown.
pub fn start_heartbeat(
    sessions: Arc<SessionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;
            let count = sessions.session_count().await;
            tracing::debug!(count, "Session heartbeat ping");
            sessions.ping_all().await;
        }
    })
}
