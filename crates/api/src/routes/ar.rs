//! Route definitions for the `/ar` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::ar;
use crate::handlers::upload::UPLOAD_BODY_LIMIT;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/ar`.
///
/// ```text
/// GET    /dress-templates             -> list_dress_templates
/// POST   /customize-dress             -> customize_dress
/// POST   /process-frame               -> process_frame
/// GET    /ws                          -> session_ws_handler
/// GET    /sessions/{id}/stats         -> session_stats
/// DELETE /sessions/{id}               -> terminate_session
/// POST   /sessions/{id}/fittings      -> save_fitting
/// GET    /fittings                    -> list_fittings
/// GET    /analytics                   -> analytics
/// POST   /admin/broadcast             -> broadcast_notice
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dress-templates", get(ar::list_dress_templates))
        .route("/customize-dress", post(ar::customize_dress))
        .route(
            "/process-frame",
            post(ar::process_frame).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/ws", get(ws::session_ws_handler))
        .route("/sessions/{id}/stats", get(ar::session_stats))
        .route("/sessions/{id}", delete(ar::terminate_session))
        .route("/sessions/{id}/fittings", post(ar::save_fitting))
        .route("/fittings", get(ar::list_fittings))
        .route("/analytics", get(ar::analytics))
        .route("/admin/broadcast", post(ar::broadcast_notice))
}
