//! Route definitions for the `/measurements` resource.
//!
//! All endpoints require authentication except the realtime stream, where a
//! `?token=` is optional.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::measurements;
use crate::handlers::upload::UPLOAD_BODY_LIMIT;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/measurements`.
///
/// ```text
/// GET    /                -> list
/// POST   /                -> create
/// POST   /upload          -> upload
/// GET    /latest          -> latest
/// POST   /{id}/accuracy   -> accuracy
/// GET    /realtime        -> measurement_ws_handler
/// POST   /save-realtime   -> save_realtime
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(measurements::list).post(measurements::create))
        .route(
            "/upload",
            post(measurements::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/latest", get(measurements::latest))
        .route("/{id}/accuracy", post(measurements::accuracy))
        .route("/realtime", get(ws::measurement_ws_handler))
        .route("/save-realtime", post(measurements::save_realtime))
}
