pub mod ar;
pub mod health;
pub mod measurements;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ar/dress-templates                        list templates (public)
/// /ar/customize-dress                        customise a template (POST)
/// /ar/process-frame                          process one uploaded frame (POST)
/// /ar/ws                                     interactive session (WebSocket)
/// /ar/sessions/{id}/stats                    live session statistics
/// /ar/sessions/{id}                          terminate session (DELETE)
/// /ar/sessions/{id}/fittings                 save fitting outcome (POST)
/// /ar/fittings                               fitting history
/// /ar/analytics                              fitting totals per dress type
/// /ar/admin/broadcast                        notice to active sessions (admin only)
///
/// /measurements                              list, create
/// /measurements/upload                       measure an uploaded image (POST)
/// /measurements/latest                       newest measurement
/// /measurements/{id}/accuracy                compare with manual values (POST)
/// /measurements/realtime                     measurement stream (WebSocket)
/// /measurements/save-realtime                keep a streamed result (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Dress templates, frame processing and live sessions.
        .nest("/ar", ar::router())
        // Body measurements.
        .nest("/measurements", measurements::router())
}
