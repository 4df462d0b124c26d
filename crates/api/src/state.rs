use std::sync::Arc;

use atelier_db::FittingStore;
use atelier_pipeline::FrameProcessingPipeline;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::ws::SessionManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Fitting and measurement persistence.
    pub store: Arc<dyn FittingStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live interactive sessions.
    pub sessions: Arc<SessionManager>,
    /// Frame pipeline. `None` when no pose backend could be initialised.
    pub pipeline: Option<Arc<FrameProcessingPipeline>>,
}

impl AppState {
    /// The frame pipeline, or 503 when the pose estimator is not available.
    pub fn pipeline(&self) -> AppResult<&Arc<FrameProcessingPipeline>> {
        self.pipeline
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Pose estimator is not ready".into()))
    }
}
