/// Domain-level errors surfaced to HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of a single frame-processing call.
///
/// None of these terminate an interactive session: the pipeline converts
/// every variant into a failed or degraded frame result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The payload could not be decoded as an image.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// No person was found in the frame.
    #[error("No pose detected")]
    NoPoseDetected,

    /// The secondary pose model was requested but is not configured.
    #[error("Pose enhancement unavailable: {0}")]
    EnhancementUnavailable(String),

    /// Unexpected failure while detecting, measuring or rendering.
    #[error("Processing error: {0}")]
    Processing(String),
}
