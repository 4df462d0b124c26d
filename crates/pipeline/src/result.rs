use serde::Serialize;

use atelier_core::measurement::MeasurementSet;

/// Processing stages, in order. A failed result names the stage it stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Configure,
    Decode,
    Detect,
    Measure,
    Render,
    Encode,
}

/// Outcome of the optional secondary-model pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementStatus {
    #[default]
    NotRequested,
    Applied,
    /// Requested but no secondary backend is configured.
    Unavailable,
    /// The secondary backend or the fusion step failed; the primary pose
    /// was used on its own.
    Failed,
    /// Requested and available, but the frame failed before fusion.
    Skipped,
}

/// Response to one processed frame.
///
/// `success == false` implies `measurements` is `None`; `frame` then holds
/// the undecorated original if decoding got that far.
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub success: bool,
    pub frame: Option<String>,
    pub measurements: Option<MeasurementSet>,
    pub pose_confidence: f32,
    pub dress_config: serde_json::Value,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,
    pub enhancement: EnhancementStatus,
}

impl FrameResult {
    /// A failed result with no frame, as produced before decoding succeeds.
    pub fn failed(
        stage: PipelineStage,
        error: impl Into<String>,
        dress_config: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            frame: None,
            measurements: None,
            pose_confidence: 0.0,
            dress_config,
            processing_time_ms: 0.0,
            error: Some(error.into()),
            failed_stage: Some(stage),
            enhancement: EnhancementStatus::NotRequested,
        }
    }
}
