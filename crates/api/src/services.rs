//! Construction of the process-wide pose services from configuration.
//!
//! Called once from `main`; the resulting pipeline is shared read-only by
//! every handler and session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use atelier_core::error::CoreError;
use atelier_core::{GarmentRenderer, MeasurementDeriver, MeasurementPolicy};
use atelier_pipeline::backends::RemotePoseBackend;
use atelier_pipeline::{
    BackendInitError, FrameProcessingPipeline, PipelineConfig, PoseBackend, PoseEstimator,
};

use crate::config::{PoseSource, ServerConfig};

/// Which slot a backend fills. Local models differ per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Primary,
    Secondary,
}

impl Slot {
    fn name(self) -> &'static str {
        match self {
            Slot::Primary => "primary",
            Slot::Secondary => "secondary",
        }
    }
}

fn build_backend(
    source: &PoseSource,
    slot: Slot,
    timeout: Duration,
) -> Result<Arc<dyn PoseBackend>, BackendInitError> {
    match source {
        PoseSource::Remote(url) => Ok(Arc::new(RemotePoseBackend::new(
            &format!("remote:{}", slot.name()),
            url,
            timeout,
        )?)),
        PoseSource::Model(path) => load_model(path, slot),
    }
}

#[cfg(feature = "onnx")]
fn load_model(path: &Path, slot: Slot) -> Result<Arc<dyn PoseBackend>, BackendInitError> {
    use atelier_pipeline::backends::OnnxPoseBackend;

    let backend = match slot {
        Slot::Primary => OnnxPoseBackend::lightning(path)?,
        Slot::Secondary => OnnxPoseBackend::thunder(path)?,
    };
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "onnx"))]
fn load_model(path: &Path, _slot: Slot) -> Result<Arc<dyn PoseBackend>, BackendInitError> {
    Err(BackendInitError::Model(format!(
        "{}: local models need the `onnx` feature",
        path.display()
    )))
}

/// Load the measurement policy, applying the JSON override at `path` if set.
pub fn load_measurement_policy(path: Option<&Path>) -> Result<MeasurementPolicy, CoreError> {
    let Some(path) = path else {
        return Ok(MeasurementPolicy::default());
    };
    let json = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Validation(format!(
            "Cannot read measurement policy {}: {e}",
            path.display()
        ))
    })?;
    let policy = MeasurementPolicy::from_json_str(&json)?;
    tracing::info!(path = %path.display(), "Loaded measurement policy override");
    Ok(policy)
}

/// Build the frame pipeline.
///
/// Returns `None` when no primary backend is configured or it fails to
/// initialise; the service then runs without accepting sessions. A failing
/// secondary backend only disables enhancement.
pub fn build_pipeline(
    config: &ServerConfig,
    policy: MeasurementPolicy,
) -> Option<FrameProcessingPipeline> {
    let timeout = Duration::from_secs(config.pose.timeout_secs);

    let Some(primary_source) = config.pose.primary.as_ref() else {
        tracing::warn!("No primary pose backend configured, sessions are disabled");
        return None;
    };
    let primary = match build_backend(primary_source, Slot::Primary, timeout) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Primary pose backend failed to initialise");
            return None;
        }
    };

    let secondary = config.pose.secondary.as_ref().and_then(|source| {
        build_backend(source, Slot::Secondary, timeout)
            .map_err(|e| {
                tracing::warn!(error = %e, "Secondary pose backend unavailable, enhancement disabled");
            })
            .ok()
    });

    let estimator = Arc::new(PoseEstimator::new(primary, secondary));
    Some(FrameProcessingPipeline::new(
        estimator,
        MeasurementDeriver::new(policy),
        GarmentRenderer::new(config.pose.min_confidence),
        PipelineConfig {
            max_frame_width: config.max_frame_width,
            jpeg_quality: config.jpeg_quality,
            enhance_by_default: config.enhance_by_default,
        },
    ))
}
