//! Per-frame processing: decode → downscale → detect → [fuse] → measure →
//! render → upscale → encode.
//!
//! Every call produces exactly one [`FrameResult`]. Failures stop the
//! pipeline at the stage they happen in and are reported in the result; they
//! never propagate to the caller. CPU-heavy stages run on the blocking pool.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;

use atelier_core::error::FrameError;
use atelier_core::frame::{self, DEFAULT_JPEG_QUALITY};
use atelier_core::fusion::{self, DEFAULT_FUSION_MAP};
use atelier_core::garment::GarmentConfig;
use atelier_core::measurement::{MeasurementDeriver, MeasurementSet};
use atelier_core::pose::FrameShape;
use atelier_core::render::GarmentRenderer;

use crate::estimator::PoseEstimator;
use crate::result::{EnhancementStatus, FrameResult, PipelineStage};

/// Default maximum frame width processed at full resolution.
pub const DEFAULT_MAX_FRAME_WIDTH: u32 = 640;

/// Incoming frame bytes.
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// `data:image/...;base64,` URL or bare base64.
    DataUrl(String),
    /// Raw JPEG / PNG / WebP bytes.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frames wider than this are downscaled before detection.
    pub max_frame_width: u32,
    pub jpeg_quality: u8,
    /// Whether frames that do not say otherwise use the secondary model.
    pub enhance_by_default: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_frame_width: DEFAULT_MAX_FRAME_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            enhance_by_default: false,
        }
    }
}

/// A decoded frame and the working copy detection runs on.
struct Decoded {
    original: Arc<RgbImage>,
    working: Arc<RgbImage>,
    /// `working` width / `original` width.
    scale: f64,
}

struct Processed {
    frame: String,
    measurements: MeasurementSet,
    confidence: f32,
    enhancement: EnhancementStatus,
}

struct StageFailure {
    stage: PipelineStage,
    error: FrameError,
    original: Option<Arc<RgbImage>>,
    enhancement: EnhancementStatus,
}

pub struct FrameProcessingPipeline {
    estimator: Arc<PoseEstimator>,
    deriver: Arc<MeasurementDeriver>,
    renderer: Arc<GarmentRenderer>,
    config: PipelineConfig,
}

impl FrameProcessingPipeline {
    pub fn new(
        estimator: Arc<PoseEstimator>,
        deriver: MeasurementDeriver,
        renderer: GarmentRenderer,
        config: PipelineConfig,
    ) -> Self {
        Self {
            estimator,
            deriver: Arc::new(deriver),
            renderer: Arc::new(renderer),
            config,
        }
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a frame with a raw `dress_config` wire value.
    ///
    /// An invalid config fails the frame at [`PipelineStage::Configure`] and
    /// echoes the raw value back.
    pub async fn process(
        &self,
        payload: FramePayload,
        dress_config: &serde_json::Value,
        enhance: Option<bool>,
    ) -> FrameResult {
        let started = Instant::now();
        match GarmentConfig::from_json(dress_config) {
            Ok(config) => self.process_with_config(payload, config, enhance).await,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected dress_config");
                FrameResult {
                    processing_time_ms: elapsed_ms(started),
                    ..FrameResult::failed(PipelineStage::Configure, e.to_string(), dress_config.clone())
                }
            }
        }
    }

    /// Process a frame with an already resolved garment config.
    pub async fn process_with_config(
        &self,
        payload: FramePayload,
        config: GarmentConfig,
        enhance: Option<bool>,
    ) -> FrameResult {
        let started = Instant::now();
        let dress_config = serde_json::to_value(&config).unwrap_or(serde_json::Value::Null);
        let enhance = enhance.unwrap_or(self.config.enhance_by_default);

        match self.run(payload, config, enhance).await {
            Ok(done) => {
                let processing_time_ms = elapsed_ms(started);
                tracing::debug!(
                    elapsed_ms = processing_time_ms,
                    confidence = done.confidence,
                    enhancement = ?done.enhancement,
                    "Frame processed"
                );
                FrameResult {
                    success: true,
                    frame: Some(done.frame),
                    measurements: Some(done.measurements),
                    pose_confidence: done.confidence,
                    dress_config,
                    processing_time_ms,
                    error: None,
                    failed_stage: None,
                    enhancement: done.enhancement,
                }
            }
            Err(failure) => {
                tracing::warn!(
                    stage = ?failure.stage,
                    error = %failure.error,
                    "Frame processing failed"
                );
                let frame = match failure.original {
                    Some(original) => self.encode_best_effort(original).await,
                    None => None,
                };
                FrameResult {
                    success: false,
                    frame,
                    measurements: None,
                    pose_confidence: 0.0,
                    dress_config,
                    processing_time_ms: elapsed_ms(started),
                    error: Some(failure.error.to_string()),
                    failed_stage: Some(failure.stage),
                    enhancement: failure.enhancement,
                }
            }
        }
    }

    /// Decode, detect and measure without rendering.
    ///
    /// Returns the measurements and the pose confidence.
    pub async fn measure(&self, payload: FramePayload) -> Result<(MeasurementSet, f32), FrameError> {
        let max_width = self.config.max_frame_width;
        let decoded = run_blocking(move || decode(payload, max_width)).await?;

        let pose = self.estimator.detect(Arc::clone(&decoded.working)).await?;

        let deriver = Arc::clone(&self.deriver);
        let working = Arc::clone(&decoded.working);
        let scale = decoded.scale;
        run_blocking(move || {
            let shape = FrameShape::new(working.width(), working.height());
            Ok((deriver.derive(&pose, shape, scale), pose.confidence()))
        })
        .await
    }

    async fn run(
        &self,
        payload: FramePayload,
        config: GarmentConfig,
        enhance: bool,
    ) -> Result<Processed, StageFailure> {
        let capable = self.estimator.capabilities().enhancement;
        let mut enhancement = match (enhance, capable) {
            (false, _) => EnhancementStatus::NotRequested,
            (true, false) => EnhancementStatus::Unavailable,
            (true, true) => EnhancementStatus::Skipped,
        };

        // ---- Decode ----
        let max_width = self.config.max_frame_width;
        let decoded = run_blocking(move || decode(payload, max_width))
            .await
            .map_err(|error| StageFailure {
                stage: PipelineStage::Decode,
                error,
                original: None,
                enhancement,
            })?;
        let fail = |stage: PipelineStage, error: FrameError, enhancement: EnhancementStatus| {
            StageFailure {
                stage,
                error,
                original: Some(Arc::clone(&decoded.original)),
                enhancement,
            }
        };

        // ---- Detect ----
        let working = Arc::clone(&decoded.working);
        let (primary, secondary) = if enhance && capable {
            let (p, s) = tokio::join!(
                self.estimator.detect(Arc::clone(&working)),
                self.estimator.detect_enhanced(Arc::clone(&working)),
            );
            (p, Some(s))
        } else {
            (self.estimator.detect(Arc::clone(&working)).await, None)
        };
        let mut pose = primary.map_err(|e| fail(PipelineStage::Detect, e, enhancement))?;

        // ---- Fuse ----
        if let Some(secondary) = secondary {
            match secondary {
                Ok(secondary) => {
                    let fused = fusion::fuse(&pose, &secondary, &DEFAULT_FUSION_MAP);
                    if fused.is_empty() {
                        tracing::warn!("Fusion produced no shared landmarks");
                        enhancement = EnhancementStatus::Failed;
                    } else {
                        pose = fusion::apply(&pose, &fused);
                        enhancement = EnhancementStatus::Applied;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Secondary pose detection failed, using primary only");
                    enhancement = EnhancementStatus::Failed;
                }
            }
        }

        // ---- Measure ----
        let deriver = Arc::clone(&self.deriver);
        let scale = decoded.scale;
        let confidence = pose.confidence();
        let pose = Arc::new(pose);
        let measured_pose = Arc::clone(&pose);
        let measured_frame = Arc::clone(&working);
        let measurements = run_blocking(move || {
            let shape = FrameShape::new(measured_frame.width(), measured_frame.height());
            Ok(deriver.derive(&measured_pose, shape, scale))
        })
        .await
        .map_err(|e| fail(PipelineStage::Measure, e, enhancement))?;

        // ---- Render ----
        let renderer = Arc::clone(&self.renderer);
        let (width, height) = decoded.original.dimensions();
        let rendered = run_blocking(move || {
            let rendered = renderer.render(&working, &pose, &config);
            Ok(frame::resize_to(rendered, width, height))
        })
        .await
        .map_err(|e| fail(PipelineStage::Render, e, enhancement))?;

        // ---- Encode ----
        let quality = self.config.jpeg_quality;
        let frame = run_blocking(move || frame::encode_data_url(&rendered, quality))
            .await
            .map_err(|e| fail(PipelineStage::Encode, e, enhancement))?;

        Ok(Processed {
            frame,
            measurements,
            confidence,
            enhancement,
        })
    }

    async fn encode_best_effort(&self, original: Arc<RgbImage>) -> Option<String> {
        let quality = self.config.jpeg_quality;
        run_blocking(move || frame::encode_data_url(&original, quality))
            .await
            .ok()
    }
}

fn decode(payload: FramePayload, max_width: u32) -> Result<Decoded, FrameError> {
    let original = match payload {
        FramePayload::DataUrl(url) => frame::decode_data_url(&url)?,
        FramePayload::Bytes(bytes) => frame::decode_bytes(&bytes)?,
    };

    if original.width() <= max_width || max_width == 0 {
        let original = Arc::new(original);
        return Ok(Decoded {
            working: Arc::clone(&original),
            original,
            scale: 1.0,
        });
    }

    let (working, scale) = frame::downscale(original.clone(), max_width);
    Ok(Decoded {
        original: Arc::new(original),
        working: Arc::new(working),
        scale,
    })
}

/// Run `f` on the blocking pool. A panic becomes a [`FrameError::Processing`].
async fn run_blocking<T, F>(f: F) -> Result<T, FrameError>
where
    F: FnOnce() -> Result<T, FrameError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join) if join.is_panic() => Err(FrameError::Processing("stage panicked".to_string())),
        Err(join) => Err(FrameError::Processing(format!("stage cancelled: {join}"))),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
