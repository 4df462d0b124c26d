use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::json;

use atelier_core::error::FrameError;
use atelier_core::frame;
use atelier_core::measurement::{MeasurementDeriver, MeasurementName, MeasurementPolicy};
use atelier_core::pose::{FrameShape, Keypoint, Landmark, PoseResult, PoseScheme, LANDMARK_COUNT};
use atelier_core::render::GarmentRenderer;
use atelier_pipeline::{
    EnhancementStatus, FramePayload, FrameProcessingPipeline, PipelineConfig, PipelineStage,
    PoseBackend, PoseEstimator,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Returns a frontal pose at fixed normalized positions.
struct StandingPerson;

#[async_trait]
impl PoseBackend for StandingPerson {
    fn name(&self) -> &str {
        "standing"
    }

    async fn detect(&self, frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        let mut points = vec![Keypoint::default(); LANDMARK_COUNT];
        let mut set = |l: Landmark, x: f32, y: f32| points[l.index()] = Keypoint::new(x, y, 0.9);
        set(Landmark::Nose, 0.5, 0.1);
        set(Landmark::LeftShoulder, 0.4, 0.25);
        set(Landmark::RightShoulder, 0.6, 0.25);
        set(Landmark::LeftHip, 0.42, 0.55);
        set(Landmark::RightHip, 0.58, 0.55);
        set(Landmark::LeftAnkle, 0.45, 0.9);
        set(Landmark::RightAnkle, 0.55, 0.9);
        PoseResult::from_normalized(
            PoseScheme::BlazePose33,
            &points,
            FrameShape::new(frame.width(), frame.height()),
        )
    }
}

struct Failing(FrameError);

#[async_trait]
impl PoseBackend for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn detect(&self, _frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        Err(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pipeline(primary: Arc<dyn PoseBackend>, secondary: Option<Arc<dyn PoseBackend>>) -> FrameProcessingPipeline {
    FrameProcessingPipeline::new(
        Arc::new(PoseEstimator::new(primary, secondary)),
        MeasurementDeriver::new(MeasurementPolicy::deterministic()),
        GarmentRenderer::default(),
        PipelineConfig::default(),
    )
}

fn frame_url(width: u32, height: u32) -> FramePayload {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    FramePayload::DataUrl(frame::encode_data_url(&image, 85).unwrap())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_frame_has_render_and_measurements() {
    let p = pipeline(Arc::new(StandingPerson), None);

    let result = p.process(frame_url(320, 240), &json!({"type": "wedding_dress"}), None).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.frame.as_deref().unwrap().starts_with("data:image/jpeg;base64,"));
    assert!(result.measurements.is_some());
    assert!(result.pose_confidence > 0.0);
    assert_eq!(result.dress_config["type"], "wedding_dress");
    assert_eq!(result.enhancement, EnhancementStatus::NotRequested);
    assert_eq!(result.failed_stage, None);
}

#[tokio::test]
async fn wide_frames_are_downscaled_and_compensated() {
    let p = pipeline(Arc::new(StandingPerson), None);

    let result = p.process(frame_url(1280, 960), &json!({}), None).await;

    assert!(result.success);
    let measurements = result.measurements.unwrap();
    assert_eq!(measurements.scale_factor, 0.5);
    // 0.2 of the original width, whatever resolution detection ran at.
    let shoulders = measurements.get(MeasurementName::ShoulderWidth).unwrap();
    assert!((shoulders - 256.0).abs() < 1.0, "shoulder width {shoulders}");

    let rendered = frame::decode_data_url(result.frame.as_deref().unwrap()).unwrap();
    assert_eq!(rendered.dimensions(), (1280, 960));
}

#[tokio::test]
async fn undecodable_frame_fails_at_decode() {
    let p = pipeline(Arc::new(StandingPerson), None);

    let result = p
        .process(FramePayload::DataUrl("data:image/jpeg;base64,AAAA".into()), &json!({}), None)
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Decode));
    assert!(result.frame.is_none());
    assert!(result.measurements.is_none());
}

#[tokio::test]
async fn no_pose_returns_original_frame() {
    let p = pipeline(Arc::new(Failing(FrameError::NoPoseDetected)), None);

    let result = p.process(frame_url(64, 48), &json!({}), None).await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Detect));
    assert_eq!(result.error.as_deref(), Some("No pose detected"));
    assert!(result.frame.is_some());
    assert!(result.measurements.is_none());
}

#[tokio::test]
async fn invalid_dress_config_fails_at_configure() {
    let p = pipeline(Arc::new(StandingPerson), None);
    let raw = json!({"bodice_color": [999, 0, 0]});

    let result = p.process(frame_url(64, 48), &raw, None).await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Configure));
    assert_eq!(result.dress_config, raw);
}

#[tokio::test]
async fn enhancement_without_secondary_is_unavailable() {
    let p = pipeline(Arc::new(StandingPerson), None);

    let result = p.process(frame_url(64, 48), &json!({}), Some(true)).await;

    assert!(result.success);
    assert_eq!(result.enhancement, EnhancementStatus::Unavailable);
}

#[tokio::test]
async fn secondary_failure_degrades_but_succeeds() {
    let p = pipeline(
        Arc::new(StandingPerson),
        Some(Arc::new(Failing(FrameError::Processing("model crashed".into())))),
    );

    let result = p.process(frame_url(64, 48), &json!({}), Some(true)).await;

    assert!(result.success);
    assert_eq!(result.enhancement, EnhancementStatus::Failed);
}

#[tokio::test]
async fn secondary_success_is_fused() {
    let p = pipeline(Arc::new(StandingPerson), Some(Arc::new(StandingPerson)));

    let result = p.process(frame_url(64, 48), &json!({}), Some(true)).await;

    assert!(result.success);
    assert_eq!(result.enhancement, EnhancementStatus::Applied);
}

#[tokio::test]
async fn primary_failure_skips_enhancement() {
    let p = pipeline(
        Arc::new(Failing(FrameError::NoPoseDetected)),
        Some(Arc::new(StandingPerson)),
    );

    let result = p.process(frame_url(64, 48), &json!({}), Some(true)).await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Detect));
    assert_eq!(result.enhancement, EnhancementStatus::Skipped);
}

#[tokio::test]
async fn undecodable_frame_skips_requested_enhancement() {
    let p = pipeline(Arc::new(StandingPerson), Some(Arc::new(StandingPerson)));

    let result = p
        .process(FramePayload::DataUrl("data:image/jpeg;base64,AAAA".into()), &json!({}), Some(true))
        .await;

    assert_eq!(result.failed_stage, Some(PipelineStage::Decode));
    assert_eq!(result.enhancement, EnhancementStatus::Skipped);
}

#[tokio::test]
async fn processing_time_keeps_sub_millisecond_precision() {
    let p = pipeline(Arc::new(StandingPerson), None);

    let result = p.process(frame_url(64, 48), &json!({}), None).await;

    assert!(result.processing_time_ms > 0.0);
    assert!(result.processing_time_ms.is_finite());
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["processing_time_ms"].is_f64());
}

#[tokio::test]
async fn measure_skips_rendering() {
    let p = pipeline(Arc::new(StandingPerson), None);
    let image = RgbImage::from_pixel(200, 400, Rgb([1, 2, 3]));
    let bytes = frame::encode_jpeg(&image, 80).unwrap();

    let (measurements, confidence) = p.measure(FramePayload::Bytes(bytes)).await.unwrap();

    assert!(!measurements.is_fallback());
    assert!(confidence > 0.0);
}

#[tokio::test]
async fn measure_propagates_no_pose() {
    let p = pipeline(Arc::new(Failing(FrameError::NoPoseDetected)), None);
    let result = p.measure(frame_url(32, 32)).await;
    assert_matches!(result, Err(FrameError::NoPoseDetected));
}
