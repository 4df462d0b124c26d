//! Pose estimation front-end over pluggable backends.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;

use atelier_core::error::FrameError;
use atelier_core::pose::PoseResult;

/// Errors raised while constructing a backend at startup.
#[derive(Debug, thiserror::Error)]
pub enum BackendInitError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model load failed: {0}")]
    Model(String),
}

/// A pose model that turns an RGB frame into a canonical [`PoseResult`].
#[async_trait]
pub trait PoseBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Detect the most prominent person in `frame`.
    async fn detect(&self, frame: Arc<RgbImage>) -> Result<PoseResult, FrameError>;
}

/// What the configured backends can do. Fixed once the estimator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoseCapabilities {
    /// A secondary backend is available for enhanced detection.
    pub enhancement: bool,
}

pub struct PoseEstimator {
    primary: Arc<dyn PoseBackend>,
    secondary: Option<Arc<dyn PoseBackend>>,
    capabilities: PoseCapabilities,
}

impl PoseEstimator {
    pub fn new(primary: Arc<dyn PoseBackend>, secondary: Option<Arc<dyn PoseBackend>>) -> Self {
        let capabilities = PoseCapabilities {
            enhancement: secondary.is_some(),
        };
        tracing::info!(
            primary = primary.name(),
            secondary = secondary.as_ref().map(|s| s.name()),
            "Pose estimator initialised"
        );
        Self {
            primary,
            secondary,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> PoseCapabilities {
        self.capabilities
    }

    /// Run the primary backend.
    pub async fn detect(&self, frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        self.primary.detect(frame).await
    }

    /// Run the secondary backend.
    ///
    /// Fails with [`FrameError::EnhancementUnavailable`] when none is
    /// configured.
    pub async fn detect_enhanced(&self, frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        match &self.secondary {
            Some(backend) => backend.detect(frame).await,
            None => Err(FrameError::EnhancementUnavailable(
                "no secondary pose backend configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct NoPerson;

    #[async_trait]
    impl PoseBackend for NoPerson {
        fn name(&self) -> &str {
            "no-person"
        }

        async fn detect(&self, _frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
            Err(FrameError::NoPoseDetected)
        }
    }

    #[tokio::test]
    async fn enhancement_unavailable_without_secondary() {
        let estimator = PoseEstimator::new(Arc::new(NoPerson), None);
        assert!(!estimator.capabilities().enhancement);

        let frame = Arc::new(RgbImage::new(4, 4));
        assert_matches!(
            estimator.detect_enhanced(frame.clone()).await,
            Err(FrameError::EnhancementUnavailable(_))
        );
        assert_matches!(estimator.detect(frame).await, Err(FrameError::NoPoseDetected));
    }

    #[tokio::test]
    async fn secondary_sets_capability() {
        let estimator = PoseEstimator::new(Arc::new(NoPerson), Some(Arc::new(NoPerson)));
        assert!(estimator.capabilities().enhancement);

        let frame = Arc::new(RgbImage::new(4, 4));
        assert_matches!(
            estimator.detect_enhanced(frame).await,
            Err(FrameError::NoPoseDetected)
        );
    }
}
