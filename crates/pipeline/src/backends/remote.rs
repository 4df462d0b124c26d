//! HTTP pose inference backend.
//!
//! Posts the JPEG-encoded frame to an inference service and expects
//!
//! ```json
//! { "scheme": "blazepose_33", "keypoints": [{ "x": 0.4, "y": 0.3, "confidence": 0.9 }] }
//! ```
//!
//! with coordinates normalized to `[0, 1]` in the scheme's native order. An
//! empty `keypoints` list means no person was found.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;

use atelier_core::error::FrameError;
use atelier_core::frame;
use atelier_core::pose::{FrameShape, Keypoint, PoseResult, PoseScheme};

use crate::estimator::{BackendInitError, PoseBackend};

/// JPEG quality of frames sent for inference.
const UPLOAD_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    scheme: PoseScheme,
    #[serde(default)]
    keypoints: Vec<Keypoint>,
}

pub struct RemotePoseBackend {
    client: reqwest::Client,
    url: String,
    name: String,
}

impl RemotePoseBackend {
    /// * `name` - label for logs, e.g. `"primary"`.
    /// * `url` - full inference endpoint URL.
    pub fn new(name: &str, url: &str, timeout: Duration) -> Result<Self, BackendInitError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            name: format!("remote:{name}"),
        })
    }
}

#[async_trait]
impl PoseBackend for RemotePoseBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, image: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        let shape = FrameShape::new(image.width(), image.height());
        let jpeg = frame::encode_jpeg(&image, UPLOAD_JPEG_QUALITY)?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()
            .await
            .map_err(|e| FrameError::Processing(format!("pose service request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(backend = %self.name, status = status.as_u16(), %body, "Pose service error");
            return Err(FrameError::Processing(format!(
                "pose service returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| FrameError::Processing(format!("invalid pose service response: {e}")))?;

        PoseResult::from_normalized(body.scheme, &body.keypoints, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movenet_response() {
        let body: InferenceResponse = serde_json::from_str(
            r#"{"scheme": "movenet_17", "keypoints": [{"x": 0.1, "y": 0.2, "confidence": 0.3}]}"#,
        )
        .unwrap();
        assert_eq!(body.scheme, PoseScheme::MoveNet17);
        assert_eq!(body.keypoints.len(), 1);
    }

    #[test]
    fn missing_keypoints_means_empty() {
        let body: InferenceResponse = serde_json::from_str(r#"{"scheme": "blazepose_33"}"#).unwrap();
        assert!(body.keypoints.is_empty());
    }
}
