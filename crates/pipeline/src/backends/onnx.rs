//! Local MoveNet single-pose inference via ONNX Runtime.
//!
//! Lightning (192 px input) serves as the primary model, Thunder (256 px) as
//! the heavier secondary. Both output `[1, 1, 17, 3]` as `(y, x, confidence)`
//! normalized to the input square.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use atelier_core::error::FrameError;
use atelier_core::pose::{FrameShape, Keypoint, PoseResult, PoseScheme};

use crate::estimator::{BackendInitError, PoseBackend};

pub const LIGHTNING_INPUT_SIZE: u32 = 192;
pub const THUNDER_INPUT_SIZE: u32 = 256;

const MOVENET_KEYPOINTS: usize = 17;

pub struct OnnxPoseBackend {
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
    input_size: u32,
    name: String,
}

impl OnnxPoseBackend {
    pub fn lightning<P: AsRef<Path>>(model_path: P) -> Result<Self, BackendInitError> {
        Self::load(model_path.as_ref(), LIGHTNING_INPUT_SIZE, "onnx:movenet-lightning")
    }

    pub fn thunder<P: AsRef<Path>>(model_path: P) -> Result<Self, BackendInitError> {
        Self::load(model_path.as_ref(), THUNDER_INPUT_SIZE, "onnx:movenet-thunder")
    }

    fn load(path: &Path, input_size: u32, name: &str) -> Result<Self, BackendInitError> {
        let model_err = |e: ort::Error| BackendInitError::Model(format!("{}: {e}", path.display()));

        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .commit_from_file(path)
            .map_err(model_err)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| BackendInitError::Model("model has no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| BackendInitError::Model("model has no outputs".to_string()))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            input_size,
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl PoseBackend for OnnxPoseBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, image: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        let session = Arc::clone(&self.session);
        let input_name = self.input_name.clone();
        let output_name = self.output_name.clone();
        let size = self.input_size;

        tokio::task::spawn_blocking(move || {
            let shape = FrameShape::new(image.width(), image.height());
            let input = to_tensor(&image, size);
            let points = infer(&session, &input_name, &output_name, input)?;
            PoseResult::from_normalized(PoseScheme::MoveNet17, &points, shape)
        })
        .await
        .map_err(|e| FrameError::Processing(format!("inference task failed: {e}")))?
    }
}

/// `[1, size, size, 3]` RGB tensor with 0–255 values.
fn to_tensor(image: &RgbImage, size: u32) -> Array4<f32> {
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = f32::from(pixel[c]);
        }
    }
    tensor
}

fn infer(
    session: &Mutex<Session>,
    input_name: &str,
    output_name: &str,
    input: Array4<f32>,
) -> Result<Vec<Keypoint>, FrameError> {
    let ort_err = |e: ort::Error| FrameError::Processing(format!("inference failed: {e}"));

    let input_tensor = Tensor::from_array(input).map_err(ort_err)?;
    let mut session = session
        .lock()
        .map_err(|_| FrameError::Processing("model session lock poisoned".to_string()))?;
    let outputs = session
        .run(ort::inputs![input_name => input_tensor])
        .map_err(ort_err)?;

    let output: ndarray::ArrayViewD<f32> = outputs[output_name]
        .try_extract_array()
        .map_err(ort_err)?;
    if output.shape() != [1, 1, MOVENET_KEYPOINTS, 3] {
        return Err(FrameError::Processing(format!(
            "unexpected MoveNet output shape {:?}",
            output.shape()
        )));
    }

    Ok((0..MOVENET_KEYPOINTS)
        .map(|i| {
            Keypoint::new(
                output[[0, 0, i, 1]],
                output[[0, 0, i, 0]],
                output[[0, 0, i, 2]],
            )
        })
        .collect())
}
