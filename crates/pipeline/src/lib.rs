//! Pose estimation and per-frame processing.
//!
//! - [`PoseEstimator`]: primary and optional secondary [`PoseBackend`]s plus
//!   the [`PoseCapabilities`] resolved when it is built.
//! - [`backends`]: the HTTP inference backend and, behind the `onnx`
//!   feature, a local MoveNet backend.
//! - [`FrameProcessingPipeline`]: decode, detect, fuse, measure, render and
//!   encode one frame into a [`FrameResult`].

pub mod backends;
pub mod estimator;
pub mod pipeline;
pub mod result;

pub use estimator::{BackendInitError, PoseBackend, PoseCapabilities, PoseEstimator};
pub use pipeline::{FramePayload, FrameProcessingPipeline, PipelineConfig};
pub use result::{EnhancementStatus, FrameResult, PipelineStage};
