//! Concrete [`PoseBackend`](crate::PoseBackend) implementations.

pub mod remote;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use remote::RemotePoseBackend;

#[cfg(feature = "onnx")]
pub use onnx::OnnxPoseBackend;
