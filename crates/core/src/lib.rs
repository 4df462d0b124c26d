//! Atelier domain types and pure algorithms.
//!
//! Nothing in this crate performs I/O or needs an async runtime:
//!
//! - [`pose`]: canonical landmark scheme and [`pose::PoseResult`].
//! - [`measurement`]: keypoints to body measurements, accuracy analysis.
//! - [`fusion`]: confidence-weighted merging of two pose estimates.
//! - [`garment`]: garment configuration, defaults and dress templates.
//! - [`render`]: garment polygon planning and alpha compositing.
//! - [`frame`]: data-URL / JPEG codec and resampling helpers.

pub mod error;
pub mod frame;
pub mod fusion;
pub mod garment;
pub mod measurement;
pub mod pose;
pub mod render;
pub mod roles;
pub mod types;

pub use error::{CoreError, FrameError};
pub use garment::{GarmentConfig, GarmentConfigInput, GarmentType};
pub use measurement::{MeasurementDeriver, MeasurementPolicy, MeasurementSet};
pub use pose::{FrameShape, Keypoint, Landmark, PoseResult, PoseScheme};
pub use render::GarmentRenderer;
