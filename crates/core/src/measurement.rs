//! Body measurements derived from pose keypoints.
//!
//! Distances (shoulder width, torso length, hip width, arm length) are plain
//! Euclidean pixel distances compensated for any downscaling the pipeline did
//! before detection. Bust, waist, hips and height are empirical
//! approximations built from those distances with the linear factors in
//! [`MeasurementPolicy`]; they are placeholders, not a calibrated
//! anthropometric model.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::pose::{FrameShape, Keypoint, Landmark, PoseResult};

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Default minimum confidence for a keypoint to be used.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Default fraction of the frame a keypoint may lie outside of and still
/// count as in frame.
pub const DEFAULT_FRAME_MARGIN: f32 = 0.05;

/// Measurements compared by accuracy analysis.
pub const ACCURACY_KEYS: [MeasurementName; 4] = [
    MeasurementName::Bust,
    MeasurementName::Waist,
    MeasurementName::Hips,
    MeasurementName::Height,
];

/* --------------------------------------------------------------------------
Types
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementName {
    ShoulderWidth,
    TorsoLength,
    HipWidth,
    ArmLength,
    Bust,
    Waist,
    Hips,
    Height,
}

/// Whether a set came from detected keypoints or from policy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementSource {
    Detected,
    Fallback,
}

/// Measurements for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    pub values: BTreeMap<MeasurementName, f64>,
    /// Scale the detection frame had relative to the original frame.
    pub scale_factor: f64,
    pub source: MeasurementSource,
}

impl MeasurementSet {
    pub fn get(&self, name: MeasurementName) -> Option<f64> {
        self.values.get(&name).copied()
    }

    pub fn is_fallback(&self) -> bool {
        self.source == MeasurementSource::Fallback
    }
}

/// Half-widths of the uniform noise added to each approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseBounds {
    pub bust: f64,
    pub waist: f64,
    pub hips: f64,
    pub height: f64,
}

impl Default for NoiseBounds {
    fn default() -> Self {
        Self {
            bust: 0.5,
            waist: 0.3,
            hips: 0.5,
            height: 1.0,
        }
    }
}

/// Values reported when the torso cannot be measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackMeasurements {
    pub bust: f64,
    pub waist: f64,
    pub hips: f64,
    pub height: f64,
}

impl Default for FallbackMeasurements {
    fn default() -> Self {
        Self {
            bust: 34.0,
            waist: 26.0,
            hips: 36.0,
            height: 66.0,
        }
    }
}

/// Tunable factors and thresholds for [`MeasurementDeriver`].
///
/// Every field has a default, so a JSON override only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementPolicy {
    pub min_confidence: f32,
    pub frame_margin: f32,
    pub bust_factor: f64,
    pub hips_factor: f64,
    pub waist_factor: f64,
    /// Share of the shoulder/hip mean the waist is taken to be.
    pub waist_ratio: f64,
    pub height_factor: f64,
    pub noise_enabled: bool,
    pub noise: NoiseBounds,
    pub fallback: FallbackMeasurements,
}

impl Default for MeasurementPolicy {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            frame_margin: DEFAULT_FRAME_MARGIN,
            bust_factor: 0.04,
            hips_factor: 0.04,
            waist_factor: 0.04,
            waist_ratio: 0.85,
            height_factor: 0.025,
            noise_enabled: true,
            noise: NoiseBounds::default(),
            fallback: FallbackMeasurements::default(),
        }
    }
}

impl MeasurementPolicy {
    /// Parse a (possibly partial) JSON policy override.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let policy: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid measurement policy: {e}")))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check that every factor and bound is usable by the deriver.
    ///
    /// Noise bounds must be finite and non-negative; factors, fallback values
    /// and the confidence threshold must be finite, with factors positive.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |field: &str, value: f64| {
            CoreError::Validation(format!("Invalid measurement policy: {field} = {value}"))
        };

        let noise = [
            ("noise.bust", self.noise.bust),
            ("noise.waist", self.noise.waist),
            ("noise.hips", self.noise.hips),
            ("noise.height", self.noise.height),
        ];
        if let Some((field, value)) = noise.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(invalid(field, *value));
        }

        let factors = [
            ("bust_factor", self.bust_factor),
            ("hips_factor", self.hips_factor),
            ("waist_factor", self.waist_factor),
            ("waist_ratio", self.waist_ratio),
            ("height_factor", self.height_factor),
        ];
        if let Some((field, value)) = factors.iter().find(|(_, v)| !v.is_finite() || *v <= 0.0) {
            return Err(invalid(field, *value));
        }

        let fallback = [
            ("fallback.bust", self.fallback.bust),
            ("fallback.waist", self.fallback.waist),
            ("fallback.hips", self.fallback.hips),
            ("fallback.height", self.fallback.height),
        ];
        if let Some((field, value)) = fallback.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(field, *value));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid("min_confidence", f64::from(self.min_confidence)));
        }
        if !self.frame_margin.is_finite() || self.frame_margin < 0.0 {
            return Err(invalid("frame_margin", f64::from(self.frame_margin)));
        }
        Ok(())
    }

    /// A policy with noise switched off.
    pub fn deterministic() -> Self {
        Self {
            noise_enabled: false,
            ..Self::default()
        }
    }
}

/* --------------------------------------------------------------------------
Deriver
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Default)]
pub struct MeasurementDeriver {
    policy: MeasurementPolicy,
}

impl MeasurementDeriver {
    pub fn new(policy: MeasurementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MeasurementPolicy {
        &self.policy
    }

    /// Derive measurements using the thread-local RNG for noise.
    pub fn derive(&self, pose: &PoseResult, frame: FrameShape, scale_factor: f64) -> MeasurementSet {
        self.derive_with_rng(pose, frame, scale_factor, &mut rand::rng())
    }

    /// Derive measurements from `pose`, detected on a frame of shape `frame`
    /// that was scaled by `scale_factor` from the original.
    ///
    /// Falls back to the policy defaults when either shoulder or either hip
    /// is unusable.
    pub fn derive_with_rng<R: Rng + ?Sized>(
        &self,
        pose: &PoseResult,
        frame: FrameShape,
        scale_factor: f64,
        rng: &mut R,
    ) -> MeasurementSet {
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor
        } else {
            1.0
        };
        let usable = |landmark: Landmark| -> Option<&Keypoint> {
            let kp = pose.get(landmark);
            (kp.confidence >= self.policy.min_confidence
                && frame.contains(kp.x, kp.y, self.policy.frame_margin))
            .then_some(kp)
        };

        let torso = (
            usable(Landmark::LeftShoulder),
            usable(Landmark::RightShoulder),
            usable(Landmark::LeftHip),
            usable(Landmark::RightHip),
        );
        let (Some(ls), Some(rs), Some(lh), Some(rh)) = torso else {
            return self.fallback(scale);
        };

        let shoulder_width = ls.distance(rs) / scale;
        let hip_width = lh.distance(rh) / scale;
        let torso_length = ls.distance(lh) / scale;

        let mut values = BTreeMap::new();
        values.insert(MeasurementName::ShoulderWidth, shoulder_width);
        values.insert(MeasurementName::TorsoLength, torso_length);
        values.insert(MeasurementName::HipWidth, hip_width);

        let arm = |shoulder: Landmark, elbow: Landmark, wrist: Landmark| {
            let (s, e, w) = (usable(shoulder)?, usable(elbow)?, usable(wrist)?);
            Some((s.distance(e) + e.distance(w)) / scale)
        };
        let arm_length = arm(Landmark::LeftShoulder, Landmark::LeftElbow, Landmark::LeftWrist)
            .or_else(|| arm(Landmark::RightShoulder, Landmark::RightElbow, Landmark::RightWrist));
        if let Some(arm_length) = arm_length {
            values.insert(MeasurementName::ArmLength, arm_length);
        }

        let p = &self.policy;
        let bust = shoulder_width * p.bust_factor;
        let hips = hip_width * p.hips_factor;
        let waist = (shoulder_width + hip_width) / 2.0 * p.waist_ratio * p.waist_factor;

        values.insert(MeasurementName::Bust, self.noisy(bust, p.noise.bust, rng));
        values.insert(MeasurementName::Waist, self.noisy(waist, p.noise.waist, rng));
        values.insert(MeasurementName::Hips, self.noisy(hips, p.noise.hips, rng));

        if let Some(nose) = usable(Landmark::Nose) {
            let ankles: Vec<&Keypoint> = [Landmark::LeftAnkle, Landmark::RightAnkle]
                .into_iter()
                .filter_map(usable)
                .collect();
            if !ankles.is_empty() {
                let n = ankles.len() as f32;
                let mean_ankle = Keypoint::new(
                    ankles.iter().map(|k| k.x).sum::<f32>() / n,
                    ankles.iter().map(|k| k.y).sum::<f32>() / n,
                    1.0,
                );
                let height = nose.distance(&mean_ankle) / scale * p.height_factor;
                values.insert(MeasurementName::Height, self.noisy(height, p.noise.height, rng));
            }
        }

        MeasurementSet {
            values,
            scale_factor: scale,
            source: MeasurementSource::Detected,
        }
    }

    fn fallback(&self, scale: f64) -> MeasurementSet {
        let d = &self.policy.fallback;
        let values = BTreeMap::from([
            (MeasurementName::Bust, d.bust),
            (MeasurementName::Waist, d.waist),
            (MeasurementName::Hips, d.hips),
            (MeasurementName::Height, d.height),
        ]);
        MeasurementSet {
            values,
            scale_factor: scale,
            source: MeasurementSource::Fallback,
        }
    }

    fn noisy<R: Rng + ?Sized>(&self, value: f64, bound: f64, rng: &mut R) -> f64 {
        let noise = if self.policy.noise_enabled && bound.is_finite() && bound > 0.0 {
            rng.random_range(-bound..=bound)
        } else {
            0.0
        };
        round_to(value + noise, 1)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/* --------------------------------------------------------------------------
Accuracy analysis
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyEntry {
    pub ai_value: f64,
    pub manual_value: f64,
    pub difference: f64,
    pub accuracy_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub measurements: BTreeMap<MeasurementName, AccuracyEntry>,
    pub overall_accuracy: f64,
}

/// Compare AI-derived values against manual ones for bust, waist, hips and
/// height. Keys missing on either side, or with a non-positive manual value,
/// are skipped.
pub fn analyze_accuracy(
    ai: &BTreeMap<MeasurementName, f64>,
    manual: &BTreeMap<MeasurementName, f64>,
) -> AccuracyReport {
    let mut measurements = BTreeMap::new();

    for key in ACCURACY_KEYS {
        let (Some(&ai_value), Some(&manual_value)) = (ai.get(&key), manual.get(&key)) else {
            continue;
        };
        if manual_value <= 0.0 {
            continue;
        }
        let difference = (ai_value - manual_value).abs();
        let accuracy = (100.0 - difference / manual_value * 100.0).max(0.0);
        measurements.insert(
            key,
            AccuracyEntry {
                ai_value,
                manual_value,
                difference: round_to(difference, 2),
                accuracy_percentage: round_to(accuracy, 1),
            },
        );
    }

    let overall_accuracy = if measurements.is_empty() {
        0.0
    } else {
        let sum: f64 = measurements.values().map(|e| e.accuracy_percentage).sum();
        round_to(sum / measurements.len() as f64, 1)
    };

    AccuracyReport {
        measurements,
        overall_accuracy,
    }
}
