//! Canonical body-landmark scheme and per-frame pose results.
//!
//! Every pose backend emits its result in the 33-point full-body layout
//! defined by [`Landmark`], so measurement, fusion and rendering code can
//! address keypoints positionally. Backends with a smaller native layout
//! (MoveNet, 17 points) fill the slots they know and leave the remaining
//! keypoints at zero confidence.

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/* --------------------------------------------------------------------------
Landmark scheme
-------------------------------------------------------------------------- */

/// Number of landmarks in the canonical scheme.
pub const LANDMARK_COUNT: usize = 33;

/// Confidence below which a keypoint is treated as not detected at all.
pub const PRESENCE_EPSILON: f32 = 1e-3;

/// Confidence above which a keypoint contributes to the bounding box.
const BBOX_MIN_CONFIDENCE: f32 = 0.3;

/// Padding (px) added around the keypoint bounding box.
const BBOX_PADDING: f32 = 20.0;

/// Canonical landmark indices (33-point full-body layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Landmark {
    /// Position of this landmark in a [`PoseResult`]'s keypoint list.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Native keypoint layout of a pose backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseScheme {
    /// 33-point full-body layout (identical to the canonical scheme).
    #[serde(rename = "blazepose_33")]
    BlazePose33,
    /// 17-point COCO layout used by MoveNet.
    #[serde(rename = "movenet_17")]
    MoveNet17,
}

/// Canonical slot for each MoveNet keypoint, in MoveNet order.
const MOVENET_TO_CANONICAL: [Landmark; 17] = [
    Landmark::Nose,
    Landmark::LeftEye,
    Landmark::RightEye,
    Landmark::LeftEar,
    Landmark::RightEar,
    Landmark::LeftShoulder,
    Landmark::RightShoulder,
    Landmark::LeftElbow,
    Landmark::RightElbow,
    Landmark::LeftWrist,
    Landmark::RightWrist,
    Landmark::LeftHip,
    Landmark::RightHip,
    Landmark::LeftKnee,
    Landmark::RightKnee,
    Landmark::LeftAnkle,
    Landmark::RightAnkle,
];

impl PoseScheme {
    /// Number of keypoints the backend produces natively.
    pub fn native_len(self) -> usize {
        match self {
            PoseScheme::BlazePose33 => LANDMARK_COUNT,
            PoseScheme::MoveNet17 => MOVENET_TO_CANONICAL.len(),
        }
    }

    /// Canonical index of the `native`-th keypoint of this scheme.
    pub fn canonical_index(self, native: usize) -> Option<usize> {
        match self {
            PoseScheme::BlazePose33 => (native < LANDMARK_COUNT).then_some(native),
            PoseScheme::MoveNet17 => MOVENET_TO_CANONICAL.get(native).map(|l| l.index()),
        }
    }
}

/* --------------------------------------------------------------------------
Keypoints and geometry
-------------------------------------------------------------------------- */

/// A detected landmark in pixel coordinates of the detection frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Euclidean distance to `other`, in pixels.
    pub fn distance(&self, other: &Keypoint) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Width and height of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
}

impl FrameShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether `(x, y)` lies inside the frame extended by `margin` (a fraction
    /// of each dimension) on every side.
    pub fn contains(&self, x: f32, y: f32, margin: f32) -> bool {
        let mx = self.width as f32 * margin;
        let my = self.height as f32 * margin;
        x >= -mx && y >= -my && x <= self.width as f32 + mx && y <= self.height as f32 + my
    }
}

/// Axis-aligned person bounding box, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/* --------------------------------------------------------------------------
PoseResult
-------------------------------------------------------------------------- */

/// One person's pose in a single frame.
///
/// Always holds [`LANDMARK_COUNT`] keypoints in canonical order. Occluded or
/// unknown landmarks are present with low (or zero) confidence rather than
/// missing; consumers check confidence, not presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseResult {
    keypoints: Vec<Keypoint>,
    confidence: f32,
    bounding_box: BoundingBox,
    frame: FrameShape,
    scheme: PoseScheme,
}

impl PoseResult {
    /// Build a result from backend output with normalized `[0, 1]`
    /// coordinates in the backend's native order.
    pub fn from_normalized(
        scheme: PoseScheme,
        points: &[Keypoint],
        frame: FrameShape,
    ) -> Result<Self, FrameError> {
        if points.is_empty() {
            return Err(FrameError::NoPoseDetected);
        }
        if points.len() != scheme.native_len() {
            return Err(FrameError::Processing(format!(
                "{scheme:?} backend returned {} keypoints, expected {}",
                points.len(),
                scheme.native_len()
            )));
        }

        let mut keypoints = vec![Keypoint::default(); LANDMARK_COUNT];
        for (native, point) in points.iter().enumerate() {
            if let Some(slot) = scheme.canonical_index(native) {
                keypoints[slot] = Keypoint::new(
                    point.x * frame.width as f32,
                    point.y * frame.height as f32,
                    point.confidence,
                );
            }
        }

        Self::from_keypoints(keypoints, scheme, frame)
    }

    /// Build a result from canonical-order pixel keypoints.
    ///
    /// Confidences are clamped to `[0, 1]`; non-finite keypoints are zeroed.
    /// Fails with [`FrameError::NoPoseDetected`] when every confidence is
    /// effectively zero.
    pub fn from_keypoints(
        mut keypoints: Vec<Keypoint>,
        scheme: PoseScheme,
        frame: FrameShape,
    ) -> Result<Self, FrameError> {
        if keypoints.len() != LANDMARK_COUNT {
            return Err(FrameError::Processing(format!(
                "expected {LANDMARK_COUNT} canonical keypoints, got {}",
                keypoints.len()
            )));
        }

        for kp in keypoints.iter_mut() {
            if !(kp.x.is_finite() && kp.y.is_finite() && kp.confidence.is_finite()) {
                *kp = Keypoint::default();
            }
            kp.confidence = kp.confidence.clamp(0.0, 1.0);
        }

        if keypoints.iter().all(|kp| kp.confidence < PRESENCE_EPSILON) {
            return Err(FrameError::NoPoseDetected);
        }

        let confidence = mean_confidence(&keypoints, scheme);
        let bounding_box = bounding_box(&keypoints, frame);

        Ok(Self {
            keypoints,
            confidence,
            bounding_box,
            frame,
            scheme,
        })
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn get(&self, landmark: Landmark) -> &Keypoint {
        &self.keypoints[landmark.index()]
    }

    /// The keypoint for `landmark` if its confidence reaches `min_confidence`.
    pub fn usable(&self, landmark: Landmark, min_confidence: f32) -> Option<&Keypoint> {
        let kp = self.get(landmark);
        (kp.confidence >= min_confidence).then_some(kp)
    }

    /// Mean confidence over the landmarks the producing scheme provides.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Shape of the frame the keypoints were detected on.
    pub fn frame(&self) -> FrameShape {
        self.frame
    }

    pub fn scheme(&self) -> PoseScheme {
        self.scheme
    }

    /// A copy with the given canonical keypoints replaced.
    ///
    /// Out-of-range indices are ignored. Overall confidence and bounding box
    /// are recomputed.
    pub fn with_replaced(&self, replacements: impl IntoIterator<Item = (usize, Keypoint)>) -> Self {
        let mut keypoints = self.keypoints.clone();
        for (index, kp) in replacements {
            if let Some(slot) = keypoints.get_mut(index) {
                *slot = kp;
            }
        }
        let confidence = mean_confidence(&keypoints, self.scheme);
        let bounding_box = bounding_box(&keypoints, self.frame);
        Self {
            keypoints,
            confidence,
            bounding_box,
            frame: self.frame,
            scheme: self.scheme,
        }
    }
}

fn mean_confidence(keypoints: &[Keypoint], scheme: PoseScheme) -> f32 {
    let native = scheme.native_len();
    let sum: f32 = (0..native)
        .filter_map(|i| scheme.canonical_index(i))
        .map(|i| keypoints[i].confidence)
        .sum();
    sum / native as f32
}

fn bounding_box(keypoints: &[Keypoint], frame: FrameShape) -> BoundingBox {
    let visible: Vec<&Keypoint> = keypoints
        .iter()
        .filter(|kp| kp.confidence > BBOX_MIN_CONFIDENCE)
        .collect();

    if visible.is_empty() {
        return BoundingBox {
            x: 0.0,
            y: 0.0,
            width: frame.width as f32,
            height: frame.height as f32,
        };
    }

    let min_x = visible.iter().map(|kp| kp.x).fold(f32::INFINITY, f32::min);
    let max_x = visible.iter().map(|kp| kp.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = visible.iter().map(|kp| kp.y).fold(f32::INFINITY, f32::min);
    let max_y = visible.iter().map(|kp| kp.y).fold(f32::NEG_INFINITY, f32::max);

    BoundingBox {
        x: (min_x - BBOX_PADDING).max(0.0),
        y: (min_y - BBOX_PADDING).max(0.0),
        width: (max_x - min_x + 2.0 * BBOX_PADDING).min(frame.width as f32),
        height: (max_y - min_y + 2.0 * BBOX_PADDING).min(frame.height as f32),
    }
}
