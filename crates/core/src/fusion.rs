//! Confidence-weighted fusion of two pose estimates of the same frame.

use serde::Serialize;

use crate::pose::{Keypoint, Landmark, PoseResult};

/// Landmarks both supported backends report, as `(primary, secondary)`
/// canonical index pairs.
pub const DEFAULT_FUSION_MAP: [(usize, usize); 13] = [
    pair(Landmark::Nose),
    pair(Landmark::LeftShoulder),
    pair(Landmark::RightShoulder),
    pair(Landmark::LeftElbow),
    pair(Landmark::RightElbow),
    pair(Landmark::LeftWrist),
    pair(Landmark::RightWrist),
    pair(Landmark::LeftHip),
    pair(Landmark::RightHip),
    pair(Landmark::LeftKnee),
    pair(Landmark::RightKnee),
    pair(Landmark::LeftAnkle),
    pair(Landmark::RightAnkle),
];

const fn pair(landmark: Landmark) -> (usize, usize) {
    (landmark.index(), landmark.index())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusedKeypoint {
    /// Index in the primary result.
    pub index: usize,
    pub keypoint: Keypoint,
    pub primary_confidence: f32,
    pub secondary_confidence: f32,
}

/// Fuse the landmarks named in `landmark_map`.
///
/// Pairs whose index is out of range in either result are dropped. Each
/// remaining pair is averaged weighted by confidence (plain midpoint when
/// both confidences are zero); the fused confidence is the larger of the two.
pub fn fuse(
    primary: &PoseResult,
    secondary: &PoseResult,
    landmark_map: &[(usize, usize)],
) -> Vec<FusedKeypoint> {
    landmark_map
        .iter()
        .filter_map(|&(pi, si)| {
            let p = primary.keypoints().get(pi)?;
            let s = secondary.keypoints().get(si)?;
            Some(FusedKeypoint {
                index: pi,
                keypoint: fuse_pair(p, s),
                primary_confidence: p.confidence,
                secondary_confidence: s.confidence,
            })
        })
        .collect()
}

fn fuse_pair(a: &Keypoint, b: &Keypoint) -> Keypoint {
    let total = a.confidence + b.confidence;
    let (x, y) = if total > 0.0 {
        (
            (a.x * a.confidence + b.x * b.confidence) / total,
            (a.y * a.confidence + b.y * b.confidence) / total,
        )
    } else {
        ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    };
    Keypoint::new(x, y, a.confidence.max(b.confidence))
}

/// `primary` with its fused landmarks replaced.
pub fn apply(primary: &PoseResult, fused: &[FusedKeypoint]) -> PoseResult {
    primary.with_replaced(fused.iter().map(|f| (f.index, f.keypoint)))
}
