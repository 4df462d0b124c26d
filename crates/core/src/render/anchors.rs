//! Body anchor points the garment geometry hangs off.

use serde::Serialize;

use crate::pose::{Keypoint, Landmark, PoseResult};

/// A 2-D point in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn from_keypoint(kp: &Keypoint) -> Self {
        Self::new(kp.x, kp.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Usable landmarks for one pose. Shoulders and hips are required; the rest
/// are present only when detected confidently.
#[derive(Debug, Clone)]
pub struct Anchors {
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub left_hip: Point,
    pub right_hip: Point,
    pub left_elbow: Option<Point>,
    pub right_elbow: Option<Point>,
    pub left_knee: Option<Point>,
    pub right_knee: Option<Point>,
    pub left_ankle: Option<Point>,
    pub right_ankle: Option<Point>,
    pub nose: Option<Point>,
}

impl Anchors {
    /// `None` when either shoulder or either hip is below `min_confidence`.
    pub fn from_pose(pose: &PoseResult, min_confidence: f32) -> Option<Self> {
        let point = |l: Landmark| pose.usable(l, min_confidence).map(Point::from_keypoint);
        Some(Self {
            left_shoulder: point(Landmark::LeftShoulder)?,
            right_shoulder: point(Landmark::RightShoulder)?,
            left_hip: point(Landmark::LeftHip)?,
            right_hip: point(Landmark::RightHip)?,
            left_elbow: point(Landmark::LeftElbow),
            right_elbow: point(Landmark::RightElbow),
            left_knee: point(Landmark::LeftKnee),
            right_knee: point(Landmark::RightKnee),
            left_ankle: point(Landmark::LeftAnkle),
            right_ankle: point(Landmark::RightAnkle),
            nose: point(Landmark::Nose),
        })
    }

    pub fn shoulder(&self, side: Side) -> Point {
        match side {
            Side::Left => self.left_shoulder,
            Side::Right => self.right_shoulder,
        }
    }

    pub fn hip(&self, side: Side) -> Point {
        match side {
            Side::Left => self.left_hip,
            Side::Right => self.right_hip,
        }
    }

    pub fn elbow(&self, side: Side) -> Option<Point> {
        match side {
            Side::Left => self.left_elbow,
            Side::Right => self.right_elbow,
        }
    }

    /// Never below 1 px.
    pub fn shoulder_width(&self) -> f32 {
        distance(self.left_shoulder, self.right_shoulder).max(1.0)
    }

    /// Vertical shoulder-to-hip distance, never below 1 px.
    pub fn torso_length(&self) -> f32 {
        (self.hip_y() - self.shoulder_y()).abs().max(1.0)
    }

    pub fn center_x(&self) -> f32 {
        (self.left_shoulder.x + self.right_shoulder.x + self.left_hip.x + self.right_hip.x) / 4.0
    }

    pub fn shoulder_y(&self) -> f32 {
        (self.left_shoulder.y + self.right_shoulder.y) / 2.0
    }

    pub fn hip_y(&self) -> f32 {
        (self.left_hip.y + self.right_hip.y) / 2.0
    }

    pub fn shoulder_half_width(&self) -> f32 {
        (self.left_shoulder.x - self.right_shoulder.x).abs() / 2.0
    }

    pub fn hip_half_width(&self) -> f32 {
        (self.left_hip.x - self.right_hip.x).abs() / 2.0
    }

    /// Horizontal direction pointing away from the body centre on `side`.
    ///
    /// Derived from where the shoulder actually is, so mirrored frames work.
    pub fn outward(&self, side: Side) -> f32 {
        if self.shoulder(side).x < self.center_x() {
            -1.0
        } else {
            1.0
        }
    }

    /// Mean y of the usable knees.
    pub fn knee_y(&self) -> Option<f32> {
        mean_y([self.left_knee, self.right_knee])
    }

    /// Mean y of the usable ankles.
    pub fn ankle_y(&self) -> Option<f32> {
        mean_y([self.left_ankle, self.right_ankle])
    }
}

pub fn distance(a: Point, b: Point) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

fn mean_y(points: [Option<Point>; 2]) -> Option<f32> {
    let ys: Vec<f32> = points.iter().flatten().map(|p| p.y).collect();
    (!ys.is_empty()).then(|| ys.iter().sum::<f32>() / ys.len() as f32)
}
