//! Body pose model
//!
//! A `Pose` is always exactly 33 keypoints in the BlazePose anatomical order.
//! Agents address keypoints through `PoseLandmark` instead of raw indices.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of keypoints in a full-body pose.
pub const POSE_KEYPOINT_COUNT: usize = 33;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoseError {
    #[error("pose requires 33 keypoints, got {0}")]
    WrongKeypointCount(usize),
}

/// Single keypoint in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the hip midpoint
    #[serde(default)]
    pub z: f32,
    #[serde(default = "one")]
    pub confidence: f32,
    /// Presence probability (0-1)
    #[serde(default = "one")]
    pub visibility: f32,
}

fn one() -> f32 {
    1.0
}

impl Keypoint {
    /// Fully visible keypoint at (x, y).
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            confidence: 1.0,
            visibility: 1.0,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = visibility;
        self
    }

    #[inline]
    pub fn xy(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

/// Anatomical keypoint index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
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

impl PoseLandmark {
    pub const ALL: [PoseLandmark; POSE_KEYPOINT_COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Limb groups analysed for repetitive motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limb {
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl Limb {
    pub const ALL: [Limb; 4] = [Self::LeftArm, Self::RightArm, Self::LeftLeg, Self::RightLeg];

    /// Proximal-to-distal keypoint path (shoulder-elbow-wrist or hip-knee-ankle).
    pub fn landmarks(self) -> [PoseLandmark; 3] {
        use PoseLandmark::*;
        match self {
            Self::LeftArm => [LeftShoulder, LeftElbow, LeftWrist],
            Self::RightArm => [RightShoulder, RightElbow, RightWrist],
            Self::LeftLeg => [LeftHip, LeftKnee, LeftAnkle],
            Self::RightLeg => [RightHip, RightKnee, RightAnkle],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeftArm => "left_arm",
            Self::RightArm => "right_arm",
            Self::LeftLeg => "left_leg",
            Self::RightLeg => "right_leg",
        }
    }
}

/// 33-keypoint body pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keypoint>", into = "Vec<Keypoint>")]
pub struct Pose {
    keypoints: Vec<Keypoint>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Result<Self, PoseError> {
        if keypoints.len() != POSE_KEYPOINT_COUNT {
            return Err(PoseError::WrongKeypointCount(keypoints.len()));
        }
        Ok(Self { keypoints })
    }

    /// Build a pose by evaluating `f` for every landmark.
    pub fn from_fn<F: FnMut(PoseLandmark) -> Keypoint>(mut f: F) -> Self {
        Self {
            keypoints: PoseLandmark::ALL.iter().map(|&lm| f(lm)).collect(),
        }
    }

    #[inline]
    pub fn keypoint(&self, landmark: PoseLandmark) -> &Keypoint {
        &self.keypoints[landmark.index()]
    }

    pub fn keypoint_mut(&mut self, landmark: PoseLandmark) -> &mut Keypoint {
        &mut self.keypoints[landmark.index()]
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Midpoint of two keypoints in (x, y).
    pub fn midpoint(&self, a: PoseLandmark, b: PoseLandmark) -> [f32; 2] {
        let (ka, kb) = (self.keypoint(a), self.keypoint(b));
        [(ka.x + kb.x) / 2.0, (ka.y + kb.y) / 2.0]
    }

    pub fn shoulder_midpoint(&self) -> [f32; 2] {
        self.midpoint(PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder)
    }

    pub fn hip_midpoint(&self) -> [f32; 2] {
        self.midpoint(PoseLandmark::LeftHip, PoseLandmark::RightHip)
    }

    /// Flat `[x0, y0, z0, x1, y1, z1, ...]` vector.
    pub fn to_vector(&self) -> Vec<f32> {
        self.keypoints
            .iter()
            .flat_map(|kp| [kp.x, kp.y, kp.z])
            .collect()
    }
}

impl TryFrom<Vec<Keypoint>> for Pose {
    type Error = PoseError;

    fn try_from(keypoints: Vec<Keypoint>) -> Result<Self, Self::Error> {
        Self::new(keypoints)
    }
}

impl From<Pose> for Vec<Keypoint> {
    fn from(pose: Pose) -> Self {
        pose.keypoints
    }
}
