//! Synthetic perception fixtures for unit tests.

use vigil_core::{BoundingBox, Detection, FrameSnapshot, Keypoint, Pose, PoseLandmark};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

/// Pose with every keypoint at `hip` except the shoulders, which sit
/// `length` pixels away along a torso tilted `angle_deg` from vertical.
pub fn torso_pose(hip: [f32; 2], angle_deg: f32, length: f32) -> Pose {
    let rad = angle_deg.to_radians();
    let shoulder = [hip[0] + length * rad.sin(), hip[1] - length * rad.cos()];
    Pose::from_fn(|lm| match lm {
        PoseLandmark::LeftShoulder | PoseLandmark::RightShoulder => {
            Keypoint::new(shoulder[0], shoulder[1])
        }
        _ => Keypoint::new(hip[0], hip[1]),
    })
}

/// Pose whose hip midpoint sits at normalized height `hip_height`.
pub fn pose_at_height(hip_height: f32, angle_deg: f32) -> Pose {
    torso_pose([320.0, (1.0 - hip_height) * HEIGHT as f32], angle_deg, 100.0)
}

pub fn person_box() -> BoundingBox {
    BoundingBox::new(200.0, 100.0, 440.0, 460.0)
}

pub fn empty_frame(frame_id: u64, timestamp: f64) -> FrameSnapshot {
    FrameSnapshot::new(frame_id, timestamp, WIDTH, HEIGHT, 30.0)
}

pub fn frame_with_pose(frame_id: u64, timestamp: f64, pose: Pose) -> FrameSnapshot {
    empty_frame(frame_id, timestamp).with_detection(Detection::new(1, person_box()).with_pose(pose))
}
