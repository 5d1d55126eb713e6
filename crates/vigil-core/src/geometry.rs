//! Geometric features over a single pose or box snapshot
//!
//! All functions are stateless. Points are `[x, y]` in image coordinates
//! (y grows downwards).

use crate::pose::Pose;
use crate::types::BoundingBox;

/// Euclidean distance between two points.
#[inline]
pub fn distance(p1: [f32; 2], p2: [f32; 2]) -> f32 {
    (p1[0] - p2[0]).hypot(p1[1] - p2[1])
}

/// Intersection over union of two boxes, in `[0, 1]`.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Angle of the shoulder-to-hip axis from vertical, in degrees.
///
/// Folded into `[0, 90]`: 0 is upright, 90 is horizontal, regardless of
/// which end of the torso is higher in the image.
pub fn torso_angle(pose: &Pose) -> f32 {
    let [sx, sy] = pose.shoulder_midpoint();
    let [hx, hy] = pose.hip_midpoint();
    (sx - hx).abs().atan2((sy - hy).abs()).to_degrees()
}

/// Hip midpoint height as a fraction of the frame: 0 at the bottom, 1 at the top.
pub fn normalized_hip_height(pose: &Pose, frame_height: u32) -> f32 {
    let h = (frame_height as f32).max(1.0);
    1.0 - pose.hip_midpoint()[1] / h
}
