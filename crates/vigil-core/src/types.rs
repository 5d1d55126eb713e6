//! Per-frame perception input
//!
//! Produced once per processed frame by the perception layer and read-only
//! to every agent.

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Axis-aligned box in pixel coordinates, corners `(x1, y1)`-`(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence: 1.0,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Grow each side by `margin` times the box's own extent along that axis.
    pub fn pad(&self, margin: f32) -> Self {
        let dx = self.width() * margin;
        let dy = self.height() * margin;
        Self {
            x1: self.x1 - dx,
            y1: self.y1 - dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
            confidence: self.confidence,
        }
    }
}

/// One tracked subject in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: u32,
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(default)]
    pub pose: Option<Pose>,
    #[serde(default)]
    pub face_bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(track_id: u32, bbox: BoundingBox) -> Self {
        Self {
            track_id,
            confidence: bbox.confidence,
            bbox,
            pose: None,
            face_bbox: None,
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn with_face(mut self, face_bbox: BoundingBox) -> Self {
        self.face_bbox = Some(face_bbox);
        self
    }
}

/// Everything an agent sees about one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Monotonic frame index
    pub frame_id: u64,
    /// Capture time in seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl FrameSnapshot {
    pub fn new(frame_id: u64, timestamp: f64, width: u32, height: u32, fps: f32) -> Self {
        Self {
            frame_id,
            timestamp,
            width,
            height,
            fps,
            detections: Vec::new(),
        }
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detections.push(detection);
        self
    }

    /// The monitored subject: the first detection in the frame.
    pub fn primary(&self) -> Option<&Detection> {
        self.detections.first()
    }

    /// Pose of the monitored subject, when one was estimated.
    pub fn primary_pose(&self) -> Option<(&Detection, &Pose)> {
        let detection = self.primary()?;
        detection.pose.as_ref().map(|pose| (detection, pose))
    }
}
