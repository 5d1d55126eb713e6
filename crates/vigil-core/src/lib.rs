//! # vigil-core
//!
//! Shared domain model for the Vigil patient monitoring engine.
//!
//! This crate provides:
//! - **Perception input**: `FrameSnapshot`, `Detection`, `BoundingBox`, and the
//!   33-point `Pose` with its `PoseLandmark` index table
//! - **Agent output**: the closed `Event` / `EventKind` set and `ConsolidatedAlert`
//! - **Temporal plumbing**: `RingBuffer` sliding windows and the injectable `Clock`
//! - **Configuration**: flat override maps and `ConfigError`
//!
//! ## Example
//!
//! ```
//! use vigil_core::RingBuffer;
//!
//! let mut window = RingBuffer::new(3);
//! for i in 0..5 {
//!     window.push(i);
//! }
//! assert_eq!(window.oldest(), Some(&2));
//! assert_eq!(window.latest(), Some(&4));
//! ```

pub mod alert;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod event;
pub mod geometry;
pub mod pose;
pub mod types;

pub use alert::{AlertLevel, ConsolidatedAlert};
pub use buffer::RingBuffer;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{apply_overrides, ensure, ConfigError, ConfigMap, ConfigSection};
pub use event::{
    BedExitDetails, BedState, Emotion, EmotionDetails, Event, EventKind, EventType, FallDetails,
    FallType, ImmobilityDetails, Posture, RiskLevel, SeizureDetails, VitalSignsDetails,
};
pub use pose::{Keypoint, Limb, Pose, PoseError, PoseLandmark, POSE_KEYPOINT_COUNT};
pub use types::{BoundingBox, Detection, FrameSnapshot};
