//! Agent output events
//!
//! Closed set of typed events. Common fields live on [`Event`]; each
//! [`EventKind`] variant carries the domain payload of one agent. On the
//! wire the two are flattened into a single record tagged by `event_type`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::BoundingBox;

/// Event discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FallDetection,
    EmotionDetection,
    VitalSigns,
    BedExit,
    Immobility,
    SeizureDetection,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FallDetection => "fall_detection",
            Self::EmotionDetection => "emotion_detection",
            Self::VitalSigns => "vital_signs",
            Self::BedExit => "bed_exit",
            Self::Immobility => "immobility",
            Self::SeizureDetection => "seizure_detection",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallType {
    Fall,
    NearFall,
    Lying,
    /// Reserved; the geometric classifier never produces it.
    AbnormalCollapse,
}

impl FallType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fall => "fall",
            Self::NearFall => "near_fall",
            Self::Lying => "lying",
            Self::AbnormalCollapse => "abnormal_collapse",
        }
    }
}

impl fmt::Display for FallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fear,
    Disgust,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Fear,
        Self::Disgust,
        Self::Surprise,
        Self::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Fear => "fear",
            Self::Disgust => "disgust",
            Self::Surprise => "surprise",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bed-exit state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BedState {
    InBed,
    SittingUp,
    Standing,
    OutOfBed,
}

impl BedState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InBed => "IN_BED",
            Self::SittingUp => "SITTING_UP",
            Self::Standing => "STANDING",
            Self::OutOfBed => "OUT_OF_BED",
        }
    }
}

impl fmt::Display for BedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pressure-injury risk from time without movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Supine,
    Prone,
    LyingSide,
    #[default]
    Unknown,
}

impl Posture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supine => "supine",
            Self::Prone => "prone",
            Self::LyingSide => "lying_side",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallDetails {
    pub fall_type: FallType,
    pub bbox: Option<BoundingBox>,
    /// Flattened `[x, y, z]` per keypoint
    pub pose_vector: Vec<f32>,
    /// Degrees from vertical
    pub torso_angle: f32,
    pub hip_height: f32,
    pub vertical_velocity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionDetails {
    pub emotion: Emotion,
    /// -1 (negative) to +1 (positive)
    pub valence: f32,
    /// -1 (calm) to +1 (excited)
    pub arousal: f32,
    pub face_bbox: Option<BoundingBox>,
    pub emotion_probabilities: BTreeMap<Emotion, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSignsDetails {
    /// Beats per minute
    pub heart_rate: f32,
    /// Breaths per minute
    pub respiratory_rate: f32,
    pub signal_quality: f32,
    pub hr_confidence: f32,
    pub rr_confidence: f32,
}

impl VitalSignsDetails {
    /// Both rates within physiological bounds and quality above 0.6.
    pub fn is_valid(&self) -> bool {
        (40.0..=180.0).contains(&self.heart_rate)
            && (8.0..=30.0).contains(&self.respiratory_rate)
            && self.signal_quality > 0.6
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedExitDetails {
    pub state: BedState,
    pub previous_state: Option<BedState>,
    pub transition: bool,
    /// Seconds in `state`; zero at the moment of transition
    pub duration_in_state: f64,
    /// Seconds spent in `previous_state` before this transition
    pub previous_state_duration: f64,
    pub bed_region: Option<BoundingBox>,
    pub person_bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmobilityDetails {
    /// Seconds since the last detected movement
    pub immobility_duration: f64,
    pub last_movement_time: f64,
    pub risk_level: RiskLevel,
    pub posture: Posture,
    pub movement_magnitude: f32,
    pub posture_change_count: u32,
}

impl ImmobilityDetails {
    /// Duration has passed the alert threshold.
    pub fn is_alert_worthy(&self) -> bool {
        self.risk_level == RiskLevel::High
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeizureDetails {
    pub seizure_detected: bool,
    /// Dominant motion frequency in Hz
    pub motion_frequency: f32,
    pub affected_limbs: Vec<String>,
    /// Seconds since the episode began
    pub duration: f64,
    pub magnitude: f32,
}

/// Domain payload, one variant per agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    FallDetection(FallDetails),
    EmotionDetection(EmotionDetails),
    VitalSigns(VitalSignsDetails),
    BedExit(BedExitDetails),
    Immobility(ImmobilityDetails),
    SeizureDetection(SeizureDetails),
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::FallDetection(_) => EventType::FallDetection,
            Self::EmotionDetection(_) => EventType::EmotionDetection,
            Self::VitalSigns(_) => EventType::VitalSigns,
            Self::BedExit(_) => EventType::BedExit,
            Self::Immobility(_) => EventType::Immobility,
            Self::SeizureDetection(_) => EventType::SeizureDetection,
        }
    }
}

/// Immutable agent output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: f64,
    pub confidence: f32,
    pub agent_name: String,
    pub frame_id: u64,
}

impl Event {
    pub fn new(
        kind: EventKind,
        timestamp: f64,
        confidence: f32,
        agent_name: impl Into<String>,
        frame_id: u64,
    ) -> Self {
        Self {
            kind,
            timestamp,
            confidence: confidence.clamp(0.0, 1.0),
            agent_name: agent_name.into(),
            frame_id,
        }
    }

    #[inline]
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
