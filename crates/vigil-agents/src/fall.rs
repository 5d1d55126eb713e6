//! Fall Detection Agent
//!
//! Windowed pose geometry. Once the window of recent poses is full, the
//! current torso angle and hip height are combined with the hip's vertical
//! speed across the window and classified, in priority order, as `lying`,
//! `fall` or `near_fall`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::geometry::{normalized_hip_height, torso_angle};
use vigil_core::{
    apply_overrides, ensure, BoundingBox, ConfigError, ConfigMap, ConfigSection, Event, EventKind,
    FallDetails, FallType, FrameSnapshot, Pose, RingBuffer, SharedClock,
};
use vigil_signals::Frame;

use crate::agent::{AgentCore, MonitorAgent};
use crate::error::AgentError;

pub const AGENT_NAME: &str = "fall_detection";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallDetectionConfig {
    /// Poses required before classifying
    pub sequence_length: usize,
    pub confidence_threshold: f32,
    /// Degrees from vertical
    pub fall_angle_threshold: f32,
    /// Normalized hip height below which the subject counts as low
    pub hip_height_threshold: f32,
    /// Normalized vertical velocity
    pub velocity_threshold: f32,
    /// Pixels per second mapped to a normalized velocity of 1
    pub velocity_scale: f32,
    pub cooldown_secs: f64,
}

impl Default for FallDetectionConfig {
    fn default() -> Self {
        Self {
            sequence_length: 30,
            confidence_threshold: 0.7,
            fall_angle_threshold: 60.0,
            hip_height_threshold: 0.3,
            velocity_threshold: 0.5,
            velocity_scale: 100.0,
            cooldown_secs: 3.0,
        }
    }
}

impl ConfigSection for FallDetectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.sequence_length >= 2, "sequence_length must be at least 2")?;
        ensure(
            (0.0..=1.0).contains(&self.confidence_threshold),
            "confidence_threshold must be in [0, 1]",
        )?;
        ensure(
            (0.0..=90.0).contains(&self.fall_angle_threshold),
            "fall_angle_threshold must be in [0, 90] degrees",
        )?;
        ensure(self.velocity_scale > 0.0, "velocity_scale must be positive")?;
        ensure(self.cooldown_secs >= 0.0, "cooldown_secs must be non-negative")
    }
}

#[derive(Debug, Clone)]
struct PoseSample {
    pose: Pose,
    timestamp: f64,
    bbox: BoundingBox,
}

/// Geometric indicators for the current frame.
#[derive(Debug, Clone, Copy)]
struct FallIndicators {
    torso_angle: f32,
    hip_height: f32,
    vertical_velocity: f32,
}

pub struct FallDetectionAgent {
    core: AgentCore,
    config: FallDetectionConfig,
    clock: SharedClock,
    window: RingBuffer<PoseSample>,
    last_event_time: Option<f64>,
}

impl FallDetectionAgent {
    pub fn new(clock: SharedClock) -> Self {
        Self::build(FallDetectionConfig::default(), clock)
    }

    pub fn with_config(config: FallDetectionConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "{AGENT_NAME}: window {} poses, threshold {}",
            config.sequence_length,
            config.confidence_threshold
        );
        Ok(Self::build(config, clock))
    }

    fn build(config: FallDetectionConfig, clock: SharedClock) -> Self {
        Self {
            core: AgentCore::new(AGENT_NAME),
            window: RingBuffer::new(config.sequence_length),
            config,
            clock,
            last_event_time: None,
        }
    }

    pub fn config(&self) -> &FallDetectionConfig {
        &self.config
    }

    fn in_cooldown(&self, now: f64) -> bool {
        self.last_event_time
            .map_or(false, |last| now - last < self.config.cooldown_secs)
    }

    /// Hip displacement between the oldest and newest pose, normalized to [0, 1].
    fn vertical_velocity(&self) -> f32 {
        let (Some(oldest), Some(newest)) = (self.window.oldest(), self.window.latest()) else {
            return 0.0;
        };
        let dt = (newest.timestamp - oldest.timestamp) as f32;
        if dt <= 0.0 {
            return 0.0;
        }
        let dy = (newest.pose.hip_midpoint()[1] - oldest.pose.hip_midpoint()[1]).abs();
        (dy / dt / self.config.velocity_scale).min(1.0)
    }

    fn classify(&self, ind: &FallIndicators) -> Option<(FallType, f32)> {
        let c = &self.config;
        let angle = ind.torso_angle;
        let velocity = ind.vertical_velocity;

        if ind.hip_height < c.hip_height_threshold && angle > c.fall_angle_threshold {
            let confidence = ((1.0 - ind.hip_height) * angle / 90.0).min(1.0);
            Some((FallType::Lying, confidence))
        } else if velocity > c.velocity_threshold && angle > c.fall_angle_threshold * 0.5 {
            Some((FallType::Fall, (velocity * angle / 90.0).min(1.0)))
        } else if velocity > c.velocity_threshold * 0.7 && angle > c.fall_angle_threshold * 0.7 {
            Some((FallType::NearFall, (velocity * 0.8).min(1.0)))
        } else {
            None
        }
    }
}

impl MonitorAgent for FallDetectionAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn detect(
        &mut self,
        snapshot: &FrameSnapshot,
        _image: Option<&Frame>,
    ) -> Result<Option<Event>, AgentError> {
        if !self.core.admit(snapshot)? {
            return Ok(None);
        }
        let Some((detection, pose)) = snapshot.primary_pose() else {
            return Ok(None);
        };

        self.window.push(PoseSample {
            pose: pose.clone(),
            timestamp: snapshot.timestamp,
            bbox: detection.bbox,
        });
        if !self.window.is_full() {
            return Ok(None);
        }

        let now = self.clock.now();
        if self.in_cooldown(now) {
            return Ok(None);
        }

        let indicators = FallIndicators {
            torso_angle: torso_angle(pose),
            hip_height: normalized_hip_height(pose, snapshot.height),
            vertical_velocity: self.vertical_velocity(),
        };
        let Some((fall_type, confidence)) = self.classify(&indicators) else {
            return Ok(None);
        };
        if confidence <= self.config.confidence_threshold {
            return Ok(None);
        }

        self.last_event_time = Some(now);
        log::debug!(
            "{AGENT_NAME}: {fall_type} at frame {} (confidence {confidence:.2}, angle {:.1})",
            snapshot.frame_id,
            indicators.torso_angle
        );

        let bbox = self.window.latest().map(|s| s.bbox);
        let details = FallDetails {
            fall_type,
            bbox,
            pose_vector: pose.to_vector(),
            torso_angle: indicators.torso_angle,
            hip_height: indicators.hip_height,
            vertical_velocity: indicators.vertical_velocity,
        };
        Ok(Some(Event::new(
            EventKind::FallDetection(details),
            snapshot.timestamp,
            confidence,
            AGENT_NAME,
            snapshot.frame_id,
        )))
    }

    fn reset(&mut self) {
        self.core.reset();
        self.window.clear();
        self.last_event_time = None;
    }

    fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        let config = apply_overrides(&self.config, overrides)?;
        if config.sequence_length != self.config.sequence_length {
            let mut window = RingBuffer::new(config.sequence_length);
            for sample in self.window.window(config.sequence_length) {
                window.push(sample.clone());
            }
            self.window = window;
        }
        self.config = config;
        Ok(())
    }

    fn config_value(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }

    fn status_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("window_fill".into(), self.window.len().into());
        details.insert("last_event_time".into(), self.last_event_time.into());
        details
    }
}
