//! Immobility Agent
//!
//! Tracks time since the subject last moved and raises pressure-injury
//! risk once it passes the warning and alert durations. Evaluation runs on
//! a wall-clock check interval, independent of frame rate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::geometry::{distance, torso_angle};
use vigil_core::{
    apply_overrides, ensure, ConfigError, ConfigMap, ConfigSection, Event, EventKind, FrameSnapshot,
    ImmobilityDetails, Pose, PoseLandmark, Posture, RiskLevel, SharedClock,
};
use vigil_signals::Frame;

use crate::agent::{AgentCore, MonitorAgent};
use crate::error::AgentError;

pub const AGENT_NAME: &str = "immobility";

/// Landmarks compared between consecutive poses.
const MOVEMENT_LANDMARKS: [PoseLandmark; 5] = [
    PoseLandmark::Nose,
    PoseLandmark::LeftShoulder,
    PoseLandmark::RightShoulder,
    PoseLandmark::LeftHip,
    PoseLandmark::RightHip,
];

const MIN_VISIBILITY: f32 = 0.5;

/// Torso angle above which the subject lies on their side.
const SIDE_LYING_ANGLE: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmobilityConfig {
    /// Mean landmark displacement (pixels) that counts as movement
    pub movement_threshold: f32,
    /// Seconds without movement for HIGH risk
    pub alert_duration: f64,
    /// Seconds without movement for MEDIUM risk
    pub warning_duration: f64,
    /// Seconds between risk evaluations
    pub check_interval: f64,
}

impl Default for ImmobilityConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 0.05,
            alert_duration: 7200.0,
            warning_duration: 5400.0,
            check_interval: 60.0,
        }
    }
}

impl ConfigSection for ImmobilityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.movement_threshold >= 0.0, "movement_threshold must be non-negative")?;
        ensure(self.alert_duration > 0.0, "alert_duration must be positive")?;
        ensure(
            self.warning_duration <= self.alert_duration,
            "warning_duration must not exceed alert_duration",
        )?;
        ensure(self.check_interval >= 0.0, "check_interval must be non-negative")
    }
}

/// Mean displacement of the visible movement landmarks between two poses.
fn movement_between(previous: &Pose, current: &Pose) -> f32 {
    let (total, count) = MOVEMENT_LANDMARKS
        .iter()
        .map(|&lm| (previous.keypoint(lm), current.keypoint(lm)))
        .filter(|(a, b)| a.visibility > MIN_VISIBILITY && b.visibility > MIN_VISIBILITY)
        .fold((0.0, 0u32), |(total, count), (a, b)| {
            (total + distance(a.xy(), b.xy()), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        total / count as f32
    }
}

fn posture_of(pose: &Pose) -> Posture {
    if torso_angle(pose) > SIDE_LYING_ANGLE {
        Posture::LyingSide
    } else if pose.shoulder_midpoint()[1] < pose.hip_midpoint()[1] {
        Posture::Prone
    } else {
        Posture::Supine
    }
}

pub struct ImmobilityAgent {
    core: AgentCore,
    config: ImmobilityConfig,
    clock: SharedClock,
    last_pose: Option<Pose>,
    last_movement_time: f64,
    last_check_time: f64,
    last_movement_magnitude: f32,
    posture: Posture,
    posture_change_count: u32,
}

impl ImmobilityAgent {
    pub fn new(clock: SharedClock) -> Self {
        Self::build(ImmobilityConfig::default(), clock)
    }

    pub fn with_config(config: ImmobilityConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "{AGENT_NAME}: warning after {}s, alert after {}s",
            config.warning_duration,
            config.alert_duration
        );
        Ok(Self::build(config, clock))
    }

    fn build(config: ImmobilityConfig, clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            core: AgentCore::new(AGENT_NAME),
            config,
            clock,
            last_pose: None,
            last_movement_time: now,
            last_check_time: now,
            last_movement_magnitude: 0.0,
            posture: Posture::Unknown,
            posture_change_count: 0,
        }
    }

    pub fn config(&self) -> &ImmobilityConfig {
        &self.config
    }

    pub fn posture(&self) -> Posture {
        self.posture
    }

    pub fn posture_change_count(&self) -> u32 {
        self.posture_change_count
    }

    fn risk_for(&self, duration: f64) -> RiskLevel {
        if duration > self.config.alert_duration {
            RiskLevel::High
        } else if duration > self.config.warning_duration {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn track_movement(&mut self, pose: &Pose, now: f64) {
        if let Some(previous) = &self.last_pose {
            let magnitude = movement_between(previous, pose);
            self.last_movement_magnitude = magnitude;
            if magnitude > self.config.movement_threshold {
                self.last_movement_time = now;
            }

            let posture = posture_of(pose);
            if posture != self.posture {
                log::trace!(
                    "{AGENT_NAME}: posture {} -> {}",
                    self.posture.as_str(),
                    posture.as_str()
                );
                self.posture = posture;
                self.posture_change_count += 1;
            }
        }
        self.last_pose = Some(pose.clone());
    }
}

impl MonitorAgent for ImmobilityAgent {
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
        let Some((_, pose)) = snapshot.primary_pose() else {
            return Ok(None);
        };

        let now = self.clock.now();
        self.track_movement(pose, now);

        if now - self.last_check_time < self.config.check_interval {
            return Ok(None);
        }
        self.last_check_time = now;

        let duration = now - self.last_movement_time;
        let risk_level = self.risk_for(duration);
        if risk_level == RiskLevel::Low {
            return Ok(None);
        }

        log::debug!("{AGENT_NAME}: {risk_level} risk after {duration:.0}s without movement");
        let details = ImmobilityDetails {
            immobility_duration: duration,
            last_movement_time: self.last_movement_time,
            risk_level,
            posture: self.posture,
            movement_magnitude: self.last_movement_magnitude,
            posture_change_count: self.posture_change_count,
        };
        let confidence = (duration / self.config.alert_duration).min(1.0);
        Ok(Some(Event::new(
            EventKind::Immobility(details),
            snapshot.timestamp,
            confidence as f32,
            AGENT_NAME,
            snapshot.frame_id,
        )))
    }

    fn reset(&mut self) {
        let now = self.clock.now();
        self.core.reset();
        self.last_pose = None;
        self.last_movement_time = now;
        self.last_check_time = now;
        self.last_movement_magnitude = 0.0;
        self.posture = Posture::Unknown;
        self.posture_change_count = 0;
    }

    fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        self.config = apply_overrides(&self.config, overrides)?;
        Ok(())
    }

    fn config_value(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }

    fn status_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert(
            "seconds_since_movement".into(),
            (self.clock.now() - self.last_movement_time).into(),
        );
        details.insert("posture".into(), self.posture.as_str().into());
        details.insert("posture_changes".into(), self.posture_change_count.into());
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{frame_with_pose, torso_pose};
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use vigil_core::ManualClock;

    fn agent() -> (ImmobilityAgent, Arc<ManualClock>) {
        let clock = ManualClock::shared(0.0);
        (ImmobilityAgent::new(clock.clone()), clock)
    }

    fn still_pose() -> Pose {
        torso_pose([320.0, 300.0], 80.0, 100.0)
    }

    /// Advance the clock to `at` and feed one frame.
    fn observe(agent: &mut ImmobilityAgent, clock: &ManualClock, i: u64, at: f64, pose: Pose) -> Option<Event> {
        clock.set(at);
        agent.detect(&frame_with_pose(i, at, pose), None).unwrap()
    }

    #[test]
    fn test_risk_escalates_without_movement() {
        let (mut agent, clock) = agent();
        assert!(observe(&mut agent, &clock, 0, 0.0, still_pose()).is_none());
        assert!(observe(&mut agent, &clock, 1, 60.0, still_pose()).is_none());

        let medium = observe(&mut agent, &clock, 2, 5460.0, still_pose()).unwrap();
        let EventKind::Immobility(details) = &medium.kind else {
            panic!("expected an immobility event");
        };
        assert_eq!(details.risk_level, RiskLevel::Medium);
        assert_relative_eq!(details.immobility_duration, 5460.0);
        assert_eq!(details.last_movement_time, 0.0);
        assert!(!details.is_alert_worthy());
        assert_relative_eq!(medium.confidence, (5460.0 / 7200.0) as f32, epsilon = 1e-6);

        let high = observe(&mut agent, &clock, 3, 7260.0, still_pose()).unwrap();
        let EventKind::Immobility(details) = &high.kind else {
            panic!("expected an immobility event");
        };
        assert_eq!(details.risk_level, RiskLevel::High);
        assert!(details.is_alert_worthy());
        assert_relative_eq!(high.confidence, 1.0);
    }

    #[test]
    fn test_check_interval_throttles() {
        let (mut agent, clock) = agent();
        observe(&mut agent, &clock, 0, 0.0, still_pose());
        assert!(observe(&mut agent, &clock, 1, 6000.0, still_pose()).is_some());
        assert!(observe(&mut agent, &clock, 2, 6030.0, still_pose()).is_none());
        assert!(observe(&mut agent, &clock, 3, 6060.0, still_pose()).is_some());
    }

    #[test]
    fn test_movement_resets_timer() {
        let (mut agent, clock) = agent();
        observe(&mut agent, &clock, 0, 0.0, still_pose());
        observe(&mut agent, &clock, 1, 5000.0, torso_pose([340.0, 300.0], 80.0, 100.0));

        assert!(observe(&mut agent, &clock, 2, 5460.0, torso_pose([340.0, 300.0], 80.0, 100.0)).is_none());
        let event = observe(&mut agent, &clock, 3, 10500.0, torso_pose([340.0, 300.0], 80.0, 100.0)).unwrap();
        let EventKind::Immobility(details) = &event.kind else {
            panic!("expected an immobility event");
        };
        assert_eq!(details.last_movement_time, 5000.0);
        assert_eq!(details.risk_level, RiskLevel::Medium);
        assert_eq!(details.movement_magnitude, 0.0);
    }

    #[test]
    fn test_occluded_landmarks_do_not_count_as_movement() {
        let (mut agent, clock) = agent();
        observe(&mut agent, &clock, 0, 0.0, still_pose());

        let mut moved = torso_pose([500.0, 100.0], 80.0, 100.0);
        for lm in MOVEMENT_LANDMARKS {
            moved.keypoint_mut(lm).visibility = 0.3;
        }
        observe(&mut agent, &clock, 1, 100.0, moved);
        let event = observe(&mut agent, &clock, 2, 5500.0, still_pose()).unwrap();
        let EventKind::Immobility(details) = &event.kind else {
            panic!("expected an immobility event");
        };
        assert_eq!(details.last_movement_time, 0.0);
    }

    #[test]
    fn test_posture_changes_are_counted() {
        let (mut agent, clock) = agent();
        observe(&mut agent, &clock, 0, 0.0, torso_pose([320.0, 300.0], 0.0, 100.0));
        assert_eq!(agent.posture(), Posture::Unknown);

        observe(&mut agent, &clock, 1, 1.0, torso_pose([320.0, 300.0], 0.0, 100.0));
        assert_eq!(agent.posture(), Posture::Prone);

        observe(&mut agent, &clock, 2, 2.0, torso_pose([320.0, 300.0], 180.0, 100.0));
        assert_eq!(agent.posture(), Posture::Supine);

        observe(&mut agent, &clock, 3, 3.0, torso_pose([320.0, 300.0], 90.0, 100.0));
        assert_eq!(agent.posture(), Posture::LyingSide);
        assert_eq!(agent.posture_change_count(), 3);
    }

    #[test]
    fn test_reset_restarts_timer() {
        let (mut agent, clock) = agent();
        observe(&mut agent, &clock, 0, 0.0, still_pose());
        clock.set(5000.0);
        agent.reset();
        assert!(observe(&mut agent, &clock, 0, 5460.0, still_pose()).is_none());
        assert_eq!(agent.posture_change_count(), 0);
    }
}
