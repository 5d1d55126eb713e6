//! Bed Exit Agent
//!
//! Per-frame posture and position classification into
//! `IN_BED / SITTING_UP / STANDING / OUT_OF_BED`, reporting state changes.
//! Without a configured bed region the agent first calibrates one from
//! the subject's box over the opening frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::geometry::{iou, normalized_hip_height, torso_angle};
use vigil_core::{
    apply_overrides, ensure, BedExitDetails, BedState, BoundingBox, ConfigError, ConfigMap,
    ConfigSection, Event, EventKind, FrameSnapshot, Pose, SharedClock,
};
use vigil_signals::Frame;

use crate::agent::{AgentCore, MonitorAgent};
use crate::error::AgentError;

pub const AGENT_NAME: &str = "bed_exit";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BedExitConfig {
    /// Event confidence for every transition
    pub transition_confidence: f32,
    /// Degrees from vertical
    pub sitting_angle_threshold: f32,
    /// Normalized hip height
    pub standing_height_threshold: f32,
    /// Torso angle below which a high subject counts as standing
    pub standing_angle_max: f32,
    /// Box overlap below which the subject has left the bed
    pub out_of_bed_iou: f32,
    pub sitting_hip_min: f32,
    pub calibration_frames: usize,
    /// Fractional padding around the calibrated mean box
    pub calibration_margin: f32,
    pub alert_on_states: Vec<BedState>,
    /// Also report transitions into states outside `alert_on_states`
    pub report_recovery_transitions: bool,
    /// Fixed bed region; calibrated automatically when absent
    pub bed_region: Option<BoundingBox>,
}

impl Default for BedExitConfig {
    fn default() -> Self {
        Self {
            transition_confidence: 0.7,
            sitting_angle_threshold: 45.0,
            standing_height_threshold: 0.6,
            standing_angle_max: 30.0,
            out_of_bed_iou: 0.3,
            sitting_hip_min: 0.3,
            calibration_frames: 30,
            calibration_margin: 0.1,
            alert_on_states: vec![BedState::Standing, BedState::OutOfBed],
            report_recovery_transitions: false,
            bed_region: None,
        }
    }
}

impl ConfigSection for BedExitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            (0.0..=1.0).contains(&self.transition_confidence),
            "transition_confidence must be in [0, 1]",
        )?;
        ensure(
            (0.0..=1.0).contains(&self.out_of_bed_iou),
            "out_of_bed_iou must be in [0, 1]",
        )?;
        ensure(self.calibration_frames >= 1, "calibration_frames must be at least 1")?;
        ensure(
            self.calibration_margin >= 0.0,
            "calibration_margin must be non-negative",
        )?;
        if let Some(region) = &self.bed_region {
            ensure(region.area() > 0.0, "bed_region must have a positive area")?;
        }
        Ok(())
    }
}

/// Running mean of the subject's box before a bed region is known.
#[derive(Debug, Clone, Default)]
struct Calibration {
    sum: [f32; 4],
    frames: usize,
}

impl Calibration {
    fn add(&mut self, b: &BoundingBox) {
        self.sum[0] += b.x1;
        self.sum[1] += b.y1;
        self.sum[2] += b.x2;
        self.sum[3] += b.y2;
        self.frames += 1;
    }

    fn mean(&self) -> Option<BoundingBox> {
        if self.frames == 0 {
            return None;
        }
        let n = self.frames as f32;
        Some(BoundingBox::new(
            self.sum[0] / n,
            self.sum[1] / n,
            self.sum[2] / n,
            self.sum[3] / n,
        ))
    }
}

pub struct BedExitAgent {
    core: AgentCore,
    config: BedExitConfig,
    clock: SharedClock,
    bed_region: Option<BoundingBox>,
    calibration: Calibration,
    current_state: BedState,
    state_start: f64,
}

impl BedExitAgent {
    pub fn new(clock: SharedClock) -> Self {
        let config = BedExitConfig::default();
        let state_start = clock.now();
        Self {
            core: AgentCore::new(AGENT_NAME),
            bed_region: config.bed_region,
            config,
            clock,
            calibration: Calibration::default(),
            current_state: BedState::InBed,
            state_start,
        }
    }

    pub fn with_config(config: BedExitConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "{AGENT_NAME}: bed region {}, alerting on {:?}",
            if config.bed_region.is_some() { "fixed" } else { "auto" },
            config.alert_on_states
        );
        let state_start = clock.now();
        Ok(Self {
            core: AgentCore::new(AGENT_NAME),
            bed_region: config.bed_region,
            config,
            clock,
            calibration: Calibration::default(),
            current_state: BedState::InBed,
            state_start,
        })
    }

    pub fn config(&self) -> &BedExitConfig {
        &self.config
    }

    pub fn current_state(&self) -> BedState {
        self.current_state
    }

    pub fn bed_region(&self) -> Option<BoundingBox> {
        self.bed_region
    }

    fn calibrate(&mut self, bbox: &BoundingBox) {
        self.calibration.add(bbox);
        if self.calibration.frames < self.config.calibration_frames {
            return;
        }
        if let Some(mean) = self.calibration.mean() {
            let region = mean.pad(self.config.calibration_margin);
            log::info!(
                "{AGENT_NAME}: bed region calibrated over {} frames: ({:.0}, {:.0})-({:.0}, {:.0})",
                self.calibration.frames,
                region.x1,
                region.y1,
                region.x2,
                region.y2
            );
            self.bed_region = Some(region);
        }
    }

    fn classify(&self, person: &BoundingBox, pose: &Pose, frame_height: u32) -> BedState {
        let c = &self.config;
        let hip_height = normalized_hip_height(pose, frame_height);
        let angle = torso_angle(pose);
        let overlap = self.bed_region.map_or(0.0, |region| iou(person, &region));

        if hip_height > c.standing_height_threshold && angle < c.standing_angle_max {
            BedState::Standing
        } else if overlap < c.out_of_bed_iou {
            BedState::OutOfBed
        } else if angle > c.sitting_angle_threshold && hip_height > c.sitting_hip_min {
            BedState::SittingUp
        } else {
            BedState::InBed
        }
    }

    fn reports(&self, state: BedState) -> bool {
        self.config.report_recovery_transitions || self.config.alert_on_states.contains(&state)
    }
}

impl MonitorAgent for BedExitAgent {
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
        let Some(detection) = snapshot.primary() else {
            return Ok(None);
        };
        if self.bed_region.is_none() {
            self.calibrate(&detection.bbox);
            return Ok(None);
        }
        let Some(pose) = &detection.pose else {
            return Ok(None);
        };

        let state = self.classify(&detection.bbox, pose, snapshot.height);
        if state == self.current_state {
            return Ok(None);
        }

        let now = self.clock.now();
        let previous = self.current_state;
        let previous_duration = now - self.state_start;
        self.current_state = state;
        self.state_start = now;
        log::debug!("{AGENT_NAME}: {previous} -> {state} after {previous_duration:.1}s");

        if !self.reports(state) {
            return Ok(None);
        }

        let details = BedExitDetails {
            state,
            previous_state: Some(previous),
            transition: true,
            duration_in_state: 0.0,
            previous_state_duration: previous_duration,
            bed_region: self.bed_region,
            person_bbox: Some(detection.bbox),
        };
        Ok(Some(Event::new(
            EventKind::BedExit(details),
            snapshot.timestamp,
            self.config.transition_confidence,
            AGENT_NAME,
            snapshot.frame_id,
        )))
    }

    /// Returns to `IN_BED`. A calibrated bed region is kept.
    fn reset(&mut self) {
        self.core.reset();
        self.current_state = BedState::InBed;
        self.state_start = self.clock.now();
        if self.bed_region.is_none() {
            self.calibration = Calibration::default();
        }
    }

    fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        let config = apply_overrides(&self.config, overrides)?;
        if config.bed_region != self.config.bed_region {
            self.bed_region = config.bed_region;
            self.calibration = Calibration::default();
        }
        self.config = config;
        Ok(())
    }

    fn config_value(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }

    fn status_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("calibrated".into(), self.bed_region.is_some().into());
        details.insert(
            "calibration_progress".into(),
            format!(
                "{}/{}",
                self.calibration.frames.min(self.config.calibration_frames),
                self.config.calibration_frames
            )
            .into(),
        );
        details.insert("current_state".into(), self.current_state.as_str().into());
        details
    }
}
