//! Vital Signs Agent
//!
//! Buffers face crops and periodically runs the rPPG processor over the
//! full window. Estimates outside physiological bounds, below the quality
//! floor or without a distinct heart-rate peak are discarded for that window.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::{
    apply_overrides, ensure, ConfigError, ConfigMap, ConfigSection, Event, EventKind, FrameSnapshot,
    RingBuffer, VitalSignsDetails,
};
use vigil_signals::{Frame, RppgAlgorithm, RppgConfig, RppgProcessor, VitalSigns};

use crate::agent::{crop_region, AgentCore, MonitorAgent};
use crate::error::AgentError;

pub const AGENT_NAME: &str = "vital_signs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalSignsConfig {
    pub algorithm: RppgAlgorithm,
    pub fps: f64,
    /// Face crops per analysis window
    pub window_size: usize,
    /// Accepted heart rate in bpm
    pub hr_range: (f64, f64),
    /// Accepted respiratory rate in breaths/min
    pub rr_range: (f64, f64),
    pub signal_quality_threshold: f64,
    /// Heart-rate peak prominence required; a flat spectrum scores 0
    pub min_hr_confidence: f64,
    /// Frames between analyses
    pub update_interval: u64,
}

impl Default for VitalSignsConfig {
    fn default() -> Self {
        Self {
            algorithm: RppgAlgorithm::Chrom,
            fps: 30.0,
            window_size: 300,
            hr_range: (40.0, 180.0),
            rr_range: (8.0, 30.0),
            signal_quality_threshold: 0.6,
            min_hr_confidence: 0.1,
            update_interval: 30,
        }
    }
}

impl VitalSignsConfig {
    pub fn rppg_config(&self) -> RppgConfig {
        RppgConfig {
            algorithm: self.algorithm,
            fps: self.fps,
            window_size: self.window_size,
            ..RppgConfig::default()
        }
    }
}

impl ConfigSection for VitalSignsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.fps > 0.0, "fps must be positive")?;
        ensure(self.window_size >= 2, "window_size must be at least 2")?;
        ensure(self.hr_range.0 <= self.hr_range.1, "hr_range must be ordered")?;
        ensure(self.rr_range.0 <= self.rr_range.1, "rr_range must be ordered")?;
        ensure(
            (0.0..=1.0).contains(&self.signal_quality_threshold),
            "signal_quality_threshold must be in [0, 1]",
        )?;
        ensure(
            (0.0..=1.0).contains(&self.min_hr_confidence),
            "min_hr_confidence must be in [0, 1]",
        )?;
        ensure(self.update_interval >= 1, "update_interval must be at least 1")
    }
}

pub struct VitalSignsAgent {
    core: AgentCore,
    config: VitalSignsConfig,
    processor: RppgProcessor,
    crops: RingBuffer<Frame>,
    last_update_frame: u64,
}

impl VitalSignsAgent {
    pub fn new() -> Result<Self, AgentError> {
        Self::with_config(VitalSignsConfig::default())
    }

    pub fn with_config(config: VitalSignsConfig) -> Result<Self, AgentError> {
        config.validate()?;
        let processor = RppgProcessor::with_config(config.rppg_config())?;
        Ok(Self {
            core: AgentCore::new(AGENT_NAME),
            crops: RingBuffer::new(config.window_size),
            config,
            processor,
            last_update_frame: 0,
        })
    }

    pub fn config(&self) -> &VitalSignsConfig {
        &self.config
    }

    /// Why a window estimate is rejected, if it is.
    fn rejection(&self, vitals: &VitalSigns) -> Option<String> {
        let c = &self.config;
        let in_range = |v: f64, (lo, hi): (f64, f64)| lo <= v && v <= hi;
        if !in_range(vitals.heart_rate, c.hr_range) {
            Some(format!("heart rate {:.1} bpm out of range", vitals.heart_rate))
        } else if !in_range(vitals.respiratory_rate, c.rr_range) {
            Some(format!(
                "respiratory rate {:.1}/min out of range",
                vitals.respiratory_rate
            ))
        } else if vitals.signal_quality < c.signal_quality_threshold {
            Some(format!("signal quality {:.2} too low", vitals.signal_quality))
        } else if vitals.hr_confidence < c.min_hr_confidence {
            Some(format!("no heart-rate peak (confidence {:.2})", vitals.hr_confidence))
        } else {
            None
        }
    }
}

impl MonitorAgent for VitalSignsAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn detect(
        &mut self,
        snapshot: &FrameSnapshot,
        image: Option<&Frame>,
    ) -> Result<Option<Event>, AgentError> {
        if !self.core.admit(snapshot)? {
            return Ok(None);
        }
        let (Some(face), Some(image)) = (snapshot.primary().and_then(|d| d.face_bbox), image) else {
            return Ok(None);
        };
        let Some(crop) = crop_region(image, &face) else {
            return Ok(None);
        };
        self.crops.push(crop);

        let frame_count = self.core.frame_count();
        if frame_count - self.last_update_frame < self.config.update_interval || !self.crops.is_full() {
            return Ok(None);
        }
        self.last_update_frame = frame_count;

        let samples: Vec<[f64; 3]> = self.crops.iter().filter_map(Frame::mean_rgb).collect();
        let Some(vitals) = self.processor.process_rgb(&samples) else {
            log::trace!("{AGENT_NAME}: window unavailable at frame {}", snapshot.frame_id);
            return Ok(None);
        };
        if let Some(reason) = self.rejection(&vitals) {
            log::trace!("{AGENT_NAME}: discarded window at frame {}: {reason}", snapshot.frame_id);
            return Ok(None);
        }

        log::debug!(
            "{AGENT_NAME}: HR {:.1} bpm, RR {:.1}/min, quality {:.2}",
            vitals.heart_rate,
            vitals.respiratory_rate,
            vitals.signal_quality
        );
        let details = VitalSignsDetails {
            heart_rate: vitals.heart_rate as f32,
            respiratory_rate: vitals.respiratory_rate as f32,
            signal_quality: vitals.signal_quality as f32,
            hr_confidence: vitals.hr_confidence as f32,
            rr_confidence: vitals.rr_confidence as f32,
        };
        Ok(Some(Event::new(
            EventKind::VitalSigns(details),
            snapshot.timestamp,
            vitals.signal_quality as f32,
            AGENT_NAME,
            snapshot.frame_id,
        )))
    }

    fn reset(&mut self) {
        self.core.reset();
        self.crops.clear();
        self.last_update_frame = 0;
    }

    fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        let config = apply_overrides(&self.config, overrides)?;
        let processor = RppgProcessor::with_config(config.rppg_config())
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if config.window_size != self.config.window_size {
            let mut crops = RingBuffer::new(config.window_size);
            for crop in self.crops.window(config.window_size) {
                crops.push(crop.clone());
            }
            self.crops = crops;
        }
        self.processor = processor;
        self.config = config;
        Ok(())
    }

    fn config_value(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }

    fn status_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("buffered_crops".into(), self.crops.len().into());
        details.insert("last_update_frame".into(), self.last_update_frame.into());
        details
    }
}
