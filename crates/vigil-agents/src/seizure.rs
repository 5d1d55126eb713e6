//! Seizure Detection Agent
//!
//! Frequency-domain analysis of limb motion. For each of the four limb
//! groups the mean keypoint position is tracked over a ~5 s window, the
//! frame-to-frame speed is transformed with an FFT, and the strongest
//! component inside the clonic band (3-10 Hz by default) decides whether
//! that limb shows rhythmic activity. Enough simultaneously affected limbs
//! for longer than the duration threshold produce a seizure event.

use ndarray::{s, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::{
    apply_overrides, ensure, ConfigError, ConfigMap, ConfigSection, Event, EventKind, FrameSnapshot,
    Limb, Pose, RingBuffer, SeizureDetails, SharedClock,
};
use vigil_signals::{Frame, Spectrum};

use crate::agent::{AgentCore, MonitorAgent};
use crate::error::AgentError;

pub const AGENT_NAME: &str = "seizure_detection";

/// Keypoints below this visibility count as occluded.
const MIN_VISIBILITY: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeizureDetectionConfig {
    /// Seizure motion band in Hz
    pub frequency_range: (f64, f64),
    /// Normalized spectral magnitude a limb must exceed
    pub magnitude_threshold: f64,
    /// Seconds the condition must persist before alerting
    pub duration_threshold: f64,
    /// Carried for deployments that post-filter events; not used to gate emission
    pub confidence_threshold: f32,
    pub affected_limbs_min: usize,
    pub buffer_size: usize,
    pub cooldown_secs: f64,
    /// Pose sample rate in Hz
    pub sampling_rate: f64,
}

impl Default for SeizureDetectionConfig {
    fn default() -> Self {
        Self {
            frequency_range: (3.0, 10.0),
            magnitude_threshold: 0.3,
            duration_threshold: 5.0,
            confidence_threshold: 0.75,
            affected_limbs_min: 2,
            buffer_size: 150,
            cooldown_secs: 10.0,
            sampling_rate: 30.0,
        }
    }
}

impl ConfigSection for SeizureDetectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let (low, high) = self.frequency_range;
        ensure(
            0.0 < low && low < high,
            "frequency_range must satisfy 0 < low < high",
        )?;
        ensure(self.sampling_rate > 0.0, "sampling_rate must be positive")?;
        ensure(
            high <= self.sampling_rate / 2.0,
            format!(
                "frequency_range upper edge {high} Hz exceeds Nyquist ({} Hz)",
                self.sampling_rate / 2.0
            ),
        )?;
        ensure(self.magnitude_threshold > 0.0, "magnitude_threshold must be positive")?;
        ensure(self.buffer_size >= 4, "buffer_size must be at least 4")?;
        ensure(
            (1..=Limb::ALL.len()).contains(&self.affected_limbs_min),
            "affected_limbs_min must be between 1 and 4",
        )?;
        ensure(self.duration_threshold >= 0.0, "duration_threshold must be non-negative")?;
        ensure(self.cooldown_secs >= 0.0, "cooldown_secs must be non-negative")
    }
}

/// Per-window limb motion summary.
#[derive(Debug, Clone, Default, PartialEq)]
struct LimbAnalysis {
    affected: Vec<Limb>,
    /// Largest normalized magnitude among affected limbs
    magnitude: f64,
    /// Highest peak frequency among affected limbs
    dominant_frequency: f64,
    confidence: f64,
}

pub struct SeizureDetectionAgent {
    core: AgentCore,
    config: SeizureDetectionConfig,
    clock: SharedClock,
    window: RingBuffer<Pose>,
    episode_start: Option<f64>,
    last_event_time: Option<f64>,
}

impl SeizureDetectionAgent {
    pub fn new(clock: SharedClock) -> Self {
        Self::build(SeizureDetectionConfig::default(), clock)
    }

    pub fn with_config(
        config: SeizureDetectionConfig,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "{AGENT_NAME}: {} pose window, band {:?} Hz",
            config.buffer_size,
            config.frequency_range
        );
        Ok(Self::build(config, clock))
    }

    fn build(config: SeizureDetectionConfig, clock: SharedClock) -> Self {
        Self {
            core: AgentCore::new(AGENT_NAME),
            window: RingBuffer::new(config.buffer_size),
            config,
            clock,
            episode_start: None,
            last_event_time: None,
        }
    }

    pub fn config(&self) -> &SeizureDetectionConfig {
        &self.config
    }

    fn in_cooldown(&self, now: f64) -> bool {
        self.last_event_time
            .map_or(false, |last| now - last < self.config.cooldown_secs)
    }

    /// Mean limb position per frame, `None` if any sample is occluded.
    fn limb_trajectory(&self, limb: Limb) -> Option<Array2<f64>> {
        let landmarks = limb.landmarks();
        let mut positions = Array2::<f64>::zeros((self.window.len(), 2));

        for (mut row, pose) in positions.rows_mut().into_iter().zip(self.window.iter()) {
            let (mut x, mut y) = (0.0, 0.0);
            for landmark in landmarks {
                let kp = pose.keypoint(landmark);
                if kp.visibility < MIN_VISIBILITY {
                    return None;
                }
                x += kp.x as f64;
                y += kp.y as f64;
            }
            row[0] = x / landmarks.len() as f64;
            row[1] = y / landmarks.len() as f64;
        }
        Some(positions)
    }

    /// (peak frequency, normalized peak magnitude) of the limb speed in band.
    fn band_peak(&self, trajectory: &Array2<f64>) -> Option<(f64, f64)> {
        let velocity = &trajectory.slice(s![1.., ..]) - &trajectory.slice(s![..-1, ..]);
        let speed = velocity.map_axis(Axis(1), |v| v.dot(&v).sqrt()).to_vec();

        let (low, high) = self.config.frequency_range;
        let peak = Spectrum::positive(&speed, self.config.sampling_rate).band_peak(low, high)?;
        Some((peak.frequency, peak.magnitude / (speed.len() as f64 / 2.0)))
    }

    fn analyze(&self) -> LimbAnalysis {
        let mut analysis = LimbAnalysis::default();

        for limb in Limb::ALL {
            let Some(trajectory) = self.limb_trajectory(limb) else {
                log::trace!("{AGENT_NAME}: {} occluded, skipped", limb.as_str());
                continue;
            };
            let Some((frequency, magnitude)) = self.band_peak(&trajectory) else {
                continue;
            };
            if magnitude > self.config.magnitude_threshold {
                analysis.affected.push(limb);
                analysis.magnitude = analysis.magnitude.max(magnitude);
                analysis.dominant_frequency = analysis.dominant_frequency.max(frequency);
            }
        }

        let fraction = analysis.affected.len() as f64 / Limb::ALL.len() as f64;
        analysis.confidence =
            (fraction * analysis.magnitude / self.config.magnitude_threshold).min(1.0);
        analysis
    }
}

impl MonitorAgent for SeizureDetectionAgent {
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

        self.window.push(pose.clone());
        if !self.window.is_full() {
            return Ok(None);
        }

        let now = self.clock.now();
        if self.in_cooldown(now) {
            return Ok(None);
        }

        let analysis = self.analyze();
        if analysis.affected.len() < self.config.affected_limbs_min {
            if self.episode_start.take().is_some() {
                log::debug!("{AGENT_NAME}: episode ended at frame {}", snapshot.frame_id);
            }
            return Ok(None);
        }

        let start = *self.episode_start.get_or_insert(now);
        let duration = now - start;
        if duration <= self.config.duration_threshold {
            return Ok(None);
        }

        self.last_event_time = Some(now);
        let affected_limbs: Vec<String> = analysis
            .affected
            .iter()
            .map(|limb| limb.as_str().to_string())
            .collect();
        log::debug!(
            "{AGENT_NAME}: seizure for {duration:.1}s at {:.1} Hz in {affected_limbs:?}",
            analysis.dominant_frequency
        );

        let details = SeizureDetails {
            seizure_detected: true,
            motion_frequency: analysis.dominant_frequency as f32,
            affected_limbs,
            duration,
            magnitude: analysis.magnitude as f32,
        };
        Ok(Some(Event::new(
            EventKind::SeizureDetection(details),
            snapshot.timestamp,
            analysis.confidence as f32,
            AGENT_NAME,
            snapshot.frame_id,
        )))
    }

    fn reset(&mut self) {
        self.core.reset();
        self.window.clear();
        self.episode_start = None;
        self.last_event_time = None;
    }

    fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        let config = apply_overrides(&self.config, overrides)?;
        if config.buffer_size != self.config.buffer_size {
            let mut window = RingBuffer::new(config.buffer_size);
            for pose in self.window.window(config.buffer_size) {
                window.push(pose.clone());
            }
            self.window = window;
            self.episode_start = None;
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
        details.insert("episode_active".into(), self.episode_start.is_some().into());
        details
    }
}
