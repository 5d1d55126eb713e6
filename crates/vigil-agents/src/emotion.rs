//! Emotion Detection Agent
//!
//! Throttled classification of the face crop through a pluggable
//! [`EmotionClassifier`]. The default [`BrightnessClassifier`] is a
//! placeholder banding on mean luma; deployments bind a real model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::{
    apply_overrides, ensure, ConfigError, ConfigMap, ConfigSection, Emotion, EmotionDetails, Event,
    EventKind, FrameSnapshot,
};
use vigil_signals::Frame;

use crate::agent::{crop_region, AgentCore, MonitorAgent};
use crate::error::AgentError;

pub const AGENT_NAME: &str = "emotion_detection";

/// Classifier output for one face crop.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionEstimate {
    pub emotion: Emotion,
    pub confidence: f32,
    pub valence: f32,
    pub arousal: f32,
    pub probabilities: BTreeMap<Emotion, f32>,
}

pub trait EmotionClassifier: Send {
    /// Classify a face crop over `labels`. `None` if the crop is unusable.
    fn classify(&self, face: &Frame, labels: &[Emotion]) -> Option<EmotionEstimate>;
}

/// Mean-luma banding. Not a real affect model.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrightnessClassifier;

impl EmotionClassifier for BrightnessClassifier {
    fn classify(&self, face: &Frame, labels: &[Emotion]) -> Option<EmotionEstimate> {
        let brightness = face.brightness()?;
        let (emotion, valence, arousal) = if brightness > 150.0 {
            (Emotion::Happy, 0.8, 0.6)
        } else if brightness > 120.0 {
            (Emotion::Neutral, 0.0, 0.0)
        } else if brightness > 90.0 {
            (Emotion::Sad, -0.6, -0.4)
        } else {
            (Emotion::Angry, -0.7, 0.7)
        };

        let probabilities = labels
            .iter()
            .map(|&label| (label, if label == emotion { 0.7 } else { 0.1 }))
            .collect();
        Some(EmotionEstimate {
            emotion,
            confidence: 0.7,
            valence,
            arousal,
            probabilities,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Label vocabulary reported in the probability distribution
    pub emotions: Vec<Emotion>,
    pub confidence_threshold: f32,
    /// Frames between classifications
    pub update_interval: u64,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            emotions: Emotion::ALL.to_vec(),
            confidence_threshold: 0.4,
            update_interval: 5,
        }
    }
}

impl ConfigSection for EmotionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(!self.emotions.is_empty(), "emotions must not be empty")?;
        ensure(
            (0.0..=1.0).contains(&self.confidence_threshold),
            "confidence_threshold must be in [0, 1]",
        )?;
        ensure(self.update_interval >= 1, "update_interval must be at least 1")
    }
}

pub struct EmotionDetectionAgent {
    core: AgentCore,
    config: EmotionConfig,
    classifier: Box<dyn EmotionClassifier>,
    last_update_frame: u64,
    last_emotion: Option<Emotion>,
}

impl EmotionDetectionAgent {
    pub fn new() -> Self {
        Self::build(EmotionConfig::default(), Box::new(BrightnessClassifier))
    }

    pub fn with_config(config: EmotionConfig) -> Result<Self, ConfigError> {
        Self::with_classifier(config, Box::new(BrightnessClassifier))
    }

    pub fn with_classifier(
        config: EmotionConfig,
        classifier: Box<dyn EmotionClassifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            "{AGENT_NAME}: {} labels, every {} frames",
            config.emotions.len(),
            config.update_interval
        );
        Ok(Self::build(config, classifier))
    }

    fn build(config: EmotionConfig, classifier: Box<dyn EmotionClassifier>) -> Self {
        Self {
            core: AgentCore::new(AGENT_NAME),
            config,
            classifier,
            last_update_frame: 0,
            last_emotion: None,
        }
    }

    pub fn config(&self) -> &EmotionConfig {
        &self.config
    }

    pub fn last_emotion(&self) -> Option<Emotion> {
        self.last_emotion
    }
}

impl Default for EmotionDetectionAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorAgent for EmotionDetectionAgent {
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
        if self.core.frame_count() - self.last_update_frame < self.config.update_interval {
            return Ok(None);
        }
        let (Some(face), Some(image)) = (snapshot.primary().and_then(|d| d.face_bbox), image) else {
            return Ok(None);
        };
        let Some(crop) = crop_region(image, &face) else {
            return Ok(None);
        };
        let Some(estimate) = self.classifier.classify(&crop, &self.config.emotions) else {
            return Ok(None);
        };
        if estimate.confidence <= self.config.confidence_threshold {
            return Ok(None);
        }

        self.last_update_frame = self.core.frame_count();
        self.last_emotion = Some(estimate.emotion);
        log::debug!("{AGENT_NAME}: {} ({:.2})", estimate.emotion, estimate.confidence);

        let details = EmotionDetails {
            emotion: estimate.emotion,
            valence: estimate.valence,
            arousal: estimate.arousal,
            face_bbox: Some(face),
            emotion_probabilities: estimate.probabilities,
        };
        Ok(Some(Event::new(
            EventKind::EmotionDetection(details),
            snapshot.timestamp,
            estimate.confidence,
            AGENT_NAME,
            snapshot.frame_id,
        )))
    }

    fn reset(&mut self) {
        self.core.reset();
        self.last_update_frame = 0;
        self.last_emotion = None;
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
        if let Some(emotion) = self.last_emotion {
            details.insert("last_emotion".into(), emotion.as_str().into());
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;
    use vigil_core::{BoundingBox, Detection};

    fn face_snapshot(i: u64) -> FrameSnapshot {
        let detection = Detection::new(1, BoundingBox::new(0.0, 0.0, 32.0, 32.0))
            .with_face(BoundingBox::new(8.0, 8.0, 24.0, 24.0));
        FrameSnapshot::new(i, i as f64 / 30.0, 32, 32, 30.0).with_detection(detection)
    }

    fn feed(agent: &mut EmotionDetectionAgent, range: std::ops::Range<u64>, image: &Frame) -> Vec<u64> {
        range
            .filter(|&i| agent.detect(&face_snapshot(i), Some(image)).unwrap().is_some())
            .collect()
    }

    #[test]
    fn test_brightness_bands() {
        let labels = Emotion::ALL;
        let classify = |v: u8| {
            BrightnessClassifier
                .classify(&Frame::filled(4, 4, [v, v, v]), &labels)
                .unwrap()
        };
        assert_eq!(classify(200).emotion, Emotion::Happy);
        assert_eq!(classify(130).emotion, Emotion::Neutral);
        assert_eq!(classify(100).emotion, Emotion::Sad);
        assert_eq!(classify(20).emotion, Emotion::Angry);

        let estimate = classify(200);
        assert_eq!(estimate.probabilities.len(), 7);
        assert_relative_eq!(estimate.probabilities.values().sum::<f32>(), 1.3, epsilon = 1e-5);
        assert_relative_eq!(estimate.probabilities[&Emotion::Happy], 0.7);
    }

    #[test]
    fn test_throttled_by_update_interval() {
        let mut agent = EmotionDetectionAgent::new();
        let bright = Frame::filled(32, 32, [200, 200, 200]);
        // frame counts 5, 10, 15 pass the throttle
        assert_eq!(feed(&mut agent, 0..15, &bright), vec![4, 9, 14]);
        assert_eq!(agent.last_emotion(), Some(Emotion::Happy));
    }

    #[test]
    fn test_event_payload() {
        let mut agent = EmotionDetectionAgent::new();
        let image = Frame::filled(32, 32, [100, 100, 100]);
        let event = (0..5)
            .find_map(|i| agent.detect(&face_snapshot(i), Some(&image)).unwrap())
            .unwrap();
        let EventKind::EmotionDetection(details) = &event.kind else {
            panic!("expected an emotion event");
        };
        assert_eq!(details.emotion, Emotion::Sad);
        assert_eq!(details.face_bbox, Some(BoundingBox::new(8.0, 8.0, 24.0, 24.0)));
        assert_relative_eq!(event.confidence, 0.7);
    }

    #[test]
    fn test_threshold_above_placeholder_confidence() {
        let mut agent = EmotionDetectionAgent::new();
        let overrides = json!({"confidence_threshold": 0.8});
        agent.update_config(overrides.as_object().unwrap()).unwrap();
        let image = Frame::filled(32, 32, [200, 200, 200]);
        assert!(feed(&mut agent, 0..30, &image).is_empty());
    }

    struct Fixed(Emotion);

    impl EmotionClassifier for Fixed {
        fn classify(&self, _face: &Frame, labels: &[Emotion]) -> Option<EmotionEstimate> {
            Some(EmotionEstimate {
                emotion: self.0,
                confidence: 0.95,
                valence: 0.0,
                arousal: 0.9,
                probabilities: labels.iter().map(|&l| (l, if l == self.0 { 0.95 } else { 0.0 })).collect(),
            })
        }
    }

    #[test]
    fn test_custom_classifier() {
        let config = EmotionConfig {
            update_interval: 1,
            ..Default::default()
        };
        let mut agent = EmotionDetectionAgent::with_classifier(config, Box::new(Fixed(Emotion::Surprise))).unwrap();
        let image = Frame::filled(32, 32, [0, 0, 0]);
        assert_eq!(feed(&mut agent, 0..3, &image), vec![0, 1, 2]);
        assert_eq!(agent.last_emotion(), Some(Emotion::Surprise));
    }

    #[test]
    fn test_no_face_no_event() {
        let mut agent = EmotionDetectionAgent::new();
        let image = Frame::filled(32, 32, [200, 200, 200]);
        for i in 0..10 {
            let bare = FrameSnapshot::new(i, i as f64, 32, 32, 30.0);
            assert!(agent.detect(&bare, Some(&image)).unwrap().is_none());
        }
    }
}
