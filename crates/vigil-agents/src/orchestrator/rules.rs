//! Fusion rules and single-event alert templates

use serde::{Deserialize, Serialize};
use vigil_core::{AlertLevel, Event, EventKind, EventType};

/// A named conjunction of condition tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    /// Condition tags; all must hold for the rule to fire
    pub conditions: Vec<String>,
    pub level: AlertLevel,
    pub message: String,
}

impl RuleConfig {
    pub fn new(name: &str, conditions: &[&str], level: AlertLevel, message: &str) -> Self {
        Self {
            name: name.to_string(),
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            level,
            message: message.to_string(),
        }
    }
}

pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::new(
            "critical_fall",
            &["fall_detected", "low_heart_rate"],
            AlertLevel::Critical,
            "Critical: Fall detected with abnormal vital signs",
        ),
        RuleConfig::new(
            "bed_exit_night",
            &["bed_exit", "nighttime"],
            AlertLevel::High,
            "High Alert: Patient exited bed during nighttime",
        ),
        RuleConfig::new(
            "prolonged_immobility",
            &["immobility_alert"],
            AlertLevel::Medium,
            "Warning: Prolonged immobility detected",
        ),
        RuleConfig::new(
            "seizure_detected",
            &["seizure"],
            AlertLevel::Critical,
            "Critical: Seizure activity detected",
        ),
    ]
}

/// Which events also get a single-event alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndividualAlertPolicy {
    /// Every event not bundled into a fired rule this tick
    Unconsumed,
    /// Every event whose type no configured rule tests for
    #[default]
    Uncovered,
}

pub fn individual_level(event_type: EventType) -> AlertLevel {
    match event_type {
        EventType::FallDetection => AlertLevel::High,
        EventType::SeizureDetection => AlertLevel::Critical,
        EventType::BedExit | EventType::Immobility => AlertLevel::Medium,
        EventType::EmotionDetection | EventType::VitalSigns => AlertLevel::Info,
    }
}

pub fn individual_message(event: &Event) -> String {
    match &event.kind {
        EventKind::FallDetection(d) => format!("Fall detected: {}", d.fall_type),
        EventKind::SeizureDetection(_) => "Seizure activity detected".to_string(),
        EventKind::BedExit(d) => format!("Bed exit: {}", d.state),
        EventKind::Immobility(d) => format!("Immobility detected: {} risk", d.risk_level),
        EventKind::EmotionDetection(d) => format!("Emotion: {}", d.emotion),
        EventKind::VitalSigns(d) => {
            format!("HR: {:.1} bpm, RR: {:.1}", d.heart_rate, d.respiratory_rate)
        }
    }
}
