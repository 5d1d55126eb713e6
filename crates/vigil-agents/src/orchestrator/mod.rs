//! Orchestrator - rule-based alert fusion
//!
//! Each tick the orchestrator receives every event the agents produced for
//! one frame and turns them into consolidated alerts:
//!
//! 1. **Rules**: every configured rule whose conditions all hold bundles the
//!    matching events into one alert at the rule's level.
//! 2. **Individual alerts**: events left over per the
//!    [`IndividualAlertPolicy`] get a single-event alert from a fixed
//!    level/message table.
//! 3. **Deduplication**: an alert whose message was already raised within
//!    the deduplication window is dropped. History older than twice the
//!    window is purged every tick.

pub mod conditions;
pub mod rules;

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_core::{
    apply_overrides, ensure, AlertLevel, ConfigError, ConfigMap, ConfigSection, ConsolidatedAlert,
    Event, EventType, RingBuffer, SharedClock,
};

pub use conditions::{
    Condition, ConditionContext, ConditionRegistry, EventPresent, FnCondition, LowHeartRate,
    Nighttime,
};
pub use rules::{default_rules, individual_level, individual_message, IndividualAlertPolicy, RuleConfig};

use crate::error::OrchestratorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Seconds during which an identical message is suppressed
    pub deduplication_window: f64,
    /// Heart rate (bpm) below which `low_heart_rate` holds
    pub low_heart_rate_bpm: f32,
    /// Local hour the night window opens
    pub night_start_hour: u32,
    /// Local hour the night window closes
    pub night_end_hour: u32,
    pub individual_alerts: IndividualAlertPolicy,
    /// Raw events retained for inspection
    pub event_backlog: usize,
    pub rules: Vec<RuleConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deduplication_window: 5.0,
            low_heart_rate_bpm: 50.0,
            night_start_hour: 22,
            night_end_hour: 6,
            individual_alerts: IndividualAlertPolicy::Uncovered,
            event_backlog: 1000,
            rules: default_rules(),
        }
    }
}

impl ConfigSection for OrchestratorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.deduplication_window >= 0.0,
            "deduplication_window must be non-negative",
        )?;
        ensure(
            self.night_start_hour < 24 && self.night_end_hour < 24,
            "night hours must be in 0..24",
        )?;
        ensure(self.event_backlog >= 1, "event_backlog must be at least 1")
    }
}

/// Check every rule against the registry.
pub fn check_rules(rules: &[RuleConfig], registry: &ConditionRegistry) -> Result<(), OrchestratorError> {
    for rule in rules {
        if rule.conditions.is_empty() {
            return Err(OrchestratorError::EmptyRule(rule.name.clone()));
        }
        if let Some(unknown) = rule.conditions.iter().find(|tag| !registry.contains(tag)) {
            return Err(OrchestratorError::UnknownCondition {
                rule: rule.name.clone(),
                condition: unknown.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct AlertRecord {
    message: String,
    recorded_at: f64,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: ConditionRegistry,
    clock: SharedClock,
    history: VecDeque<AlertRecord>,
    backlog: RingBuffer<Event>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("history", &self.history)
            .field("backlog_len", &self.backlog.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator over the built-in condition tags.
    pub fn new(config: OrchestratorConfig, clock: SharedClock) -> Result<Self, OrchestratorError> {
        Self::with_registry(config, ConditionRegistry::with_defaults(), clock)
    }

    pub fn with_registry(
        config: OrchestratorConfig,
        registry: ConditionRegistry,
        clock: SharedClock,
    ) -> Result<Self, OrchestratorError> {
        check_rules(&config.rules, &registry)?;
        log::debug!(
            "orchestrator: {} rules, dedup window {}s",
            config.rules.len(),
            config.deduplication_window
        );
        Ok(Self {
            backlog: RingBuffer::new(config.event_backlog),
            config,
            registry,
            clock,
            history: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    /// Fuse one tick's events into deduplicated alerts.
    pub fn process(&mut self, events: &[Event]) -> Vec<ConsolidatedAlert> {
        let now = self.clock.now();
        self.purge_history(now);
        if events.is_empty() {
            return Vec::new();
        }
        for event in events {
            self.backlog.push(event.clone());
        }

        let mut candidates = Vec::new();
        let mut consumed = vec![false; events.len()];

        for rule in &self.config.rules {
            let Some(matched) = self.evaluate_rule(rule, events) else {
                continue;
            };
            if matched.is_empty() {
                continue;
            }
            for &i in &matched {
                consumed[i] = true;
            }
            let bundle = matched.iter().map(|&i| events[i].clone()).collect();
            candidates.push(
                ConsolidatedAlert::new(rule.level, rule.message.as_str(), now, bundle)
                    .with_metadata("rule", rule.name.as_str()),
            );
        }

        let covered = self.covered_types();
        for (i, event) in events.iter().enumerate() {
            let wrap = match self.config.individual_alerts {
                IndividualAlertPolicy::Unconsumed => !consumed[i],
                IndividualAlertPolicy::Uncovered => !covered.contains(&event.event_type()),
            };
            if wrap {
                candidates.push(Self::individual_alert(event));
            }
        }

        let mut alerts = Vec::with_capacity(candidates.len());
        for alert in candidates {
            if self.is_duplicate(&alert.message, now) {
                log::trace!("orchestrator: suppressed duplicate '{}'", alert.message);
                continue;
            }
            self.history.push_back(AlertRecord {
                message: alert.message.clone(),
                recorded_at: now,
            });
            if alert.level >= AlertLevel::High {
                log::warn!("[{}] {}", alert.level, alert.message);
            } else {
                log::info!("[{}] {}", alert.level, alert.message);
            }
            alerts.push(alert);
        }
        alerts
    }

    /// Matched event indices if every condition holds.
    fn evaluate_rule(&self, rule: &RuleConfig, events: &[Event]) -> Option<Vec<usize>> {
        let ctx = ConditionContext {
            clock: self.clock.as_ref(),
            config: &self.config,
        };
        let mut matched = Vec::new();
        for tag in &rule.conditions {
            let condition = self.registry.get(tag)?;
            for i in condition.evaluate(events, &ctx)? {
                if !matched.contains(&i) {
                    matched.push(i);
                }
            }
        }
        Some(matched)
    }

    /// Event types some configured rule tests for.
    fn covered_types(&self) -> BTreeSet<EventType> {
        self.config
            .rules
            .iter()
            .flat_map(|rule| rule.conditions.iter())
            .filter_map(|tag| self.registry.get(tag).and_then(|c| c.covers()))
            .collect()
    }

    fn individual_alert(event: &Event) -> ConsolidatedAlert {
        ConsolidatedAlert::new(
            individual_level(event.event_type()),
            individual_message(event),
            event.timestamp,
            vec![event.clone()],
        )
        .with_metadata("source", event.agent_name.as_str())
    }

    fn is_duplicate(&self, message: &str, now: f64) -> bool {
        let window = self.config.deduplication_window;
        self.history
            .iter()
            .any(|r| r.message == message && now - r.recorded_at < window)
    }

    fn purge_history(&mut self, now: f64) {
        let horizon = self.config.deduplication_window * 2.0;
        self.history.retain(|r| now - r.recorded_at < horizon);
    }

    /// Messages currently held for deduplication, oldest first.
    pub fn recent_messages(&self) -> impl Iterator<Item = &str> + '_ {
        self.history.iter().map(|r| r.message.as_str())
    }

    /// Raw events received, oldest first.
    pub fn backlog(&self) -> impl Iterator<Item = &Event> + '_ {
        self.backlog.iter()
    }

    pub fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError> {
        let config = apply_overrides(&self.config, overrides)?;
        check_rules(&config.rules, &self.registry)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if config.event_backlog != self.config.event_backlog {
            let mut backlog = RingBuffer::new(config.event_backlog);
            for event in self.backlog.window(config.event_backlog) {
                backlog.push(event.clone());
            }
            self.backlog = backlog;
        }
        self.config = config;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.backlog.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use vigil_core::{
        BedExitDetails, BedState, Clock, EventKind, FallDetails, FallType, ManualClock,
        SeizureDetails, VitalSignsDetails,
    };

    fn orchestrator() -> (Orchestrator, Arc<ManualClock>) {
        let clock = ManualClock::shared(1000.0);
        clock.set_local_hour(Some(14));
        let orchestrator = Orchestrator::new(OrchestratorConfig::default(), clock.clone()).unwrap();
        (orchestrator, clock)
    }

    fn fall(ts: f64) -> Event {
        Event::new(
            EventKind::FallDetection(FallDetails {
                fall_type: FallType::Fall,
                bbox: None,
                pose_vector: Vec::new(),
                torso_angle: 70.0,
                hip_height: 0.3,
                vertical_velocity: 1.0,
            }),
            ts,
            0.8,
            "fall_detection",
            1,
        )
    }

    fn vitals(ts: f64, hr: f32) -> Event {
        Event::new(
            EventKind::VitalSigns(VitalSignsDetails {
                heart_rate: hr,
                respiratory_rate: 12.0,
                signal_quality: 0.9,
                hr_confidence: 0.8,
                rr_confidence: 0.6,
            }),
            ts,
            0.9,
            "vital_signs",
            1,
        )
    }

    fn bed_exit(ts: f64) -> Event {
        Event::new(
            EventKind::BedExit(BedExitDetails {
                state: BedState::Standing,
                previous_state: Some(BedState::SittingUp),
                transition: true,
                duration_in_state: 0.0,
                previous_state_duration: 3.0,
                bed_region: None,
                person_bbox: None,
            }),
            ts,
            0.7,
            "bed_exit",
            1,
        )
    }

    fn seizure(ts: f64) -> Event {
        Event::new(
            EventKind::SeizureDetection(SeizureDetails {
                seizure_detected: true,
                motion_frequency: 9.9,
                affected_limbs: vec!["left_arm".into(), "right_arm".into()],
                duration: 5.5,
                magnitude: 1.2,
            }),
            ts,
            1.0,
            "seizure_detection",
            1,
        )
    }

    fn rule_names(alerts: &[ConsolidatedAlert]) -> Vec<&str> {
        alerts
            .iter()
            .filter_map(|a| a.metadata.get("rule").and_then(|v| v.as_str()))
            .collect()
    }

    #[test]
    fn test_default_policy_is_uncovered() {
        assert_eq!(OrchestratorConfig::default().individual_alerts, IndividualAlertPolicy::Uncovered);
        assert_eq!(IndividualAlertPolicy::default(), IndividualAlertPolicy::Uncovered);
    }

    #[test]
    fn test_fall_alone_raises_nothing() {
        let (mut orch, _clock) = orchestrator();
        // fall is tested by critical_fall, so it waits for corroboration
        assert!(orch.process(&[fall(1000.0)]).is_empty());
        assert_eq!(orch.backlog().count(), 1);
    }

    #[test]
    fn test_fall_with_low_heart_rate_is_critical() {
        let (mut orch, _clock) = orchestrator();
        let alerts = orch.process(&[fall(1000.0), vitals(1000.0, 45.0)]);

        assert_eq!(rule_names(&alerts), vec!["critical_fall"]);
        assert_eq!(alerts.len(), 2);
        let critical = &alerts[0];
        assert_eq!(critical.level, AlertLevel::Critical);
        assert_eq!(critical.events.len(), 2);
        assert_eq!(critical.message, "Critical: Fall detected with abnormal vital signs");

        // no rule tests for vitals by type, so they are also reported alone
        let vitals_alert = &alerts[1];
        assert_eq!(vitals_alert.level, AlertLevel::Info);
        assert_eq!(vitals_alert.message, "HR: 45.0 bpm, RR: 12.0");
        assert_eq!(vitals_alert.metadata["source"], "vital_signs");
        assert_eq!(vitals_alert.timestamp, 1000.0);
    }

    #[test]
    fn test_normal_heart_rate_reports_vitals_only() {
        let (mut orch, _clock) = orchestrator();
        let alerts = orch.process(&[fall(1000.0), vitals(1000.0, 72.0)]);
        assert!(rule_names(&alerts).is_empty());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Info);
        assert_eq!(alerts[0].message, "HR: 72.0 bpm, RR: 12.0");
    }

    #[test]
    fn test_bed_exit_escalates_at_night() {
        let (mut orch, clock) = orchestrator();
        assert!(orch.process(&[bed_exit(1000.0)]).is_empty());

        clock.advance(60.0);
        clock.set_local_hour(Some(23));
        let night = orch.process(&[bed_exit(1060.0)]);
        assert_eq!(rule_names(&night), vec!["bed_exit_night"]);
        assert_eq!(night[0].level, AlertLevel::High);
        assert_eq!(night.len(), 1);
    }

    #[test]
    fn test_seizure_rule() {
        let (mut orch, _clock) = orchestrator();
        let alerts = orch.process(&[seizure(1000.0)]);
        assert_eq!(rule_names(&alerts), vec!["seizure_detected"]);
        assert_eq!(alerts[0].metadata["rule"], "seizure_detected");
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_deduplication_window() {
        let (mut orch, clock) = orchestrator();
        assert_eq!(orch.process(&[vitals(1000.0, 70.0)]).len(), 1);

        clock.advance(2.0);
        assert!(orch.process(&[vitals(1002.0, 70.0)]).is_empty());
        assert_eq!(orch.recent_messages().count(), 1);

        clock.advance(4.0);
        assert_eq!(orch.process(&[vitals(1006.0, 70.0)]).len(), 1);
        assert_eq!(orch.recent_messages().count(), 2);

        clock.advance(11.0);
        assert!(orch.process(&[]).is_empty());
        assert_eq!(orch.recent_messages().count(), 0);
    }

    #[test]
    fn test_distinct_messages_not_deduplicated() {
        let (mut orch, _clock) = orchestrator();
        let alerts = orch.process(&[vitals(1000.0, 70.0), vitals(1000.0, 71.0)]);
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_unconsumed_policy_wraps_leftover_events() {
        let clock = ManualClock::shared(0.0);
        clock.set_local_hour(Some(12));
        let config = OrchestratorConfig {
            individual_alerts: IndividualAlertPolicy::Unconsumed,
            ..Default::default()
        };
        let mut orch = Orchestrator::new(config, clock).unwrap();

        let alerts = orch.process(&[fall(0.0), vitals(0.0, 72.0)]);
        assert!(rule_names(&alerts).is_empty());
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].level, AlertLevel::High);
        assert_eq!(alerts[0].message, "Fall detected: fall");
        assert_eq!(alerts[0].metadata["source"], "fall_detection");
        assert_eq!(alerts[1].events[0].event_type(), EventType::VitalSigns);

        // bundled events are not repeated
        let alerts = orch.process(&[fall(0.0), vitals(0.0, 45.0)]);
        assert_eq!(rule_names(&alerts), vec!["critical_fall"]);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_unknown_condition_fails_fast() {
        let mut config = OrchestratorConfig::default();
        config
            .rules
            .push(RuleConfig::new("typo", &["fall_detcted"], AlertLevel::High, "x"));
        let err = Orchestrator::new(config, ManualClock::shared(0.0)).unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::UnknownCondition {
                rule: "typo".into(),
                condition: "fall_detcted".into()
            }
        );

        let mut config = OrchestratorConfig::default();
        config.rules.push(RuleConfig::new("empty", &[], AlertLevel::High, "x"));
        assert_eq!(
            Orchestrator::new(config, ManualClock::shared(0.0)).unwrap_err(),
            OrchestratorError::EmptyRule("empty".into())
        );
    }

    #[test]
    fn test_debug_lists_registered_conditions() {
        let (orch, _clock) = orchestrator();
        let rendered = format!("{orch:?}");
        assert!(rendered.starts_with("Orchestrator"));
        assert!(rendered.contains("low_heart_rate"));
    }

    #[test]
    fn test_custom_condition() {
        let mut registry = ConditionRegistry::with_defaults();
        registry
            .register_fn("very_low_heart_rate", Some(EventType::VitalSigns), |events, _| {
                events
                    .iter()
                    .position(|e| matches!(&e.kind, EventKind::VitalSigns(v) if v.heart_rate < 35.0))
                    .map(|i| vec![i])
            })
            .unwrap();
        let config = OrchestratorConfig {
            rules: vec![RuleConfig::new(
                "bradycardia",
                &["very_low_heart_rate"],
                AlertLevel::Critical,
                "Critical: Severe bradycardia",
            )],
            ..Default::default()
        };
        let mut orch = Orchestrator::with_registry(config, registry, ManualClock::shared(0.0)).unwrap();

        let alerts = orch.process(&[vitals(0.0, 30.0)]);
        assert_eq!(rule_names(&alerts), vec!["bradycardia"]);
    }

    #[test]
    fn test_backlog_and_reset() {
        let (mut orch, _clock) = orchestrator();
        orch.process(&[fall(1000.0), vitals(1000.0, 70.0)]);
        assert_eq!(orch.backlog().count(), 2);

        orch.reset();
        assert_eq!(orch.backlog().count(), 0);
        assert_eq!(orch.recent_messages().count(), 0);
        assert_eq!(orch.process(&[vitals(1000.0, 70.0)]).len(), 1);
    }

    #[test]
    fn test_update_config_rejects_unknown_condition() {
        let (mut orch, _clock) = orchestrator();
        let overrides = json!({
            "rules": [{"name": "r", "conditions": ["nope"], "level": "HIGH", "message": "m"}]
        });
        assert!(matches!(
            orch.update_config(overrides.as_object().unwrap()),
            Err(ConfigError::Validation(_))
        ));
        assert_eq!(orch.config().rules.len(), 4);

        let overrides = json!({"deduplication_window": 0.0});
        orch.update_config(overrides.as_object().unwrap()).unwrap();
        assert_eq!(orch.process(&[vitals(1000.0, 70.0)]).len(), 1);
        assert_eq!(orch.process(&[vitals(1000.0, 70.0)]).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_identical_alerts_spaced_by_window(gaps in proptest::collection::vec(0.1f64..12.0, 1..40)) {
            let (mut orch, clock) = orchestrator();
            let mut emitted = Vec::new();
            for gap in gaps {
                clock.advance(gap);
                let now = clock.now();
                if !orch.process(&[seizure(now)]).is_empty() {
                    emitted.push(now);
                }
            }
            prop_assert!(!emitted.is_empty());
            for pair in emitted.windows(2) {
                prop_assert!(pair[1] - pair[0] >= orch.config().deduplication_window - 1e-9);
            }
        }
    }
}
