//! Condition registry
//!
//! Rules name their conditions by tag. Each tag resolves to a [`Condition`]
//! evaluated against the tick's event batch; new tags are added by
//! registering them, without touching the fusion loop.

use std::collections::BTreeMap;
use std::fmt;

use vigil_core::{Clock, Event, EventKind, EventType};

use super::OrchestratorConfig;
use crate::error::OrchestratorError;

/// What a condition may look at besides the events.
pub struct ConditionContext<'a> {
    pub clock: &'a dyn Clock,
    pub config: &'a OrchestratorConfig,
}

pub trait Condition: Send + Sync {
    /// Indices into `events` that satisfy the condition, or `None` if unmet.
    ///
    /// Conditions that do not depend on events (time of day) return an
    /// empty list when met.
    fn evaluate(&self, events: &[Event], ctx: &ConditionContext<'_>) -> Option<Vec<usize>>;

    /// Event type whose presence this condition tests.
    fn covers(&self) -> Option<EventType> {
        None
    }
}

/// Any event of the given type.
#[derive(Debug, Clone, Copy)]
pub struct EventPresent(pub EventType);

impl Condition for EventPresent {
    fn evaluate(&self, events: &[Event], _ctx: &ConditionContext<'_>) -> Option<Vec<usize>> {
        let matched: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.event_type() == self.0)
            .map(|(i, _)| i)
            .collect();
        (!matched.is_empty()).then_some(matched)
    }

    fn covers(&self) -> Option<EventType> {
        Some(self.0)
    }
}

/// First vital-signs reading below the configured heart-rate floor.
#[derive(Debug, Clone, Copy)]
pub struct LowHeartRate;

impl Condition for LowHeartRate {
    fn evaluate(&self, events: &[Event], ctx: &ConditionContext<'_>) -> Option<Vec<usize>> {
        events
            .iter()
            .position(|e| match &e.kind {
                EventKind::VitalSigns(v) => v.heart_rate < ctx.config.low_heart_rate_bpm,
                _ => false,
            })
            .map(|i| vec![i])
    }
}

/// Local hour inside the configured night window.
#[derive(Debug, Clone, Copy)]
pub struct Nighttime;

impl Nighttime {
    pub fn contains(hour: u32, start: u32, end: u32) -> bool {
        if start <= end {
            start <= hour && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

impl Condition for Nighttime {
    fn evaluate(&self, _events: &[Event], ctx: &ConditionContext<'_>) -> Option<Vec<usize>> {
        let hour = ctx.clock.local_hour();
        Self::contains(hour, ctx.config.night_start_hour, ctx.config.night_end_hour)
            .then(Vec::new)
    }
}

/// Adapter for closure conditions.
pub struct FnCondition<F> {
    f: F,
    covers: Option<EventType>,
}

impl<F> Condition for FnCondition<F>
where
    F: Fn(&[Event], &ConditionContext<'_>) -> Option<Vec<usize>> + Send + Sync,
{
    fn evaluate(&self, events: &[Event], ctx: &ConditionContext<'_>) -> Option<Vec<usize>> {
        (self.f)(events, ctx)
    }

    fn covers(&self) -> Option<EventType> {
        self.covers
    }
}

#[derive(Default)]
pub struct ConditionRegistry {
    conditions: BTreeMap<String, Box<dyn Condition>>,
}

impl ConditionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tags.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Box<dyn Condition>); 6] = [
            ("fall_detected", Box::new(EventPresent(EventType::FallDetection))),
            ("low_heart_rate", Box::new(LowHeartRate)),
            ("bed_exit", Box::new(EventPresent(EventType::BedExit))),
            ("nighttime", Box::new(Nighttime)),
            ("immobility_alert", Box::new(EventPresent(EventType::Immobility))),
            ("seizure", Box::new(EventPresent(EventType::SeizureDetection))),
        ];
        for (tag, condition) in builtins {
            registry.conditions.insert(tag.to_string(), condition);
        }
        registry
    }

    pub fn register(
        &mut self,
        tag: impl Into<String>,
        condition: Box<dyn Condition>,
    ) -> Result<(), OrchestratorError> {
        let tag = tag.into();
        if self.conditions.contains_key(&tag) {
            return Err(OrchestratorError::DuplicateCondition(tag));
        }
        self.conditions.insert(tag, condition);
        Ok(())
    }

    pub fn register_fn<F>(
        &mut self,
        tag: impl Into<String>,
        covers: Option<EventType>,
        f: F,
    ) -> Result<(), OrchestratorError>
    where
        F: Fn(&[Event], &ConditionContext<'_>) -> Option<Vec<usize>> + Send + Sync + 'static,
    {
        self.register(tag, Box::new(FnCondition { f, covers }))
    }

    pub fn get(&self, tag: &str) -> Option<&dyn Condition> {
        self.conditions.get(tag).map(|c| c.as_ref())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.conditions.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.conditions.keys().map(String::as_str)
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tags()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vigil_core::{
        EventKind, ImmobilityDetails, ManualClock, Posture, RiskLevel, VitalSignsDetails,
    };

    fn vitals(hr: f32) -> Event {
        Event::new(
            EventKind::VitalSigns(VitalSignsDetails {
                heart_rate: hr,
                respiratory_rate: 14.0,
                signal_quality: 0.9,
                hr_confidence: 0.8,
                rr_confidence: 0.6,
            }),
            0.0,
            0.9,
            "vital_signs",
            0,
        )
    }

    fn immobility() -> Event {
        Event::new(
            EventKind::Immobility(ImmobilityDetails {
                immobility_duration: 6000.0,
                last_movement_time: 0.0,
                risk_level: RiskLevel::Medium,
                posture: Posture::Supine,
                movement_magnitude: 0.0,
                posture_change_count: 0,
            }),
            0.0,
            0.8,
            "immobility",
            0,
        )
    }

    fn evaluate(tag: &str, events: &[Event], clock: &ManualClock) -> Option<Vec<usize>> {
        let config = OrchestratorConfig::default();
        let ctx = ConditionContext {
            clock,
            config: &config,
        };
        ConditionRegistry::with_defaults()
            .get(tag)
            .and_then(|c| c.evaluate(events, &ctx))
    }

    #[test]
    fn test_presence_matches_all_of_type() {
        let clock = ManualClock::new(0.0);
        let events = [immobility(), vitals(70.0), immobility()];
        assert_eq!(evaluate("immobility_alert", &events, &clock), Some(vec![0, 2]));
        assert_eq!(evaluate("seizure", &events, &clock), None);
    }

    #[test]
    fn test_low_heart_rate_takes_first_match() {
        let clock = ManualClock::new(0.0);
        let events = [vitals(72.0), vitals(45.0), vitals(40.0)];
        assert_eq!(evaluate("low_heart_rate", &events, &clock), Some(vec![1]));
        assert_eq!(evaluate("low_heart_rate", &[vitals(50.0)], &clock), None);
    }

    #[test]
    fn test_night_window_wraps_midnight() {
        assert!(Nighttime::contains(23, 22, 6));
        assert!(Nighttime::contains(0, 22, 6));
        assert!(Nighttime::contains(5, 22, 6));
        assert!(!Nighttime::contains(6, 22, 6));
        assert!(!Nighttime::contains(12, 22, 6));
        assert!(Nighttime::contains(3, 1, 5));
        assert!(!Nighttime::contains(5, 1, 5));

        let clock = ManualClock::new(0.0);
        clock.set_local_hour(Some(23));
        assert_eq!(evaluate("nighttime", &[], &clock), Some(vec![]));
        clock.set_local_hour(Some(14));
        assert_eq!(evaluate("nighttime", &[], &clock), None);
    }

    #[test]
    fn test_register_custom_and_duplicate() {
        let mut registry = ConditionRegistry::with_defaults();
        registry
            .register_fn("any_event", None, |events, _| {
                (!events.is_empty()).then(|| (0..events.len()).collect())
            })
            .unwrap();
        assert!(registry.contains("any_event"));

        let err = registry.register("seizure", Box::new(LowHeartRate)).unwrap_err();
        assert_eq!(err, OrchestratorError::DuplicateCondition("seizure".into()));
    }

    #[test]
    fn test_coverage() {
        let registry = ConditionRegistry::with_defaults();
        assert_eq!(
            registry.get("fall_detected").and_then(|c| c.covers()),
            Some(EventType::FallDetection)
        );
        assert_eq!(registry.get("low_heart_rate").and_then(|c| c.covers()), None);
        assert_eq!(registry.get("nighttime").and_then(|c| c.covers()), None);
    }

    proptest! {
        #[test]
        fn prop_night_window_complements_day(hour in 0u32..24, start in 0u32..24, end in 0u32..24) {
            prop_assume!(start != end);
            prop_assert_ne!(
                Nighttime::contains(hour, start, end),
                Nighttime::contains(hour, end, start)
            );
        }
    }
}
