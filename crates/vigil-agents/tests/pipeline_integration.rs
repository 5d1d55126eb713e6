//! End-to-end runs of the monitoring pipeline on synthetic perception input.

use std::f64::consts::PI;

use serde_json::{json, Map, Value};
use vigil_agents::{
    AgentCore, AgentError, IndividualAlertPolicy, MonitorAgent, MonitorConfig, MonitoringPipeline,
};
use vigil_core::{
    AlertLevel, BedState, BoundingBox, ConfigError, ConfigMap, ConsolidatedAlert, Detection, Event,
    EventKind, EventType, FrameSnapshot, Keypoint, Limb, ManualClock, Pose, PoseLandmark,
    RiskLevel,
};
use vigil_signals::Frame;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FPS: f64 = 30.0;

/// Shoulders `length` px from the hips along a torso tilted `angle_deg`
/// from vertical; every other keypoint sits on the hips.
fn body(hip_height: f32, angle_deg: f32) -> Pose {
    let hip = [320.0, (1.0 - hip_height) * HEIGHT as f32];
    let rad = angle_deg.to_radians();
    let shoulder = [hip[0] + 100.0 * rad.sin(), hip[1] - 100.0 * rad.cos()];
    Pose::from_fn(|lm| match lm {
        PoseLandmark::LeftShoulder | PoseLandmark::RightShoulder => {
            Keypoint::new(shoulder[0], shoulder[1])
        }
        _ => Keypoint::new(hip[0], hip[1]),
    })
}

/// 5 Hz horizontal tremor of both arms.
fn convulsing(i: u64) -> Pose {
    let offset = 5.0 * (2.0 * PI * 5.0 * i as f64 / FPS).sin();
    let mut pose = Pose::from_fn(|lm| Keypoint::new(100.0 + 10.0 * lm.index() as f32, 240.0));
    for limb in [Limb::LeftArm, Limb::RightArm] {
        for lm in limb.landmarks() {
            pose.keypoint_mut(lm).x += offset as f32;
        }
    }
    pose
}

fn snapshot(i: u64, timestamp: f64, person: BoundingBox, pose: Pose) -> FrameSnapshot {
    FrameSnapshot::new(i, timestamp, WIDTH, HEIGHT, FPS as f32)
        .with_detection(Detection::new(7, person).with_pose(pose))
}

/// Feed `frames` at 30 fps, clock tracking the frame timestamps.
fn run(
    pipeline: &mut MonitoringPipeline,
    clock: &ManualClock,
    frames: std::ops::Range<u64>,
    person: BoundingBox,
    pose_at: impl Fn(u64) -> Pose,
) -> Vec<(u64, ConsolidatedAlert)> {
    let mut alerts = Vec::new();
    for i in frames {
        let ts = i as f64 / FPS;
        clock.set(ts);
        let outcome = pipeline.process_frame(&snapshot(i, ts, person, pose_at(i)), None);
        alerts.extend(outcome.alerts.into_iter().map(|a| (i, a)));
    }
    alerts
}

fn night_config() -> MonitorConfig {
    MonitorConfig::from_toml_str(
        r#"
        [bed_exit]
        bed_region = { x1 = 50.0, y1 = 150.0, x2 = 590.0, y2 = 450.0 }
        "#,
    )
    .unwrap()
}

fn in_bed_then_standing(i: u64) -> Pose {
    if i < 60 {
        body(0.2, 50.0)
    } else {
        body(0.7, 0.0)
    }
}

#[test]
fn nighttime_bed_exit_raises_high_alert() {
    let clock = ManualClock::shared(0.0);
    clock.set_local_hour(Some(23));
    let mut pipeline = MonitoringPipeline::from_config(&night_config(), clock.clone()).unwrap();

    let person = BoundingBox::new(100.0, 200.0, 540.0, 420.0);
    let alerts = run(&mut pipeline, &clock, 0..90, person, in_bed_then_standing);

    assert_eq!(alerts.len(), 1, "{alerts:?}");
    let (frame, alert) = &alerts[0];
    assert_eq!(*frame, 60);
    assert_eq!(alert.level, AlertLevel::High);
    assert_eq!(alert.message, "High Alert: Patient exited bed during nighttime");
    assert_eq!(alert.metadata["rule"], "bed_exit_night");

    let wire: Value = serde_json::from_str(&alert.to_json().unwrap()).unwrap();
    assert_eq!(wire["level"], "HIGH");
    assert_eq!(wire["events"][0]["event_type"], "bed_exit");
    assert_eq!(wire["events"][0]["agent_name"], "bed_exit");
    assert_eq!(wire["events"][0]["state"], "STANDING");
    assert_eq!(wire["events"][0]["previous_state"], "IN_BED");
    assert_eq!(wire["events"][0]["frame_id"], 60);
}

#[test]
fn daytime_bed_exit_raises_no_alert() {
    let clock = ManualClock::shared(0.0);
    clock.set_local_hour(Some(14));
    let mut pipeline = MonitoringPipeline::from_config(&night_config(), clock.clone()).unwrap();

    let person = BoundingBox::new(100.0, 200.0, 540.0, 420.0);
    let alerts = run(&mut pipeline, &clock, 0..90, person, in_bed_then_standing);
    assert!(alerts.is_empty(), "{alerts:?}");

    let statuses = pipeline.statuses();
    let bed = statuses.iter().find(|s| s.agent_name == "bed_exit").unwrap();
    assert_eq!(bed.details["current_state"], "STANDING");
}

#[test]
fn daytime_bed_exit_alerts_when_leftovers_are_reported() {
    let clock = ManualClock::shared(0.0);
    clock.set_local_hour(Some(14));
    let mut config = night_config();
    config.orchestrator.individual_alerts = IndividualAlertPolicy::Unconsumed;
    let mut pipeline = MonitoringPipeline::from_config(&config, clock.clone()).unwrap();

    let person = BoundingBox::new(100.0, 200.0, 540.0, 420.0);
    let alerts = run(&mut pipeline, &clock, 0..90, person, in_bed_then_standing);

    assert_eq!(alerts.len(), 1);
    let (_, alert) = &alerts[0];
    assert_eq!(alert.level, AlertLevel::Medium);
    assert_eq!(alert.message, "Bed exit: STANDING");
    assert_eq!(alert.metadata["source"], "bed_exit");
}

/// Panics on every frame.
struct Faulty {
    core: AgentCore,
}

impl MonitorAgent for Faulty {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn detect(&mut self, _snapshot: &FrameSnapshot, _image: Option<&Frame>) -> Result<Option<Event>, AgentError> {
        panic!("model weights missing")
    }

    fn reset(&mut self) {
        self.core.reset();
    }

    fn update_config(&mut self, _overrides: &ConfigMap) -> Result<(), ConfigError> {
        Ok(())
    }

    fn config_value(&self) -> Value {
        Value::Null
    }
}

#[test]
fn seizure_alert_survives_a_panicking_agent() {
    let clock = ManualClock::shared(0.0);
    clock.set_local_hour(Some(10));
    let mut pipeline = MonitoringPipeline::from_config(&MonitorConfig::default(), clock.clone()).unwrap();
    pipeline.add_agent(Box::new(Faulty {
        core: AgentCore::new("faulty"),
    }));

    let person = BoundingBox::new(200.0, 100.0, 440.0, 460.0);
    let alerts = run(&mut pipeline, &clock, 0..400, person, convulsing);

    assert_eq!(alerts.len(), 1, "{alerts:?}");
    let (frame, alert) = &alerts[0];
    assert!((299..=301).contains(frame), "alert at frame {frame}");
    assert_eq!(alert.level, AlertLevel::Critical);
    assert_eq!(alert.message, "Critical: Seizure activity detected");
    assert_eq!(alert.events.len(), 1);
    let EventKind::SeizureDetection(details) = &alert.events[0].kind else {
        panic!("expected a seizure event");
    };
    assert!(details.seizure_detected);
    assert_eq!(details.affected_limbs, vec!["left_arm", "right_arm"]);

    assert_eq!(pipeline.failure_count("faulty"), 400);
    assert_eq!(pipeline.frames_processed(), 400);
    assert_eq!(pipeline.agent("seizure_detection").unwrap().status().frame_count, 400);
}

#[test]
fn prolonged_stillness_escalates() {
    let clock = ManualClock::shared(0.0);
    let mut pipeline = MonitoringPipeline::from_config(&MonitorConfig::default(), clock.clone()).unwrap();
    let person = BoundingBox::new(200.0, 100.0, 440.0, 460.0);

    // one frame a minute
    let mut escalations = Vec::new();
    for i in 1..=125u64 {
        let now = i as f64 * 60.0;
        clock.set(now);
        let outcome = pipeline.process_frame(&snapshot(i, now, person, body(0.5, 0.0)), None);
        for alert in outcome.alerts {
            if alert.message == "Warning: Prolonged immobility detected" {
                let EventKind::Immobility(details) = &alert.events[0].kind else {
                    panic!("expected an immobility event");
                };
                escalations.push((i, details.risk_level));
            }
        }
    }

    // warning after 5400 s, alert after 7200 s
    let first = escalations.first().copied().unwrap();
    assert_eq!(first.0, 91);
    assert_eq!(first.1, RiskLevel::Medium);
    let high = escalations.iter().find(|(_, r)| *r == RiskLevel::High).copied().unwrap();
    assert_eq!(high.0, 121);
}

#[test]
fn reconfigured_agent_takes_effect() {
    let clock = ManualClock::shared(0.0);
    clock.set_local_hour(Some(12));
    let mut pipeline = MonitoringPipeline::from_config(&night_config(), clock.clone()).unwrap();

    let overrides: Map<String, Value> = json!({"alert_on_states": ["SITTING_UP"]})
        .as_object()
        .cloned()
        .unwrap();
    pipeline.agent_mut("bed_exit").unwrap().update_config(&overrides).unwrap();

    let bad: ConfigMap = json!({"no_such_key": 1}).as_object().cloned().unwrap();
    assert!(matches!(
        pipeline.agent_mut("fall_detection").unwrap().update_config(&bad),
        Err(ConfigError::UnknownKey(_))
    ));

    let person = BoundingBox::new(100.0, 200.0, 540.0, 420.0);
    // lying, then sitting up with the hips raised
    let mut bed_events = Vec::new();
    for i in 0..60u64 {
        let ts = i as f64 / FPS;
        clock.set(ts);
        let pose = if i < 30 { body(0.2, 50.0) } else { body(0.4, 55.0) };
        let outcome = pipeline.process_frame(&snapshot(i, ts, person, pose), None);
        assert!(outcome.alerts.is_empty());
        bed_events.extend(outcome.events.into_iter().filter(|e| e.event_type() == EventType::BedExit));
    }
    assert_eq!(bed_events.len(), 1);
    let EventKind::BedExit(details) = &bed_events[0].kind else {
        panic!("expected a bed exit event");
    };
    assert_eq!(details.state, BedState::SittingUp);

    let statuses = pipeline.statuses();
    let bed = statuses.iter().find(|s| s.agent_name == "bed_exit").unwrap();
    assert_eq!(bed.config["alert_on_states"], json!(["SITTING_UP"]));
    assert_eq!(bed.details["current_state"], "SITTING_UP");
}
