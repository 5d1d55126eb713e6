//! Monitoring pipeline
//!
//! Runs every agent on a frame in registration order, then hands the
//! collected events to the orchestrator. An agent that errors or panics is
//! logged and counted; its contribution for that frame is simply absent.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use vigil_core::{
    ConsolidatedAlert, Event, EventKind, FrameSnapshot, SharedClock, VitalSignsDetails,
};
use vigil_signals::Frame;

use crate::agent::{AgentStatus, MonitorAgent};
use crate::bed_exit::BedExitAgent;
use crate::config::MonitorConfig;
use crate::emotion::EmotionDetectionAgent;
use crate::error::PipelineError;
use crate::fall::FallDetectionAgent;
use crate::immobility::ImmobilityAgent;
use crate::orchestrator::Orchestrator;
use crate::seizure::SeizureDetectionAgent;
use crate::vital_signs::VitalSignsAgent;

/// Everything one frame produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    /// Raw events in agent order
    pub events: Vec<Event>,
    pub alerts: Vec<ConsolidatedAlert>,
}

pub struct MonitoringPipeline {
    agents: Vec<Box<dyn MonitorAgent>>,
    orchestrator: Orchestrator,
    failures: HashMap<String, u64>,
    latest_vitals: Option<VitalSignsDetails>,
    frames_processed: u64,
}

impl fmt::Debug for MonitoringPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringPipeline")
            .field("agents", &self.agents.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("orchestrator", &self.orchestrator)
            .field("failures", &self.failures)
            .field("frames_processed", &self.frames_processed)
            .finish_non_exhaustive()
    }
}

impl MonitoringPipeline {
    /// Pipeline with no agents around an existing orchestrator.
    pub fn with_orchestrator(orchestrator: Orchestrator) -> Self {
        Self {
            agents: Vec::new(),
            orchestrator,
            failures: HashMap::new(),
            latest_vitals: None,
            frames_processed: 0,
        }
    }

    /// The full agent set, built and validated from `config`.
    pub fn from_config(config: &MonitorConfig, clock: SharedClock) -> Result<Self, PipelineError> {
        config.validate()?;
        let orchestrator = Orchestrator::new(config.orchestrator.clone(), clock.clone())?;
        let mut pipeline = Self::with_orchestrator(orchestrator);

        pipeline.add_agent(Box::new(FallDetectionAgent::with_config(
            config.fall_detection.clone(),
            clock.clone(),
        )?));
        pipeline.add_agent(Box::new(SeizureDetectionAgent::with_config(
            config.seizure_detection.clone(),
            clock.clone(),
        )?));
        pipeline.add_agent(Box::new(VitalSignsAgent::with_config(
            config.vital_signs.clone(),
        )?));
        pipeline.add_agent(Box::new(BedExitAgent::with_config(
            config.bed_exit.clone(),
            clock.clone(),
        )?));
        pipeline.add_agent(Box::new(ImmobilityAgent::with_config(
            config.immobility.clone(),
            clock,
        )?));
        pipeline.add_agent(Box::new(EmotionDetectionAgent::with_config(
            config.emotion_detection.clone(),
        )?));

        log::info!("monitoring pipeline ready with {} agents", pipeline.agents.len());
        Ok(pipeline)
    }

    pub fn add_agent(&mut self, agent: Box<dyn MonitorAgent>) {
        if self.agent(agent.name()).is_some() {
            log::warn!("pipeline already has an agent named '{}'", agent.name());
        }
        log::debug!("pipeline: added agent {}", agent.name());
        self.agents.push(agent);
    }

    /// Run all agents on one frame and fuse their events.
    pub fn process_frame(&mut self, snapshot: &FrameSnapshot, image: Option<&Frame>) -> FrameOutcome {
        let mut events = Vec::new();

        for agent in self.agents.iter_mut() {
            let result = catch_unwind(AssertUnwindSafe(|| agent.detect(snapshot, image)));
            match result {
                Ok(Ok(Some(event))) => {
                    if let EventKind::VitalSigns(vitals) = &event.kind {
                        self.latest_vitals = Some(vitals.clone());
                    }
                    events.push(event);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    log::error!("{}: frame {} failed: {e}", agent.name(), snapshot.frame_id);
                    *self.failures.entry(agent.name().to_string()).or_default() += 1;
                }
                Err(payload) => {
                    log::error!(
                        "{}: panicked on frame {}: {}. Resetting agent",
                        agent.name(),
                        snapshot.frame_id,
                        panic_message(payload.as_ref())
                    );
                    *self.failures.entry(agent.name().to_string()).or_default() += 1;
                    agent.reset();
                }
            }
        }

        self.frames_processed += 1;
        let alerts = self.orchestrator.process(&events);
        FrameOutcome { events, alerts }
    }

    pub fn agents(&self) -> impl Iterator<Item = &dyn MonitorAgent> + '_ {
        self.agents.iter().map(|a| a.as_ref())
    }

    pub fn agent(&self, name: &str) -> Option<&dyn MonitorAgent> {
        self.agents().find(|a| a.name() == name)
    }

    pub fn agent_mut(&mut self, name: &str) -> Option<&mut dyn MonitorAgent> {
        self.agents
            .iter_mut()
            .find(|a| a.name() == name)
            .map(|a| a.as_mut() as &mut dyn MonitorAgent)
    }

    pub fn statuses(&self) -> Vec<AgentStatus> {
        self.agents().map(|a| a.status()).collect()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    /// Failed or panicked `detect` calls for the named agent.
    pub fn failure_count(&self, name: &str) -> u64 {
        self.failures.get(name).copied().unwrap_or(0)
    }

    /// Most recent vital-signs reading, kept for display.
    pub fn latest_vitals(&self) -> Option<&VitalSignsDetails> {
        self.latest_vitals.as_ref()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Reset every agent and the orchestrator.
    pub fn reset(&mut self) {
        for agent in self.agents.iter_mut() {
            agent.reset();
        }
        self.orchestrator.reset();
        self.failures.clear();
        self.latest_vitals = None;
        self.frames_processed = 0;
        log::debug!("monitoring pipeline reset");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
