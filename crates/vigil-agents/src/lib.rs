//! # vigil-agents
//!
//! Event-detection agents and rule-based alert fusion for the Vigil patient
//! monitoring engine.
//!
//! This crate provides:
//! - **Agents**: fall, seizure, vital signs (rPPG), bed exit, immobility and
//!   emotion detectors behind the [`MonitorAgent`] trait
//! - **Orchestrator**: rule-based fusion of per-frame events into
//!   [`ConsolidatedAlert`](vigil_core::ConsolidatedAlert)s with deduplication
//! - **Pipeline**: [`MonitoringPipeline`] runs the agents on each frame and
//!   isolates their failures
//! - **Configuration**: [`MonitorConfig`] loaded from TOML
//!
//! ## Example
//!
//! ```
//! use vigil_agents::{MonitorConfig, MonitoringPipeline};
//! use vigil_core::{FrameSnapshot, ManualClock};
//!
//! let clock = ManualClock::shared(0.0);
//! let mut pipeline = MonitoringPipeline::from_config(&MonitorConfig::default(), clock).unwrap();
//!
//! let snapshot = FrameSnapshot::new(0, 0.0, 640, 480, 30.0);
//! let outcome = pipeline.process_frame(&snapshot, None);
//! assert!(outcome.alerts.is_empty());
//! ```

pub mod agent;
pub mod bed_exit;
pub mod config;
pub mod emotion;
pub mod error;
pub mod fall;
pub mod immobility;
pub mod orchestrator;
pub mod pipeline;
pub mod seizure;
pub mod vital_signs;

#[cfg(test)]
mod testing;

pub use agent::{AgentCore, AgentStatus, MonitorAgent};
pub use bed_exit::{BedExitAgent, BedExitConfig};
pub use config::MonitorConfig;
pub use emotion::{
    BrightnessClassifier, EmotionClassifier, EmotionConfig, EmotionDetectionAgent, EmotionEstimate,
};
pub use error::{AgentError, OrchestratorError, PipelineError};
pub use fall::{FallDetectionAgent, FallDetectionConfig};
pub use immobility::{ImmobilityAgent, ImmobilityConfig};
pub use orchestrator::{
    Condition, ConditionContext, ConditionRegistry, IndividualAlertPolicy, Orchestrator,
    OrchestratorConfig, RuleConfig,
};
pub use pipeline::{FrameOutcome, MonitoringPipeline};
pub use seizure::{SeizureDetectionAgent, SeizureDetectionConfig};
pub use vital_signs::{VitalSignsAgent, VitalSignsConfig};
