use thiserror::Error;
use vigil_core::ConfigError;
use vigil_signals::SignalError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{agent}: frame at {now}s does not follow frame at {last}s")]
    NonMonotonicFrame { agent: String, last: f64, now: f64 },
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Rule '{rule}' references unknown condition '{condition}'")]
    UnknownCondition { rule: String, condition: String },
    #[error("Rule '{0}' has no conditions")]
    EmptyRule(String),
    #[error("Condition '{0}' is already registered")]
    DuplicateCondition(String),
}

/// Construction failures of a full monitoring pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
