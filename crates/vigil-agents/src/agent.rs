//! Shared agent contract
//!
//! Every detector implements [`MonitorAgent`]. The bookkeeping common to all
//! of them (enable flag, frame counter, timestamp ordering) lives in
//! [`AgentCore`], which each agent embeds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::{BoundingBox, ConfigError, ConfigMap, Event, FrameSnapshot};
use vigil_signals::Frame;

use crate::error::AgentError;

/// Snapshot of an agent for supervisors and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_name: String,
    pub enabled: bool,
    pub frame_count: u64,
    pub config: Value,
    /// Agent-specific progress such as calibration state
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// A stateful single-subject detector fed one frame at a time.
pub trait MonitorAgent: Send {
    fn core(&self) -> &AgentCore;
    fn core_mut(&mut self) -> &mut AgentCore;

    /// Analyse one frame. `image` is the full RGB frame when available.
    ///
    /// Missing input and insufficient history yield `Ok(None)`; errors are
    /// reserved for contract violations such as out-of-order frames.
    fn detect(
        &mut self,
        snapshot: &FrameSnapshot,
        image: Option<&Frame>,
    ) -> Result<Option<Event>, AgentError>;

    /// Clear all temporal state.
    fn reset(&mut self);

    /// Overlay a flat override map onto the agent's config.
    fn update_config(&mut self, overrides: &ConfigMap) -> Result<(), ConfigError>;

    /// Current config as JSON.
    fn config_value(&self) -> Value;

    fn status_details(&self) -> Map<String, Value> {
        Map::new()
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn enable(&mut self) {
        self.core_mut().enabled = true;
    }

    fn disable(&mut self) {
        self.core_mut().enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.core().enabled
    }

    fn status(&self) -> AgentStatus {
        let core = self.core();
        AgentStatus {
            agent_name: core.name().to_string(),
            enabled: core.enabled,
            frame_count: core.frame_count,
            config: self.config_value(),
            details: self.status_details(),
        }
    }
}

/// Face region of `image`, clamped to the frame; `None` when degenerate.
pub(crate) fn crop_region(image: &Frame, region: &BoundingBox) -> Option<Frame> {
    image
        .crop(region.x1, region.y1, region.x2, region.y2)
        .map_err(|e| log::trace!("skipping crop {region:?}: {e}"))
        .ok()
}

/// Per-agent bookkeeping.
#[derive(Debug, Clone)]
pub struct AgentCore {
    name: String,
    enabled: bool,
    frame_count: u64,
    last_timestamp: Option<f64>,
}

impl AgentCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            frame_count: 0,
            last_timestamp: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Gate a frame into the agent.
    ///
    /// Returns `Ok(false)` for a disabled agent without touching any state.
    /// Frames must carry strictly increasing timestamps.
    pub fn admit(&mut self, snapshot: &FrameSnapshot) -> Result<bool, AgentError> {
        if !self.enabled {
            return Ok(false);
        }
        if let Some(last) = self.last_timestamp {
            if snapshot.timestamp <= last {
                return Err(AgentError::NonMonotonicFrame {
                    agent: self.name.clone(),
                    last,
                    now: snapshot.timestamp,
                });
            }
        }
        self.last_timestamp = Some(snapshot.timestamp);
        self.frame_count += 1;
        Ok(true)
    }

    pub fn reset(&mut self) {
        self.frame_count = 0;
        self.last_timestamp = None;
    }
}
