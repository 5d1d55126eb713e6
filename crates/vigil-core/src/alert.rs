//! Consolidated alerts
//!
//! Fusion output handed to external delivery sinks. The serialized record
//! (`alert_id, level, message, timestamp, events, metadata`) and the
//! severity vocabulary are a stable wire contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::event::Event;

/// Alert severity, ordered `Info < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedAlert {
    pub alert_id: String,
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: f64,
    pub events: Vec<Event>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ConsolidatedAlert {
    /// New alert with a fresh v4 id and empty metadata.
    pub fn new(
        level: AlertLevel,
        message: impl Into<String>,
        timestamp: f64,
        events: Vec<Event>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            timestamp,
            events,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
