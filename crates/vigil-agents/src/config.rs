//! Monitoring configuration
//!
//! One TOML document carries a table per agent plus the orchestrator:
//!
//! ```toml
//! [fall_detection]
//! confidence_threshold = 0.75
//!
//! [bed_exit]
//! alert_on_states = ["STANDING", "OUT_OF_BED"]
//!
//! [orchestrator]
//! deduplication_window = 10.0
//! ```
//!
//! Missing tables and keys fall back to their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vigil_core::{ConfigError, ConfigSection};

use crate::bed_exit::BedExitConfig;
use crate::emotion::EmotionConfig;
use crate::fall::FallDetectionConfig;
use crate::immobility::ImmobilityConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::seizure::SeizureDetectionConfig;
use crate::vital_signs::VitalSignsConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub fall_detection: FallDetectionConfig,
    pub seizure_detection: SeizureDetectionConfig,
    pub vital_signs: VitalSignsConfig,
    pub bed_exit: BedExitConfig,
    pub immobility: ImmobilityConfig,
    pub emotion_detection: EmotionConfig,
    pub orchestrator: OrchestratorConfig,
}

impl MonitorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate every section, prefixing failures with the section name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        section("fall_detection", &self.fall_detection)?;
        section("seizure_detection", &self.seizure_detection)?;
        section("vital_signs", &self.vital_signs)?;
        section("bed_exit", &self.bed_exit)?;
        section("immobility", &self.immobility)?;
        section("emotion_detection", &self.emotion_detection)?;
        section("orchestrator", &self.orchestrator)
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn section<T: ConfigSection>(name: &str, config: &T) -> Result<(), ConfigError> {
    config.validate().map_err(|e| match e {
        ConfigError::Validation(msg) => ConfigError::Validation(format!("{name}.{msg}")),
        other => other,
    })
}
