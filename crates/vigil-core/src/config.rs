//! Flat configuration overrides
//!
//! Every agent and the orchestrator keep a typed config section. External
//! supervisors reconfigure them through a flat key/value map which is
//! overlaid onto the serialized section and validated before it replaces
//! the live config.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Raw reconfiguration map as received from a supervisor.
pub type ConfigMap = Map<String, Value>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown config key: {0}")]
    UnknownKey(String),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A typed, validatable config section.
pub trait ConfigSection: Serialize + DeserializeOwned + Clone {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Return `Validation(message)` unless `cond` holds.
pub fn ensure(cond: bool, message: impl Into<String>) -> Result<(), ConfigError> {
    if cond {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.into()))
    }
}

/// Overlay `overrides` onto `current` and return the validated result.
///
/// `current` is left untouched on any error, so callers can swap the
/// returned section in only on success.
pub fn apply_overrides<T: ConfigSection>(current: &T, overrides: &ConfigMap) -> Result<T, ConfigError> {
    let mut fields = match serde_json::to_value(current)? {
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::Validation(format!(
                "config section serialized to non-object: {other}"
            )))
        }
    };

    for (key, value) in overrides {
        if !fields.contains_key(key) {
            return Err(ConfigError::UnknownKey(key.clone()));
        }
        fields.insert(key.clone(), value.clone());
    }

    let updated: T = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        let key = overrides
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }
    })?;

    updated.validate()?;
    log::debug!("applied {} config override(s)", overrides.len());
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        threshold: f32,
        window: usize,
        name: String,
    }

    impl ConfigSection for Sample {
        fn validate(&self) -> Result<(), ConfigError> {
            ensure(
                (0.0..=1.0).contains(&self.threshold),
                "threshold must be in [0, 1]",
            )?;
            ensure(self.window > 0, "window must be positive")
        }
    }

    fn sample() -> Sample {
        Sample {
            threshold: 0.5,
            window: 30,
            name: "fall".into(),
        }
    }

    fn map(value: Value) -> ConfigMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_override_applies() {
        let updated = apply_overrides(&sample(), &map(json!({"threshold": 0.8, "window": 60}))).unwrap();
        assert_eq!(updated.window, 60);
        assert!((updated.threshold - 0.8).abs() < 1e-6);
        assert_eq!(updated.name, "fall");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = apply_overrides(&sample(), &map(json!({"thresold": 0.8}))).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(k) if k == "thresold"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = apply_overrides(&sample(), &map(json!({"window": "many"}))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validation_runs_after_overlay() {
        let err = apply_overrides(&sample(), &map(json!({"threshold": 3.0}))).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_overrides_are_identity() {
        assert_eq!(apply_overrides(&sample(), &ConfigMap::new()).unwrap(), sample());
    }
}
