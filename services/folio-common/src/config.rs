//! Configuration management for Folio services.
//!
//! Configuration lives in `~/.folio/` (or `$FOLIO_CONFIG_DIR`). Every file is
//! optional and may be partial: its values are deep-merged over the built-in
//! defaults, so a file only needs the keys it changes.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (FOLIO_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FOLIO_CONFIG_DIR` → configuration directory
//! - `FOLIO_LOG_LEVEL` → observability.log_level
//! - `FOLIO_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::validation::{Validate, ValidationError, ValidationResult};

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "FOLIO_CONFIG_DIR";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".folio"),
        |dirs| dirs.home_dir().join(".folio"),
    )
}

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
pub fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
/// Arrays are replaced wholesale.
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                // Keys like "$schema" or "_comment" are annotations, not settings.
                if key.starts_with('$') || key.starts_with('_') {
                    continue;
                }
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load `file_name` from `dir` layered over `T::default()`.
///
/// A missing file yields the defaults. A present file is deep-merged over
/// the serialized defaults before deserializing, so partial files are valid.
pub fn load_layered<T>(dir: &Path, file_name: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let path = dir.join(file_name);
    let mut value =
        serde_json::to_value(T::default()).context("Failed to serialize default configuration")?;

    match load_json_file(&path)? {
        Some(overrides) => {
            tracing::debug!(path = %path.display(), "Merging configuration file over defaults");
            merge_json(&mut value, overrides);
        }
        None => {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        }
    }

    serde_json::from_value(value)
        .with_context(|| format!("Failed to deserialize configuration from {}", path.display()))
}

/// Read an environment variable as `f64`, ignoring unparseable values.
pub fn env_f64(name: &str) -> Option<f64> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(variable = name, value = %raw, "Ignoring unparseable numeric override");
                None
            }
        },
        Err(_) => None,
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration shared by every Folio binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ObservabilityConfig {
    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("FOLIO_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.log_level = level;
            }
        }
        if let Ok(format) = std::env::var("FOLIO_LOG_FORMAT") {
            if !format.trim().is_empty() {
                self.log_format = format;
            }
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {:?}", LEVELS),
            });
        }
        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: "must be \"json\" or \"pretty\"".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        limits: Limits,
        tags: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Limits {
        low: f64,
        high: f64,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: "default".into(),
                limits: Limits { low: 0.3, high: 0.7 },
                tags: vec!["a".into(), "b".into()],
            }
        }
    }

    #[test]
    fn test_merge_json_nested() {
        let mut target = json!({"limits": {"low": 0.3, "high": 0.7}, "name": "x"});
        merge_json(&mut target, json!({"limits": {"high": 0.8}, "_comment": "ignored"}));
        assert_eq!(target, json!({"limits": {"low": 0.3, "high": 0.8}, "name": "x"}));
    }

    #[test]
    fn test_merge_json_replaces_arrays() {
        let mut target = json!({"tags": ["a", "b"]});
        merge_json(&mut target, json!({"tags": ["c"]}));
        assert_eq!(target, json!({"tags": ["c"]}));
    }

    #[test]
    fn test_load_layered_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Sample = load_layered(dir.path(), "sample.json").unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_load_layered_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sample.json"),
            r#"{"limits": {"high": 0.9}, "tags": []}"#,
        )
        .unwrap();

        let loaded: Sample = load_layered(dir.path(), "sample.json").unwrap();
        assert_eq!(loaded.name, "default");
        assert!((loaded.limits.low - 0.3).abs() < 1e-12);
        assert!((loaded.limits.high - 0.9).abs() < 1e-12);
        assert!(loaded.tags.is_empty());
    }

    #[test]
    fn test_load_layered_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sample.json"), "{ nope").unwrap();
        let err = load_layered::<Sample>(dir.path(), "sample.json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_observability_defaults_validate() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_observability_rejects_unknown_format() {
        let config = ObservabilityConfig {
            log_level: "info".into(),
            log_format: "xml".into(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_observability_alias_fields() {
        let config: ObservabilityConfig =
            serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "json");
    }
}
