//! Engine configuration.
//!
//! Loaded from `engine.json` in the configuration directory, deep-merged
//! over [`EngineConfig::default`]. A partial file only needs the keys it
//! changes; arrays (tier conditions, keyword lists, fund slots) replace the
//! defaults wholesale.
//!
//! # Environment Variable Mapping
//!
//! - `FOLIO_RISK_FREE_RATE` → portfolio.weighting.risk_free_rate
//! - `FOLIO_FORCED_INCLUDE_FRACTION` → portfolio.forced_include_fraction
//! - `FOLIO_LOG_LEVEL` / `FOLIO_LOG_FORMAT` → observability

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use folio_common::config::{env_f64, load_layered};
use folio_common::validation::{Validate, ValidationCollector, ValidationResult};
use folio_common::ObservabilityConfig;

use crate::portfolio::ConstructionConfig;
use crate::screener::ScreenerConfig;

/// Configuration file name inside the configuration directory.
pub const ENGINE_CONFIG_FILE: &str = "engine.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Exclusion rules and pool classification
    pub screener: ScreenerConfig,

    /// Construction plans, weighting and forced include
    pub portfolio: ConstructionConfig,

    /// Logging
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Load from `dir`, apply environment overrides, then validate.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut config: Self = load_layered(dir, ENGINE_CONFIG_FILE)?;
        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", dir.display()))?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Some(rate) = env_f64("FOLIO_RISK_FREE_RATE") {
            self.portfolio.weighting.risk_free_rate = rate;
        }
        if let Some(fraction) = env_f64("FOLIO_FORCED_INCLUDE_FRACTION") {
            self.portfolio.forced_include_fraction = fraction;
        }
        self.observability.apply_env_overrides();
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationCollector::new();
        errors.check(self.screener.validate());
        errors.check(self.portfolio.validate());
        errors.check(self.observability.validate());
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ENGINE_CONFIG_FILE),
            r#"{
                "_comment": "tighter caps",
                "screener": {"exclusion": {"min_market_cap": 100.0}},
                "portfolio": {"moderate": {"pure_equity": {"max_per_sector": 1}}}
            }"#,
        )
        .unwrap();

        let config: EngineConfig = load_layered(dir.path(), ENGINE_CONFIG_FILE).unwrap();
        assert_eq!(config.screener.exclusion.min_market_cap, 100.0);
        assert_eq!(config.screener.exclusion.min_age_years, 1.0);
        assert_eq!(config.portfolio.moderate.pure_equity.max_per_sector, Some(1));
        assert_eq!(config.portfolio.moderate.pure_equity.max_assets, 8);
        assert_eq!(config.screener.stocks.tiers.len(), 3);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ENGINE_CONFIG_FILE),
            r#"{"portfolio": {"aggressive": {"hybrid": {"core_fraction": 0.9}}}}"#,
        )
        .unwrap();

        let err = EngineConfig::load_from(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config: EngineConfig = load_layered(dir.path(), ENGINE_CONFIG_FILE).unwrap();
        assert_eq!(config.portfolio.forced_include_fraction, 0.10);
        assert_eq!(config.portfolio.weighting.risk_free_rate, 1.5);
    }
}
