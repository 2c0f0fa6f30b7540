//! Scoring configuration
//!
//! Optional TOML file tuning signal weights, environment factors and seed
//! bounds. Everything has a default, so an empty file (or no file at all) gives
//! the stock scorer.
//!
//! ```toml
//! default_environment = "OFE"
//!
//! [weights]
//! focus_loss_event_count = 2.0
//! warning_dismiss_time_ms = 1.5
//!
//! [environments]
//! SOL = 0.95
//! LAB = 0.9
//! default_factor = 1.05
//!
//! [bounds.decision_latency_ms]
//! min = 100.0
//! max = 30000.0
//! ```

use crate::bounds::{BoundsTable, SignalBounds};
use crate::error::ScoreError;
use crate::multiplier::EnvironmentTable;
use crate::signals::Signal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a config file
pub const ENV_CONFIG_PATH: &str = "HSES_CONFIG";
/// Fallback config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/hses.toml";

/// Weight used for signals without an explicit weight
pub const DEFAULT_SIGNAL_WEIGHT: f64 = 1.0;

/// Environment overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Factor for unrecognized environment codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_factor: Option<f64>,
    /// Code to factor; merged over the built-in table
    #[serde(flatten)]
    pub factors: BTreeMap<String, f64>,
}

/// Scoring configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Environment code assumed when a request carries none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,
    /// Signal name to aggregation weight
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub environments: EnvironmentConfig,
    /// Signal name to seed bounds override
    #[serde(default)]
    pub bounds: BTreeMap<String, SignalBounds>,
}

impl ScoringConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ScoreError> {
        let config: ScoringConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path
    pub fn from_path(path: &Path) -> Result<Self, ScoreError> {
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading scoring config");
        Self::from_toml_str(&content)
    }

    /// Load using `$HSES_CONFIG`, then `config/hses.toml`, else defaults
    pub fn load_default() -> Result<Self, ScoreError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(p);
            if !path.exists() {
                return Err(ScoreError::ConfigError(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    path.display()
                )));
            }
            return Self::from_path(&path);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::from_path(&fallback);
        }
        Ok(Self::default())
    }

    /// Check names and numeric ranges
    pub fn validate(&self) -> Result<(), ScoreError> {
        for (name, &weight) in &self.weights {
            lookup_signal(name)?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoreError::ConfigError(format!(
                    "weight for {name} must be a non-negative number, got {weight}"
                )));
            }
        }

        for (code, &factor) in &self.environments.factors {
            check_factor(code, factor)?;
        }
        if let Some(factor) = self.environments.default_factor {
            check_factor("default_factor", factor)?;
        }

        // Reuses the table's own range checks
        self.bounds_table()?;
        Ok(())
    }

    /// Aggregation weight for a signal
    pub fn weight(&self, signal: Signal) -> f64 {
        self.weights
            .get(signal.name())
            .copied()
            .unwrap_or(DEFAULT_SIGNAL_WEIGHT)
    }

    /// Environment table: built-in factors with configured overrides applied
    pub fn environment_table(&self) -> EnvironmentTable {
        let defaults = EnvironmentTable::default();
        let mut factors: BTreeMap<String, f64> = defaults
            .iter()
            .map(|(code, factor)| (code.to_string(), factor))
            .collect();
        for (code, factor) in &self.environments.factors {
            factors.insert(code.clone(), *factor);
        }
        let default_factor = self
            .environments
            .default_factor
            .unwrap_or_else(|| defaults.default_factor());
        EnvironmentTable::new(factors, default_factor)
    }

    /// Seed bounds with configured overrides applied
    pub fn bounds_table(&self) -> Result<BoundsTable, ScoreError> {
        let mut table = BoundsTable::seeded();
        for (name, bounds) in &self.bounds {
            table.set(lookup_signal(name)?, *bounds)?;
        }
        Ok(table)
    }
}

fn lookup_signal(name: &str) -> Result<Signal, ScoreError> {
    Signal::from_name(name).ok_or_else(|| ScoreError::UnknownSignal(name.to_string()))
}

fn check_factor(code: &str, factor: f64) -> Result<(), ScoreError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ScoreError::ConfigError(format!(
            "environment factor for {code} must be a positive number, got {factor}"
        )));
    }
    Ok(())
}
