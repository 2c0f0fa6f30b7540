//! Core data types for HSES scoring
//!
//! These types describe the data that flows through the pipeline: incoming
//! telemetry, normalized signals, and the score report returned to hosts.

use crate::signals::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw telemetry: signal name to raw numeric value
pub type TelemetryPayload = BTreeMap<String, f64>;

/// Output of a normalization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignals {
    /// Every input signal by name; known signals normalized, unknown passed through
    pub values: BTreeMap<String, f64>,
    /// Normalized values of known signals only (0-1)
    pub known: BTreeMap<Signal, f64>,
    /// Names of signals that were not in the registry
    pub unknown: Vec<String>,
}

/// Score request as received from a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Raw telemetry signals
    #[serde(default)]
    pub signals: TelemetryPayload,
    /// Local time of day, "HH:MM"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    /// Session length in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_length: Option<f64>,
    /// Ambient noise score
    #[serde(default, alias = "Noise_State", skip_serializing_if = "Option::is_none")]
    pub noise: Option<f64>,
    /// Environment code (SOL, SMG, OFE, HSE)
    #[serde(
        default,
        alias = "environment",
        skip_serializing_if = "Option::is_none"
    )]
    pub environmental_factor: Option<String>,
}

/// Individual contextual multipliers applied to a score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierBreakdown {
    pub time_of_day: f64,
    pub session_length: f64,
    pub noise_environment: f64,
}

impl MultiplierBreakdown {
    /// Combined multiplier (product of all components)
    pub fn product(&self) -> f64 {
        self.time_of_day * self.session_length * self.noise_environment
    }
}

/// Coarse risk classification of a total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskBand {
    /// Classify a 0-100 score
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            RiskBand::Low
        } else if score < 60.0 {
            RiskBand::Moderate
        } else if score < 80.0 {
            RiskBand::Elevated
        } else {
            RiskBand::High
        }
    }
}

/// Producer metadata embedded in every report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Score report returned to hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Final score, 0-100
    pub total_score: f64,
    /// Weighted signal aggregate before multipliers, 0-1
    pub base_score: f64,
    /// Combined contextual multiplier
    pub multiplier: f64,
    /// Individual multipliers
    pub multipliers: MultiplierBreakdown,
    pub risk_band: RiskBand,
    /// Normalized value per input signal (unknown signals passed through)
    pub normalized_signals: BTreeMap<String, f64>,
    /// Contribution of each known signal to the base score
    pub signal_weights: BTreeMap<String, f64>,
    /// Signals that were not recognized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_signals: Vec<String>,
    pub producer: Producer,
    pub computed_at_utc: DateTime<Utc>,
}
