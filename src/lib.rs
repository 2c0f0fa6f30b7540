//! HSES Score - behavioral risk scoring for telemetry sessions
//!
//! Raw behavioral telemetry (typing speed, focus loss, window switches, warning
//! dismiss latency, ...) is turned into a 0-100 risk score through a
//! deterministic pipeline: adaptive normalization → weighted aggregation →
//! contextual multipliers (time of day, session length, noise/environment).
//!
//! ## Modules
//!
//! - **Normalizer**: adaptive per-signal min/max normalization into [0, 1]
//! - **Multipliers**: time-of-day, session-length and noise/environment factors
//! - **Pipeline**: stateless and stateful scoring over JSON requests

pub mod bounds;
pub mod config;
pub mod error;
pub mod multiplier;
pub mod normalizer;
pub mod pipeline;
pub mod signals;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bounds::{BoundsTable, SignalBounds};
pub use config::ScoringConfig;
pub use error::ScoreError;
pub use multiplier::{
    noise_environment_multiplier, session_length_multiplier, time_of_day_multiplier,
    EnvironmentTable,
};
pub use normalizer::AdaptiveNormalizer;
pub use pipeline::{score_json, ScoreProcessor};
pub use signals::{RiskDirection, Signal};
pub use types::{RiskBand, ScoreReport, ScoreRequest, TelemetryPayload};

/// HSES version embedded in all score reports
pub const HSES_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for score reports
pub const PRODUCER_NAME: &str = "hses-score";
