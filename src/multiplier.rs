//! Contextual multipliers
//!
//! Three independent adjustments applied on top of the normalized signal
//! aggregate: local time of day, session length, and ambient noise scaled by
//! the working environment. All of them return 1.0 when their context is
//! missing.

use crate::error::ScoreError;
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Neutral multiplier used whenever context is absent
pub const NEUTRAL: f64 = 1.0;

/// 07:00-12:59
pub const MORNING_MULTIPLIER: f64 = 0.8;
/// 13:00-15:59
pub const AFTERNOON_MULTIPLIER: f64 = 1.15;
/// 16:00-20:59, and the starting value of the late-night ramp
pub const EVENING_MULTIPLIER: f64 = 1.05;
/// Upper limit of the late-night ramp
pub const LATE_NIGHT_CAP: f64 = 1.3;

const MINUTES_PER_DAY: u32 = 24 * 60;
const MORNING_START: u32 = 7 * 60;
const AFTERNOON_START: u32 = 13 * 60;
const EVENING_START: u32 = 16 * 60;
const LATE_NIGHT_START: u32 = 21 * 60;
/// 21:00 through 06:59
const LATE_NIGHT_SPAN_MIN: f64 = 600.0;

/// Sessions up to this length (minutes) are considered short
pub const SHORT_SESSION_MAX_MIN: f64 = 50.0;
/// Sessions up to this length (minutes) are considered normal
pub const NORMAL_SESSION_MAX_MIN: f64 = 90.0;
pub const SHORT_SESSION_MULTIPLIER: f64 = 0.8;
/// Ceiling the long-session curve approaches
pub const LONG_SESSION_CAP: f64 = 1.25;
/// Time constant of the long-session curve (minutes)
const LONG_SESSION_TAU_MIN: f64 = 60.0;

/// Noise scores above this start raising the multiplier
pub const NOISE_THRESHOLD: f64 = 76.0;
/// Noise scores are clamped to this value
pub const NOISE_CLAMP: f64 = 130.0;
/// Noise component at the clamp, before environment scaling
const NOISE_MAX_COMPONENT: f64 = 1.3;

/// Multiplier for the local time of day, given as "HH:MM" (24-hour).
///
/// Returns 1.0 when no time is given. Malformed strings are rejected rather
/// than defaulted.
pub fn time_of_day_multiplier(time: Option<&str>) -> Result<f64, ScoreError> {
    match time {
        None => Ok(NEUTRAL),
        Some(raw) => parse_time_of_day(raw).map(time_of_day_multiplier_at),
    }
}

/// Parse an "HH:MM" string into a time of day
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, ScoreError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ScoreError::InvalidTimeOfDay(raw.to_string()))
}

/// Time-of-day multiplier for an already parsed time
pub fn time_of_day_multiplier_at(time: NaiveTime) -> f64 {
    let minute_of_day = time.hour() * 60 + time.minute();

    match minute_of_day {
        m if (MORNING_START..AFTERNOON_START).contains(&m) => MORNING_MULTIPLIER,
        m if (AFTERNOON_START..EVENING_START).contains(&m) => AFTERNOON_MULTIPLIER,
        m if (EVENING_START..LATE_NIGHT_START).contains(&m) => EVENING_MULTIPLIER,
        m => {
            // Minutes past 21:00, wrapping through midnight
            let past = (m + MINUTES_PER_DAY - LATE_NIGHT_START) % MINUTES_PER_DAY;
            let ramp = (LATE_NIGHT_CAP - EVENING_MULTIPLIER) * past as f64 / LATE_NIGHT_SPAN_MIN;
            (EVENING_MULTIPLIER + ramp).min(LATE_NIGHT_CAP)
        }
    }
}

/// Multiplier for the length of the current session in minutes.
///
/// Short sessions dampen the score, normal sessions are neutral, and long
/// sessions saturate towards [`LONG_SESSION_CAP`].
pub fn session_length_multiplier(minutes: Option<f64>) -> Result<f64, ScoreError> {
    let minutes = match minutes {
        None => return Ok(NEUTRAL),
        Some(m) if !m.is_finite() || m < 0.0 => {
            return Err(ScoreError::InvalidSessionLength(m));
        }
        Some(m) => m,
    };

    if minutes <= SHORT_SESSION_MAX_MIN {
        return Ok(SHORT_SESSION_MULTIPLIER);
    }
    if minutes <= NORMAL_SESSION_MAX_MIN {
        return Ok(NEUTRAL);
    }

    let excess = minutes - NORMAL_SESSION_MAX_MIN;
    let growth = 1.0 - (-excess / LONG_SESSION_TAU_MIN).exp();
    Ok((NEUTRAL + (LONG_SESSION_CAP - NEUTRAL) * growth).min(LONG_SESSION_CAP))
}

/// Environment code to noise scaling factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentTable {
    factors: BTreeMap<String, f64>,
    default_factor: f64,
}

impl Default for EnvironmentTable {
    fn default() -> Self {
        let factors: BTreeMap<String, f64> = [
            ("SOL", 0.95), // complete solitude
            ("SMG", 1.0),  // small group
            ("OFE", 1.05), // office environment
            ("HSE", 1.12), // highly stimulating environment
        ]
        .into_iter()
        .map(|(code, factor)| (code.to_string(), factor))
        .collect();

        Self {
            factors,
            default_factor: 1.05,
        }
    }
}

impl EnvironmentTable {
    /// Build a table from explicit factors. Codes are stored upper-cased.
    pub fn new(factors: BTreeMap<String, f64>, default_factor: f64) -> Self {
        Self {
            factors: factors
                .into_iter()
                .map(|(code, factor)| (code.trim().to_ascii_uppercase(), factor))
                .collect(),
            default_factor,
        }
    }

    /// Scaling factor for an environment code (case-insensitive)
    pub fn factor(&self, code: &str) -> f64 {
        let key = code.trim().to_ascii_uppercase();
        match self.factors.get(&key) {
            Some(&factor) => factor,
            None => {
                warn!(code, default_factor = self.default_factor, "unknown environment code");
                self.default_factor
            }
        }
    }

    pub fn default_factor(&self) -> f64 {
        self.default_factor
    }

    /// Known environment codes with their factors
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.factors.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Noise multiplier for this table; see [`noise_environment_multiplier`].
    ///
    /// Without an environment code the default factor applies.
    pub fn noise_multiplier(&self, noise: Option<f64>, code: Option<&str>) -> f64 {
        let factor = code.map_or(self.default_factor, |c| self.factor(c));
        noise_component(noise.unwrap_or(0.0)) * factor
    }
}

/// Multiplier for ambient noise in a given environment.
///
/// Missing noise counts as silence. Noise is clamped to [`NOISE_CLAMP`]; up
/// to [`NOISE_THRESHOLD`] only the environment factor applies, above it the
/// noise component rises linearly to 1.3 at the clamp. Unknown environment
/// codes use the default factor.
pub fn noise_environment_multiplier(noise: Option<f64>, code: &str) -> f64 {
    EnvironmentTable::default().noise_multiplier(noise, Some(code))
}

fn noise_component(noise: f64) -> f64 {
    // NaN collapses to silence via max()
    let noise = noise.max(0.0).min(NOISE_CLAMP);
    if noise <= NOISE_THRESHOLD {
        return NEUTRAL;
    }
    let fraction = (noise - NOISE_THRESHOLD) / (NOISE_CLAMP - NOISE_THRESHOLD);
    NEUTRAL + (NOISE_MAX_COMPONENT - NEUTRAL) * fraction
}
