//! Known signal registry
//!
//! Every behavioral signal the scorer understands is listed here together with
//! its seed bounds and risk direction. Anything not in this registry is an
//! unknown signal and is passed through the normalizer untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a higher normalized value means more or less risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDirection {
    /// Higher values indicate riskier behavior (e.g. focus loss events)
    HigherIsRiskier,
    /// Lower values indicate riskier behavior (e.g. warning dismiss time)
    LowerIsRiskier,
}

impl RiskDirection {
    /// Map a normalized value (0-1) onto the risk axis (0 = safe, 1 = risky)
    pub fn apply(self, normalized: f64) -> f64 {
        match self {
            RiskDirection::HigherIsRiskier => normalized,
            RiskDirection::LowerIsRiskier => 1.0 - normalized,
        }
    }
}

/// Known behavioral telemetry signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    TypingSpeedCharactersPerMinute,
    TypingErrorRatePercent,
    FocusLossEventCount,
    WindowSwitchesPerMinute,
    ActiveApplicationCount,
    WarningDismissTimeMs,
    DecisionLatencyMs,
    LinkHoverTimeMs,
    IdleTimeSeconds,
    MouseSpeedPixelsPerSecond,
}

impl Signal {
    /// All known signals, in registry order
    pub const ALL: [Signal; 10] = [
        Signal::TypingSpeedCharactersPerMinute,
        Signal::TypingErrorRatePercent,
        Signal::FocusLossEventCount,
        Signal::WindowSwitchesPerMinute,
        Signal::ActiveApplicationCount,
        Signal::WarningDismissTimeMs,
        Signal::DecisionLatencyMs,
        Signal::LinkHoverTimeMs,
        Signal::IdleTimeSeconds,
        Signal::MouseSpeedPixelsPerSecond,
    ];

    /// Wire name of the signal as it appears in telemetry payloads
    pub fn name(self) -> &'static str {
        match self {
            Signal::TypingSpeedCharactersPerMinute => "typing_speed_characters_per_minute",
            Signal::TypingErrorRatePercent => "typing_error_rate_percent",
            Signal::FocusLossEventCount => "focus_loss_event_count",
            Signal::WindowSwitchesPerMinute => "window_switches_per_minute",
            Signal::ActiveApplicationCount => "active_application_count",
            Signal::WarningDismissTimeMs => "warning_dismiss_time_ms",
            Signal::DecisionLatencyMs => "decision_latency_ms",
            Signal::LinkHoverTimeMs => "link_hover_time_ms",
            Signal::IdleTimeSeconds => "idle_time_seconds",
            Signal::MouseSpeedPixelsPerSecond => "mouse_speed_pixels_per_second",
        }
    }

    /// Look up a signal by its wire name (exact match)
    pub fn from_name(name: &str) -> Option<Signal> {
        Signal::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Initial (min, max) bounds before any telemetry has been observed
    pub fn seed_bounds(self) -> (f64, f64) {
        match self {
            Signal::TypingSpeedCharactersPerMinute => (0.0, 600.0),
            Signal::TypingErrorRatePercent => (0.0, 30.0),
            Signal::FocusLossEventCount => (0.0, 50.0),
            Signal::WindowSwitchesPerMinute => (0.0, 30.0),
            Signal::ActiveApplicationCount => (1.0, 25.0),
            Signal::WarningDismissTimeMs => (200.0, 15_000.0),
            Signal::DecisionLatencyMs => (300.0, 20_000.0),
            Signal::LinkHoverTimeMs => (0.0, 5_000.0),
            Signal::IdleTimeSeconds => (0.0, 900.0),
            Signal::MouseSpeedPixelsPerSecond => (0.0, 3_000.0),
        }
    }

    pub fn direction(self) -> RiskDirection {
        match self {
            // Hasty typing, dismissals and decisions point at inattention
            Signal::TypingSpeedCharactersPerMinute
            | Signal::WarningDismissTimeMs
            | Signal::DecisionLatencyMs
            | Signal::LinkHoverTimeMs => RiskDirection::LowerIsRiskier,
            Signal::TypingErrorRatePercent
            | Signal::FocusLossEventCount
            | Signal::WindowSwitchesPerMinute
            | Signal::ActiveApplicationCount
            | Signal::IdleTimeSeconds
            | Signal::MouseSpeedPixelsPerSecond => RiskDirection::HigherIsRiskier,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_roundtrip() {
        for signal in Signal::ALL {
            assert_eq!(Signal::from_name(signal.name()), Some(signal));
        }
        assert_eq!(Signal::from_name("unknown_signal_xyz"), None);
        // Lookup is exact, not case-insensitive
        assert_eq!(Signal::from_name("DECISION_LATENCY_MS"), None);
    }

    #[test]
    fn test_seed_bounds_ordered() {
        for signal in Signal::ALL {
            let (min, max) = signal.seed_bounds();
            assert!(min < max, "{signal} seeded with min >= max");
        }
    }

    #[test]
    fn test_serde_name_matches_wire_name() {
        for signal in Signal::ALL {
            let json = serde_json::to_string(&signal).unwrap();
            assert_eq!(json, format!("\"{}\"", signal.name()));
        }
    }

    #[test]
    fn test_direction_apply() {
        assert_eq!(RiskDirection::HigherIsRiskier.apply(0.25), 0.25);
        assert_eq!(RiskDirection::LowerIsRiskier.apply(0.25), 0.75);
        assert_eq!(
            Signal::WarningDismissTimeMs.direction(),
            RiskDirection::LowerIsRiskier
        );
        assert_eq!(
            Signal::FocusLossEventCount.direction(),
            RiskDirection::HigherIsRiskier
        );
    }
}
