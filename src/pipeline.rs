//! Scoring pipeline orchestration
//!
//! Public API for turning a score request into a score report:
//! validate → normalize → aggregate → contextual multipliers → report.

use crate::bounds::{BoundsTable, SignalBounds};
use crate::config::ScoringConfig;
use crate::error::ScoreError;
use crate::multiplier::{session_length_multiplier, time_of_day_multiplier, EnvironmentTable};
use crate::normalizer::AdaptiveNormalizer;
use crate::signals::Signal;
use crate::types::{
    MultiplierBreakdown, NormalizedSignals, Producer, RiskBand, ScoreReport, ScoreRequest,
};
use crate::{HSES_VERSION, PRODUCER_NAME};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Score a JSON request (stateless, one-shot).
///
/// Uses fresh seed bounds, so nothing learned here carries over to the next
/// call. Returns the report as JSON.
pub fn score_json(request_json: &str) -> Result<String, ScoreError> {
    let processor = ScoreProcessor::new();
    processor.process(request_json)
}

/// Stateful scorer keeping adaptive bounds across requests.
///
/// Cloning shares the underlying bounds table, so clones can be handed to
/// concurrent workers.
#[derive(Debug, Clone)]
pub struct ScoreProcessor {
    normalizer: AdaptiveNormalizer,
    config: ScoringConfig,
    environments: EnvironmentTable,
    instance_id: String,
}

impl Default for ScoreProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreProcessor {
    /// Create a processor with default weights, environments and seed bounds
    pub fn new() -> Self {
        Self {
            normalizer: AdaptiveNormalizer::new(),
            config: ScoringConfig::default(),
            environments: EnvironmentTable::default(),
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a processor from a configuration
    pub fn with_config(config: ScoringConfig) -> Result<Self, ScoreError> {
        config.validate()?;
        let normalizer = AdaptiveNormalizer::with_table(config.bounds_table()?);
        let environments = config.environment_table();
        Ok(Self {
            normalizer,
            config,
            environments,
            instance_id: Uuid::new_v4().to_string(),
        })
    }

    /// Parse a JSON request, score it and return the JSON report
    pub fn process(&self, request_json: &str) -> Result<String, ScoreError> {
        let request: ScoreRequest = serde_json::from_str(request_json)
            .map_err(|e| ScoreError::ParseError(e.to_string()))?;
        let report = self.score(&request)?;
        serde_json::to_string(&report).map_err(|e| ScoreError::EncodingError(e.to_string()))
    }

    /// Score a parsed request
    pub fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScoreError> {
        // Stage 1: Reject values that would poison the bounds table
        for (name, &value) in &request.signals {
            if !value.is_finite() {
                return Err(ScoreError::InvalidSignalValue {
                    signal: name.clone(),
                    value,
                });
            }
        }

        // Stage 2: Contextual multipliers (validated before any bounds move)
        let environment = request
            .environmental_factor
            .as_deref()
            .or(self.config.default_environment.as_deref());
        let multipliers = MultiplierBreakdown {
            time_of_day: time_of_day_multiplier(request.time_of_day.as_deref())?,
            session_length: session_length_multiplier(request.session_length)?,
            noise_environment: self.environments.noise_multiplier(request.noise, environment),
        };

        // Stage 3: Normalize
        let normalized = self.normalizer.normalize_detailed(&request.signals);

        // Stage 4: Aggregate
        let (base_score, signal_weights) = self.aggregate(&normalized);

        // Stage 5: Combine
        let multiplier = multipliers.product();
        let total_score = (base_score * multiplier * 100.0).clamp(0.0, 100.0);
        let risk_band = RiskBand::from_score(total_score);

        debug!(
            base_score,
            multiplier,
            total_score,
            known = normalized.known.len(),
            unknown = normalized.unknown.len(),
            "scored telemetry"
        );

        Ok(ScoreReport {
            total_score,
            base_score,
            multiplier,
            multipliers,
            risk_band,
            normalized_signals: normalized.values,
            signal_weights,
            unknown_signals: normalized.unknown,
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: HSES_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now(),
        })
    }

    /// Weighted mean of risk-oriented normalized values.
    ///
    /// Returns the base score (0-1) and each signal's share of it.
    fn aggregate(&self, normalized: &NormalizedSignals) -> (f64, BTreeMap<String, f64>) {
        let total_weight: f64 = normalized
            .known
            .keys()
            .map(|&signal| self.config.weight(signal))
            .sum();

        let mut contributions = BTreeMap::new();
        if total_weight <= 0.0 {
            return (0.0, contributions);
        }

        let mut base = 0.0;
        for (&signal, &value) in &normalized.known {
            let share = self.config.weight(signal) * signal.direction().apply(value) / total_weight;
            contributions.insert(signal.name().to_string(), share);
            base += share;
        }

        (base.clamp(0.0, 1.0), contributions)
    }

    /// The processor's normalizer (shares bounds with this processor)
    pub fn normalizer(&self) -> &AdaptiveNormalizer {
        &self.normalizer
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Save bounds state to JSON for persistence
    pub fn save_bounds(&self) -> Result<String, ScoreError> {
        self.normalizer
            .snapshot()
            .to_json()
            .map_err(|e| ScoreError::EncodingError(e.to_string()))
    }

    /// Load bounds state from JSON
    pub fn load_bounds(&self, json: &str) -> Result<(), ScoreError> {
        let table = BoundsTable::from_json(json)?;
        self.normalizer.replace(table);
        Ok(())
    }

    /// Return to the configured seed bounds
    pub fn clear_bounds(&self) -> Result<(), ScoreError> {
        self.normalizer.replace(self.config.bounds_table()?);
        Ok(())
    }

    /// Current bounds of a signal, mostly for diagnostics
    pub fn signal_bounds(&self, signal: Signal) -> SignalBounds {
        self.normalizer.bounds(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplier::noise_environment_multiplier;

    fn sample_request_json() -> &'static str {
        r#"{
            "signals": {
                "typing_speed_characters_per_minute": 420,
                "focus_loss_event_count": 12,
                "window_switches_per_minute": 9,
                "active_application_count": 7,
                "warning_dismiss_time_ms": 850,
                "decision_latency_ms": 1400,
                "custom_vendor_metric": 42
            },
            "time_of_day": "23:30",
            "session_length": 130,
            "noise": 88,
            "environmental_factor": "OFE"
        }"#
    }

    #[test]
    fn test_score_json_stateless() {
        let json = score_json(sample_request_json()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["producer"]["name"], "hses-score");
        assert!(report["total_score"].is_number());
        assert!(report["multiplier"].as_f64().unwrap() > 1.0);
        assert_eq!(report["normalized_signals"]["custom_vendor_metric"], 42.0);
        assert_eq!(report["unknown_signals"][0], "custom_vendor_metric");
        assert!(report["signal_weights"]["custom_vendor_metric"].is_null());
        assert!(report["risk_band"].is_string());
    }

    #[test]
    fn test_multiplier_is_product_of_components() {
        let processor = ScoreProcessor::new();
        let request: ScoreRequest = serde_json::from_str(sample_request_json()).unwrap();
        let report = processor.score(&request).unwrap();

        let expected = time_of_day_multiplier(Some("23:30")).unwrap()
            * session_length_multiplier(Some(130.0)).unwrap()
            * noise_environment_multiplier(Some(88.0), "OFE");
        assert!((report.multiplier - expected).abs() < 1e-12);
        assert!((report.total_score - report.base_score * expected * 100.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&report.total_score));
        assert_eq!(report.risk_band, RiskBand::from_score(report.total_score));
    }

    #[test]
    fn test_contributions_sum_to_base_score() {
        let processor = ScoreProcessor::new();
        let request: ScoreRequest = serde_json::from_str(sample_request_json()).unwrap();
        let report = processor.score(&request).unwrap();

        let sum: f64 = report.signal_weights.values().sum();
        assert!((sum - report.base_score).abs() < 1e-12);
        assert_eq!(report.signal_weights.len(), 6);
    }

    #[test]
    fn test_direction_applied() {
        let processor = ScoreProcessor::new();
        // Dismissing a warning at the fastest recorded time is maximally risky
        let request = ScoreRequest {
            signals: [("warning_dismiss_time_ms".to_string(), 200.0)].into(),
            ..Default::default()
        };
        let report = processor.score(&request).unwrap();

        assert_eq!(report.normalized_signals["warning_dismiss_time_ms"], 0.0);
        assert_eq!(report.base_score, 1.0);
    }

    #[test]
    fn test_no_known_signals() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("only_unknown".to_string(), 5.0)].into(),
            time_of_day: Some("02:00".to_string()),
            ..Default::default()
        };
        let report = processor.score(&request).unwrap();

        assert_eq!(report.base_score, 0.0);
        assert_eq!(report.total_score, 0.0);
        assert_eq!(report.risk_band, RiskBand::Low);
    }

    #[test]
    fn test_total_score_clamped() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("focus_loss_event_count".to_string(), 500.0)].into(),
            time_of_day: Some("06:59".to_string()),
            session_length: Some(600.0),
            noise: Some(130.0),
            environmental_factor: Some("HSE".to_string()),
        };
        let report = processor.score(&request).unwrap();

        assert!(report.multiplier > 1.0);
        assert_eq!(report.total_score, 100.0);
        assert_eq!(report.risk_band, RiskBand::High);
    }

    #[test]
    fn test_missing_context_is_neutral() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("idle_time_seconds".to_string(), 450.0)].into(),
            ..Default::default()
        };
        let report = processor.score(&request).unwrap();

        assert_eq!(report.multipliers.time_of_day, 1.0);
        assert_eq!(report.multipliers.session_length, 1.0);
        // No environment: default factor with silent noise
        assert_eq!(report.multipliers.noise_environment, 1.05);
    }

    #[test]
    fn test_configured_default_environment() {
        let config = ScoringConfig::from_toml_str("default_environment = \"SOL\"").unwrap();
        let processor = ScoreProcessor::with_config(config).unwrap();
        let report = processor.score(&ScoreRequest::default()).unwrap();

        assert_eq!(report.multipliers.noise_environment, 0.95);
    }

    #[test]
    fn test_invalid_time_rejected_without_touching_bounds() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("idle_time_seconds".to_string(), 5_000.0)].into(),
            time_of_day: Some("25:99".to_string()),
            ..Default::default()
        };

        let result = processor.score(&request);
        assert!(matches!(result, Err(ScoreError::InvalidTimeOfDay(_))));
        assert_eq!(processor.signal_bounds(Signal::IdleTimeSeconds).max, 900.0);
    }

    #[test]
    fn test_non_finite_signal_rejected() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("idle_time_seconds".to_string(), f64::NAN)].into(),
            ..Default::default()
        };
        assert!(matches!(
            processor.score(&request),
            Err(ScoreError::InvalidSignalValue { .. })
        ));
    }

    #[test]
    fn test_weights_shift_score() {
        let request = ScoreRequest {
            signals: [
                ("focus_loss_event_count".to_string(), 50.0),
                ("idle_time_seconds".to_string(), 0.0),
            ]
            .into(),
            ..Default::default()
        };

        let plain = ScoreProcessor::new().score(&request).unwrap();
        assert!((plain.base_score - 0.5).abs() < 1e-12);

        let config =
            ScoringConfig::from_toml_str("[weights]\nfocus_loss_event_count = 3.0\n").unwrap();
        let weighted = ScoreProcessor::with_config(config)
            .unwrap()
            .score(&request)
            .unwrap();
        assert!((weighted.base_score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_processor_keeps_bounds() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("idle_time_seconds".to_string(), 1_800.0)].into(),
            ..Default::default()
        };
        processor.score(&request).unwrap();
        assert_eq!(processor.signal_bounds(Signal::IdleTimeSeconds).max, 1_800.0);

        // A clone shares the same table
        let clone = processor.clone();
        assert_eq!(clone.signal_bounds(Signal::IdleTimeSeconds).max, 1_800.0);
    }

    #[test]
    fn test_bounds_persistence() {
        let processor = ScoreProcessor::new();
        let request = ScoreRequest {
            signals: [("decision_latency_ms".to_string(), 50.0)].into(),
            ..Default::default()
        };
        processor.score(&request).unwrap();

        let saved = processor.save_bounds().unwrap();
        let restored = ScoreProcessor::new();
        restored.load_bounds(&saved).unwrap();
        assert_eq!(restored.signal_bounds(Signal::DecisionLatencyMs).min, 50.0);

        restored.clear_bounds().unwrap();
        assert_eq!(restored.signal_bounds(Signal::DecisionLatencyMs).min, 300.0);
    }

    #[test]
    fn test_extreme_finite_values_keep_score_finite() {
        let processor = ScoreProcessor::new();
        processor
            .process(r#"{"signals": {"idle_time_seconds": -1e308}}"#)
            .unwrap();
        let json = processor
            .process(r#"{"signals": {"idle_time_seconds": 1e308}}"#)
            .unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        let total = report["total_score"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&total));
        assert!(report["base_score"].as_f64().is_some());
        let normalized = report["normalized_signals"]["idle_time_seconds"].as_f64().unwrap();
        assert_eq!(normalized, 1.0);

        // Later ordinary values are not pinned to the floor
        let request = ScoreRequest {
            signals: [("idle_time_seconds".to_string(), 600.0)].into(),
            ..Default::default()
        };
        let report = processor.score(&request).unwrap();
        assert!(report.total_score.is_finite());
        assert!(report.base_score > 0.4 && report.base_score < 0.6);
    }

    #[test]
    fn test_invalid_json() {
        let result = score_json("not valid json");
        assert!(matches!(result, Err(ScoreError::ParseError(_))));
    }

    #[test]
    fn test_non_numeric_signal_rejected() {
        let result = score_json(r#"{"signals": {"idle_time_seconds": "lots"}}"#);
        assert!(result.is_err());
    }
}
