//! Adaptive signal normalization
//!
//! Maps raw telemetry values into [0, 1] using the running min/max of each known
//! signal. The bounds table sits behind a single mutex so the whole
//! read-check-update of a call is atomic; clones of a normalizer share the same
//! table.

use crate::bounds::{BoundsTable, SignalBounds};
use crate::signals::Signal;
use crate::types::{NormalizedSignals, TelemetryPayload};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Normalizer with adaptive per-signal bounds
#[derive(Debug, Clone, Default)]
pub struct AdaptiveNormalizer {
    table: Arc<Mutex<BoundsTable>>,
}

impl AdaptiveNormalizer {
    /// Create a normalizer seeded with the registry's default bounds
    pub fn new() -> Self {
        Self::with_table(BoundsTable::seeded())
    }

    /// Create a normalizer over an existing bounds table
    pub fn with_table(table: BoundsTable) -> Self {
        Self {
            table: Arc::new(Mutex::new(table)),
        }
    }

    /// Normalize a telemetry payload.
    ///
    /// Known signals widen their bounds if needed and come back in [0, 1].
    /// Unknown signals are returned with their raw value and leave the table
    /// untouched.
    pub fn normalize(&self, signals: &TelemetryPayload) -> TelemetryPayload {
        self.normalize_detailed(signals).values
    }

    /// Normalize a payload and report which signals were known and unknown
    pub fn normalize_detailed(&self, signals: &TelemetryPayload) -> NormalizedSignals {
        let mut out = NormalizedSignals::default();
        let mut table = self.table.lock();

        for (name, &raw) in signals {
            match Signal::from_name(name) {
                Some(signal) => {
                    let normalized = table.observe_and_normalize(signal, raw);
                    out.values.insert(name.clone(), normalized);
                    out.known.insert(signal, normalized);
                }
                None => {
                    trace!(signal = %name, "unknown signal passed through");
                    out.values.insert(name.clone(), raw);
                    out.unknown.push(name.clone());
                }
            }
        }

        out
    }

    /// Current bounds for a signal
    pub fn bounds(&self, signal: Signal) -> SignalBounds {
        self.table.lock().get(signal)
    }

    /// Copy of the full bounds table
    pub fn snapshot(&self) -> BoundsTable {
        self.table.lock().clone()
    }

    /// Replace the bounds table (e.g. after loading persisted bounds)
    pub fn replace(&self, table: BoundsTable) {
        *self.table.lock() = table;
    }

    /// Return every signal to its seed bounds
    pub fn reset(&self) {
        self.table.lock().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn payload(entries: &[(&str, f64)]) -> TelemetryPayload {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_single_signal_min_value() {
        let normalizer = AdaptiveNormalizer::new();
        let min = normalizer.bounds(Signal::WarningDismissTimeMs).min;

        let result = normalizer.normalize(&payload(&[("warning_dismiss_time_ms", min)]));
        assert_eq!(result["warning_dismiss_time_ms"], 0.0);
    }

    #[test]
    fn test_single_signal_max_value() {
        let normalizer = AdaptiveNormalizer::new();
        let max = normalizer.bounds(Signal::WarningDismissTimeMs).max;

        let result = normalizer.normalize(&payload(&[("warning_dismiss_time_ms", max)]));
        assert_eq!(result["warning_dismiss_time_ms"], 1.0);
    }

    #[test]
    fn test_every_known_signal_min_max_mid() {
        let normalizer = AdaptiveNormalizer::new();
        for signal in Signal::ALL {
            let SignalBounds { min, max } = normalizer.bounds(signal);
            let name = signal.name();

            let result = normalizer.normalize(&payload(&[(name, min)]));
            assert_eq!(result[name], 0.0, "{name} at min");

            let result = normalizer.normalize(&payload(&[(name, max)]));
            assert_eq!(result[name], 1.0, "{name} at max");

            let result = normalizer.normalize(&payload(&[(name, (min + max) / 2.0)]));
            assert!((result[name] - 0.5).abs() < 1e-9, "{name} at midpoint");
        }
        // None of the above observed a new extreme
        assert_eq!(normalizer.snapshot(), BoundsTable::seeded());
    }

    #[test]
    fn test_multiple_signals() {
        let normalizer = AdaptiveNormalizer::new();
        let result = normalizer.normalize(&payload(&[
            ("focus_loss_event_count", 10.0),
            ("window_switches_per_minute", 15.0),
            ("active_application_count", 10.0),
        ]));

        assert_eq!(result.len(), 3);
        for value in result.values() {
            assert!((0.0..=1.0).contains(value));
        }
    }

    #[test]
    fn test_updates_min_value() {
        let normalizer = AdaptiveNormalizer::new();
        let original = normalizer.bounds(Signal::DecisionLatencyMs);

        normalizer.normalize(&payload(&[("decision_latency_ms", original.min - 50.0)]));

        assert_eq!(
            normalizer.bounds(Signal::DecisionLatencyMs).min,
            original.min - 50.0
        );
        assert_eq!(normalizer.bounds(Signal::DecisionLatencyMs).max, original.max);
    }

    #[test]
    fn test_updates_max_value() {
        let normalizer = AdaptiveNormalizer::new();
        let original = normalizer.bounds(Signal::DecisionLatencyMs);

        normalizer.normalize(&payload(&[("decision_latency_ms", original.max + 100.0)]));

        assert_eq!(
            normalizer.bounds(Signal::DecisionLatencyMs).max,
            original.max + 100.0
        );
    }

    #[test]
    fn test_ignores_unknown_signal() {
        let normalizer = AdaptiveNormalizer::new();
        let detailed = normalizer.normalize_detailed(&payload(&[("unknown_signal_xyz", 123.0)]));

        assert_eq!(detailed.values["unknown_signal_xyz"], 123.0);
        assert_eq!(detailed.unknown, vec!["unknown_signal_xyz".to_string()]);
        assert!(detailed.known.is_empty());
        assert_eq!(normalizer.snapshot(), BoundsTable::seeded());
    }

    #[test]
    fn test_order_dependent() {
        let normalizer = AdaptiveNormalizer::new();
        let first = normalizer.normalize(&payload(&[("idle_time_seconds", 450.0)]));
        assert!((first["idle_time_seconds"] - 0.5).abs() < 1e-9);

        // A new maximum shifts later normalizations of the same raw value
        normalizer.normalize(&payload(&[("idle_time_seconds", 1800.0)]));
        let second = normalizer.normalize(&payload(&[("idle_time_seconds", 450.0)]));
        assert!((second["idle_time_seconds"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_bounds() {
        let mut table = BoundsTable::seeded();
        table
            .set(Signal::FocusLossEventCount, SignalBounds::new(3.0, 3.0))
            .unwrap();
        let normalizer = AdaptiveNormalizer::with_table(table);

        let result = normalizer.normalize(&payload(&[("focus_loss_event_count", 3.0)]));
        assert_eq!(result["focus_loss_event_count"], 0.0);
    }

    #[test]
    fn test_instances_are_isolated_but_clones_share() {
        let a = AdaptiveNormalizer::new();
        let b = AdaptiveNormalizer::new();
        let shared = a.clone();

        a.normalize(&payload(&[("idle_time_seconds", 5_000.0)]));

        assert_eq!(shared.bounds(Signal::IdleTimeSeconds).max, 5_000.0);
        assert_eq!(b.bounds(Signal::IdleTimeSeconds).max, 900.0);
    }

    #[test]
    fn test_concurrent_widening() {
        let normalizer = AdaptiveNormalizer::new();
        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let n = normalizer.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        let value = 900.0 + (i * 100 + j) as f64;
                        let out = n.normalize(&payload(&[("idle_time_seconds", value)]));
                        assert!((0.0..=1.0).contains(&out["idle_time_seconds"]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Largest value observed by any thread: 900 + 8 * 100 + 99
        assert_eq!(normalizer.bounds(Signal::IdleTimeSeconds).max, 1_799.0);
    }

    #[test]
    fn test_reset_and_replace() {
        let normalizer = AdaptiveNormalizer::new();
        normalizer.normalize(&payload(&[("link_hover_time_ms", 9_000.0)]));
        let snapshot = normalizer.snapshot();

        normalizer.reset();
        assert_eq!(normalizer.snapshot(), BoundsTable::seeded());

        normalizer.replace(snapshot);
        assert_eq!(normalizer.bounds(Signal::LinkHoverTimeMs).max, 9_000.0);
    }
}
