//! Signal bounds management
//!
//! This module keeps the adaptive min/max record for every known signal.
//! Bounds only ever widen: a value below the recorded minimum lowers it and a
//! value above the recorded maximum raises it. Nothing ever narrows them again
//! short of an explicit reset.

use crate::error::ScoreError;
use crate::signals::Signal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Observed range for a single signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalBounds {
    /// Smallest value seen so far (or seeded)
    pub min: f64,
    /// Largest value seen so far (or seeded)
    pub max: f64,
}

impl SignalBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Widen the bounds to include `value`. Returns true if they changed.
    pub fn observe(&mut self, value: f64) -> bool {
        let mut widened = false;
        if value < self.min {
            self.min = value;
            widened = true;
        }
        if value > self.max {
            self.max = value;
            widened = true;
        }
        widened
    }

    /// Position of `value` within the bounds; 0.0 when the range is degenerate
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            return 0.0;
        }
        let ratio = if span.is_finite() {
            (value - self.min) / span
        } else {
            // Extremes near f64::MAX overflow the plain difference
            (value / 2.0 - self.min / 2.0) / (self.max / 2.0 - self.min / 2.0)
        };
        if ratio.is_nan() {
            return 0.0;
        }
        ratio.clamp(0.0, 1.0)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Bounds table holding the adaptive range of every known signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsTable {
    bounds: BTreeMap<Signal, SignalBounds>,
}

impl Default for BoundsTable {
    fn default() -> Self {
        Self::seeded()
    }
}

impl BoundsTable {
    /// Create a table with the registry's seed bounds for every known signal
    pub fn seeded() -> Self {
        let bounds = Signal::ALL
            .iter()
            .map(|&signal| {
                let (min, max) = signal.seed_bounds();
                (signal, SignalBounds::new(min, max))
            })
            .collect();
        Self { bounds }
    }

    /// Current bounds for a signal
    pub fn get(&self, signal: Signal) -> SignalBounds {
        self.bounds.get(&signal).copied().unwrap_or_else(|| {
            let (min, max) = signal.seed_bounds();
            SignalBounds::new(min, max)
        })
    }

    /// Replace the bounds for a signal, rejecting inverted or non-finite ranges
    pub fn set(&mut self, signal: Signal, bounds: SignalBounds) -> Result<(), ScoreError> {
        validate(signal, &bounds)?;
        self.bounds.insert(signal, bounds);
        Ok(())
    }

    /// Widen the signal's bounds to include `raw` and return its normalized value.
    ///
    /// The bounds are updated before the ratio is taken, so the result is
    /// always within [0, 1].
    pub fn observe_and_normalize(&mut self, signal: Signal, raw: f64) -> f64 {
        let entry = self.bounds.entry(signal).or_insert_with(|| {
            let (min, max) = signal.seed_bounds();
            SignalBounds::new(min, max)
        });

        if entry.observe(raw) {
            debug!(
                signal = signal.name(),
                value = raw,
                min = entry.min,
                max = entry.max,
                "signal bounds widened"
            );
        }

        entry.normalize(raw)
    }

    /// Iterate over (signal, bounds) pairs in registry order
    pub fn iter(&self) -> impl Iterator<Item = (Signal, SignalBounds)> + '_ {
        self.bounds.iter().map(|(s, b)| (*s, *b))
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Drop every observation and return to seed bounds
    pub fn reset(&mut self) {
        *self = Self::seeded();
    }

    /// Load a bounds table from JSON.
    ///
    /// Signals missing from the document fall back to their seed bounds.
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let loaded: BoundsTable = serde_json::from_str(json)?;
        let mut table = Self::seeded();
        for (signal, bounds) in loaded.bounds {
            table.set(signal, bounds)?;
        }
        Ok(table)
    }

    /// Serialize the bounds table to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn validate(signal: Signal, bounds: &SignalBounds) -> Result<(), ScoreError> {
    if !bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min > bounds.max {
        return Err(ScoreError::InvalidBounds {
            signal: signal.name().to_string(),
            min: bounds.min,
            max: bounds.max,
        });
    }
    Ok(())
}
