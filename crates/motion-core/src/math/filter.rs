//! Smoothing filters for reactive offsets
//!
//! Tracking and direction-of-arrival corrections arrive at irregular rates
//! and with jitter; they are smoothed before being handed to the manager.

use serde::{Deserialize, Serialize};

use super::Offset;

/// Trait for scalar digital filters
pub trait Filter: Send + Sync {
    /// Update the filter with a new value and return the filtered output
    fn update(&mut self, value: f64) -> f64;

    /// Reset the filter state
    fn reset(&mut self);

    /// Get the current filtered value without updating
    fn value(&self) -> f64;
}

/// First-order low-pass filter (exponential moving average)
///
/// Out-of-range coefficients are clamped into `[0, 1]` rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowPassFilter {
    /// Filter coefficient (0-1). Lower = more smoothing.
    alpha: f64,
    /// Current filtered value
    value: f64,
    /// Whether the filter has seen a sample
    initialized: bool,
}

impl LowPassFilter {
    /// Create a new low-pass filter with the given alpha coefficient
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: sanitize_alpha(alpha),
            value: 0.0,
            initialized: false,
        }
    }

    /// Create a filter from a time constant and the update interval
    ///
    /// `alpha = dt / (tau + dt)`; a zero time constant passes samples through.
    pub fn from_time_constant(tau_secs: f64, dt_secs: f64) -> Self {
        if !(tau_secs > 0.0) {
            return Self::new(1.0);
        }
        Self::new(dt_secs / (tau_secs + dt_secs))
    }

    /// Get the alpha coefficient
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Move the filter toward `target` as if `target` had been sampled
    ///
    /// Unlike [`Filter::update`] the first call does not jump straight to the
    /// target, so a filter started at 0 ramps in smoothly.
    pub fn approach(&mut self, target: f64) -> f64 {
        self.initialized = true;
        self.value += self.alpha * (target - self.value);
        self.value
    }
}

fn sanitize_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() {
        1.0
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

impl Filter for LowPassFilter {
    fn update(&mut self, value: f64) -> f64 {
        if !self.initialized {
            self.value = value;
            self.initialized = true;
        } else {
            self.value = self.alpha * value + (1.0 - self.alpha) * self.value;
        }
        self.value
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.initialized = false;
    }

    fn value(&self) -> f64 {
        self.value
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new(0.1)
    }
}

/// Three low-pass filters, one per head axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetFilter {
    roll: LowPassFilter,
    pitch: LowPassFilter,
    yaw: LowPassFilter,
}

impl OffsetFilter {
    /// Create with the same coefficient on each axis
    pub fn new(alpha: f64) -> Self {
        Self {
            roll: LowPassFilter::new(alpha),
            pitch: LowPassFilter::new(alpha),
            yaw: LowPassFilter::new(alpha),
        }
    }

    /// Ramp toward `target` from the current value
    pub fn approach(&mut self, target: Offset) -> Offset {
        Offset::new(
            self.roll.approach(target.roll),
            self.pitch.approach(target.pitch),
            self.yaw.approach(target.yaw),
        )
    }

    /// Current filtered offset
    pub fn value(&self) -> Offset {
        Offset::new(self.roll.value(), self.pitch.value(), self.yaw.value())
    }

    /// Reset all axes to zero
    pub fn reset(&mut self) {
        self.roll.reset();
        self.pitch.reset();
        self.yaw.reset();
    }
}
