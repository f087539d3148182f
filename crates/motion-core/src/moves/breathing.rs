//! Idle breathing animation

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

use crate::config::{non_negative, positive_or};
use crate::math::{Offset, Pose};

/// Breathing amplitudes and rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    /// Head breathing rate in Hz
    pub frequency_hz: f64,
    /// Pitch amplitude in radians
    pub pitch_amplitude: f64,
    /// Roll amplitude in radians
    pub roll_amplitude: f64,
    /// Antenna sway rate in Hz
    pub antenna_frequency_hz: f64,
    /// Antenna sway amplitude in radians
    pub antenna_amplitude: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 0.2,
            pitch_amplitude: 0.03,
            roll_amplitude: 0.012,
            antenna_frequency_hz: 0.5,
            antenna_amplitude: 0.26,
        }
    }
}

impl BreathingConfig {
    /// Set the head breathing rate
    pub fn with_frequency(mut self, hz: f64) -> Self {
        self.frequency_hz = hz;
        self
    }

    /// Set the antenna sway amplitude
    pub fn with_antenna_amplitude(mut self, radians: f64) -> Self {
        self.antenna_amplitude = radians;
        self
    }

    /// Clamp into usable ranges
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            frequency_hz: positive_or(self.frequency_hz, d.frequency_hz).min(5.0),
            pitch_amplitude: non_negative(self.pitch_amplitude).min(0.2),
            roll_amplitude: non_negative(self.roll_amplitude).min(0.2),
            antenna_frequency_hz: positive_or(self.antenna_frequency_hz, d.antenna_frequency_hz)
                .min(5.0),
            antenna_amplitude: non_negative(self.antenna_amplitude).min(1.0),
        }
    }
}

/// Continuous breathing around a base pose
///
/// A pure function of elapsed time; never completes.
#[derive(Debug, Clone, PartialEq)]
pub struct BreathingMove {
    base: Pose,
    config: BreathingConfig,
}

impl BreathingMove {
    /// Breathe around `base`
    pub fn new(base: Pose, config: BreathingConfig) -> Self {
        Self {
            base,
            config: config.sanitized(),
        }
    }

    /// Pose the breathing oscillates around
    pub fn base(&self) -> &Pose {
        &self.base
    }

    /// Pose at `elapsed` seconds
    pub fn evaluate(&self, elapsed: f64) -> Pose {
        let t = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        let c = &self.config;

        let breath = TAU * c.frequency_hz * t;
        let sway = (TAU * c.antenna_frequency_hz * t).sin() * c.antenna_amplitude;

        let head = self.base.head
            + Offset::new(
                c.roll_amplitude * (breath + FRAC_PI_2).sin(),
                c.pitch_amplitude * breath.sin(),
                0.0,
            );

        Pose {
            head,
            antennas: [self.base.antennas[0] + sway, self.base.antennas[1] - sway],
            body_yaw: self.base.body_yaw,
        }
    }
}

impl Default for BreathingMove {
    fn default() -> Self {
        Self::new(Pose::NEUTRAL, BreathingConfig::default())
    }
}
