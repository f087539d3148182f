//! Per-tick step limiting and dead-zone filtering
//!
//! Both compare against the last pose actually *sent* to hardware, never the
//! last computed target, so a failed send is retried from the right
//! reference.

use serde::{Deserialize, Serialize};

use crate::config::positive_or;
use crate::math::{step_toward, Pose};

/// Maximum change per tick for each channel, in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepLimits {
    /// Max step on any head axis
    pub head: f64,
    /// Max step on each antenna
    pub antenna: f64,
    /// Max step on body yaw
    pub body_yaw: f64,
}

impl Default for StepLimits {
    fn default() -> Self {
        // At 100 Hz: 5 rad/s head, 15 rad/s antennas, 3 rad/s body
        Self {
            head: 0.05,
            antenna: 0.15,
            body_yaw: 0.03,
        }
    }
}

impl StepLimits {
    /// Same limit on every channel
    pub fn uniform(step: f64) -> Self {
        Self {
            head: step,
            antenna: step,
            body_yaw: step,
        }
    }

    /// Replace non-positive or non-finite steps with defaults
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            head: positive_or(self.head, d.head),
            antenna: positive_or(self.antenna, d.antenna),
            body_yaw: positive_or(self.body_yaw, d.body_yaw),
        }
    }

    /// Move from `last` toward `target`, each axis by at most its step
    ///
    /// Axes already within one step land exactly on the target.
    pub fn limit(&self, last: &Pose, target: &Pose) -> Pose {
        Pose {
            head: last.head.step_toward(&target.head, self.head),
            antennas: [
                step_toward(last.antennas[0], target.antennas[0], self.antenna),
                step_toward(last.antennas[1], target.antennas[1], self.antenna),
            ],
            body_yaw: step_toward(last.body_yaw, target.body_yaw, self.body_yaw),
        }
    }

    /// Whether any axis of `target` is more than one step away from `last`
    pub fn exceeds(&self, last: &Pose, target: &Pose) -> bool {
        last.head.max_abs_diff(&target.head) > self.head
            || last.antenna_diff(target) > self.antenna
            || (last.body_yaw - target.body_yaw).abs() > self.body_yaw
    }
}

/// Thresholds below which a change is not worth transmitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadZone {
    /// Head threshold in radians (any axis)
    pub head: f64,
    /// Antenna threshold in radians
    pub antenna: f64,
    /// Body yaw threshold in radians
    pub body_yaw: f64,
}

impl Default for DeadZone {
    fn default() -> Self {
        Self {
            head: 0.002,
            antenna: 0.005,
            body_yaw: 0.002,
        }
    }
}

impl DeadZone {
    /// Replace negative or non-finite thresholds with zero
    pub fn sanitized(self) -> Self {
        let fix = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            head: fix(self.head),
            antenna: fix(self.antenna),
            body_yaw: fix(self.body_yaw),
        }
    }

    /// Whether `candidate` differs from `last_sent` by less than every threshold
    pub fn suppresses(&self, last_sent: &Pose, candidate: &Pose) -> bool {
        last_sent.head.max_abs_diff(&candidate.head) < self.head
            && last_sent.antenna_diff(candidate) < self.antenna
            && (last_sent.body_yaw - candidate.body_yaw).abs() < self.body_yaw
    }
}
