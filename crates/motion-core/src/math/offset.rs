//! Offset and pose value types
//!
//! [`Offset`] is an additive rotational delta for the head. [`Pose`] is the
//! complete instantaneous target: head rotation, both antennas and body yaw.
//! Both are `Copy` and built fresh every tick.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use super::lerp;

/// Clamp a value into `[-limit, limit]`, mapping non-finite input to 0.
#[inline]
pub fn clamp_symmetric(value: f64, limit: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if limit.is_nan() {
        return 0.0;
    }
    let limit = limit.abs();
    value.clamp(-limit, limit)
}

/// Move `current` toward `target` by at most `max_step`.
#[inline]
pub fn step_toward(current: f64, target: f64, max_step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

/// Additive head rotation in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    /// Rotation about the forward axis
    pub roll: f64,
    /// Rotation about the lateral axis (positive looks down)
    pub pitch: f64,
    /// Rotation about the vertical axis
    pub yaw: f64,
}

impl Offset {
    /// No rotation
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create an offset from roll, pitch and yaw
    #[inline]
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Create an offset from degrees
    pub fn from_degrees(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
    }

    /// Whether every component is finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.roll.is_finite() && self.pitch.is_finite() && self.yaw.is_finite()
    }

    /// Restrict each axis to the given limits
    #[inline]
    pub fn clamped(&self, limits: &OffsetLimits) -> Self {
        limits.clamp(*self)
    }

    /// Largest absolute per-axis difference to `other`
    #[inline]
    pub fn max_abs_diff(&self, other: &Offset) -> f64 {
        (self.roll - other.roll)
            .abs()
            .max((self.pitch - other.pitch).abs())
            .max((self.yaw - other.yaw).abs())
    }

    /// Per-axis linear interpolation
    #[inline]
    pub fn lerp(&self, other: &Offset, t: f64) -> Self {
        Self::new(
            lerp(self.roll, other.roll, t),
            lerp(self.pitch, other.pitch, t),
            lerp(self.yaw, other.yaw, t),
        )
    }

    /// Move each axis toward `target` by at most `max_step`
    #[inline]
    pub fn step_toward(&self, target: &Offset, max_step: f64) -> Self {
        Self::new(
            step_toward(self.roll, target.roll, max_step),
            step_toward(self.pitch, target.pitch, max_step),
            step_toward(self.yaw, target.yaw, max_step),
        )
    }
}

impl Add for Offset {
    type Output = Offset;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.roll + rhs.roll, self.pitch + rhs.pitch, self.yaw + rhs.yaw)
    }
}

impl AddAssign for Offset {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Offset {
    type Output = Offset;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.roll - rhs.roll, self.pitch - rhs.pitch, self.yaw - rhs.yaw)
    }
}

impl Neg for Offset {
    type Output = Offset;

    #[inline]
    fn neg(self) -> Self::Output {
        Self::new(-self.roll, -self.pitch, -self.yaw)
    }
}

impl Mul<f64> for Offset {
    type Output = Offset;

    #[inline]
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.roll * rhs, self.pitch * rhs, self.yaw * rhs)
    }
}

impl std::iter::Sum for Offset {
    fn sum<I: Iterator<Item = Offset>>(iter: I) -> Self {
        iter.fold(Offset::ZERO, |acc, o| acc + o)
    }
}

/// Symmetric per-axis head limits in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetLimits {
    /// Max |roll|
    pub roll: f64,
    /// Max |pitch|
    pub pitch: f64,
    /// Max |yaw|
    pub yaw: f64,
}

impl OffsetLimits {
    /// Absolute hardware range (±20°, ±30°, ±40°)
    pub const HARDWARE: Self = Self::new(0.35, 0.52, 0.70);

    /// Tighter range applied to keyframe playback
    pub const EMOTION: Self = Self::new(0.30, 0.45, 0.60);

    /// Create limits from per-axis magnitudes
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Clamp an offset into these limits
    #[inline]
    pub fn clamp(&self, offset: Offset) -> Offset {
        Offset::new(
            clamp_symmetric(offset.roll, self.roll),
            clamp_symmetric(offset.pitch, self.pitch),
            clamp_symmetric(offset.yaw, self.yaw),
        )
    }
}

impl Default for OffsetLimits {
    fn default() -> Self {
        Self::HARDWARE
    }
}

/// Complete target state of the robot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Head rotation
    pub head: Offset,
    /// Antenna angles (left, right) in radians
    pub antennas: [f64; 2],
    /// Body rotation about the vertical axis in radians
    pub body_yaw: f64,
}

impl Pose {
    /// Everything centered
    pub const NEUTRAL: Self = Self {
        head: Offset::ZERO,
        antennas: [0.0, 0.0],
        body_yaw: 0.0,
    };

    /// Create a pose
    pub const fn new(head: Offset, antennas: [f64; 2], body_yaw: f64) -> Self {
        Self {
            head,
            antennas,
            body_yaw,
        }
    }

    /// Pose with only the head set
    pub const fn from_head(head: Offset) -> Self {
        Self {
            head,
            antennas: [0.0, 0.0],
            body_yaw: 0.0,
        }
    }

    /// Copy of this pose with a different head rotation
    #[inline]
    pub fn with_head(mut self, head: Offset) -> Self {
        self.head = head;
        self
    }

    /// Copy of this pose with different antennas
    #[inline]
    pub fn with_antennas(mut self, antennas: [f64; 2]) -> Self {
        self.antennas = antennas;
        self
    }

    /// Copy of this pose with a different body yaw
    #[inline]
    pub fn with_body_yaw(mut self, body_yaw: f64) -> Self {
        self.body_yaw = body_yaw;
        self
    }

    /// Linear interpolation of every channel
    pub fn lerp(&self, other: &Pose, t: f64) -> Pose {
        Pose {
            head: self.head.lerp(&other.head, t),
            antennas: [
                lerp(self.antennas[0], other.antennas[0], t),
                lerp(self.antennas[1], other.antennas[1], t),
            ],
            body_yaw: lerp(self.body_yaw, other.body_yaw, t),
        }
    }

    /// Largest absolute antenna difference to `other`
    #[inline]
    pub fn antenna_diff(&self, other: &Pose) -> f64 {
        (self.antennas[0] - other.antennas[0])
            .abs()
            .max((self.antennas[1] - other.antennas[1]).abs())
    }

    /// Largest absolute difference to `other` over every channel
    pub fn max_step_to(&self, other: &Pose) -> f64 {
        self.head
            .max_abs_diff(&other.head)
            .max(self.antenna_diff(other))
            .max((self.body_yaw - other.body_yaw).abs())
    }

    /// Whether every channel is finite
    pub fn is_finite(&self) -> bool {
        self.head.is_finite()
            && self.antennas.iter().all(|a| a.is_finite())
            && self.body_yaw.is_finite()
    }
}

/// Absolute hardware safety limits for a full pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseLimits {
    /// Head rotation limits
    pub head: OffsetLimits,
    /// Max |antenna| in radians
    pub antenna: f64,
    /// Max |body_yaw| in radians
    pub body_yaw: f64,
}

impl Default for PoseLimits {
    fn default() -> Self {
        Self {
            head: OffsetLimits::HARDWARE,
            antenna: 3.0,
            body_yaw: 2.8,
        }
    }
}

impl PoseLimits {
    /// Clamp every channel of `pose`
    pub fn clamp(&self, pose: Pose) -> Pose {
        Pose {
            head: self.head.clamp(pose.head),
            antennas: [
                clamp_symmetric(pose.antennas[0], self.antenna),
                clamp_symmetric(pose.antennas[1], self.antenna),
            ],
            body_yaw: clamp_symmetric(pose.body_yaw, self.body_yaw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples() -> Vec<Offset> {
        let values = [-2.0, -0.6, -0.3, -0.01, 0.0, 0.2, 0.5, 0.9, 3.5];
        let mut out = Vec::new();
        for &r in &values {
            for &p in &values {
                for &y in &[-1.0, 0.0, 0.65, 4.0] {
                    out.push(Offset::new(r, p, y));
                }
            }
        }
        out
    }

    #[test]
    fn test_clamp_idempotent_and_bounded() {
        let limits = OffsetLimits::HARDWARE;
        for o in samples() {
            let once = limits.clamp(o);
            let twice = limits.clamp(once);
            assert_eq!(once, twice);
            assert!(once.roll.abs() <= limits.roll);
            assert!(once.pitch.abs() <= limits.pitch);
            assert!(once.yaw.abs() <= limits.yaw);
        }
    }

    #[test]
    fn test_clamp_non_finite() {
        let o = Offset::new(f64::NAN, f64::INFINITY, -0.1);
        let c = OffsetLimits::HARDWARE.clamp(o);
        assert_eq!(c, Offset::new(0.0, 0.0, -0.1));
    }

    #[test]
    fn test_addition_algebra() {
        let all = samples();
        for w in all.windows(3).step_by(7) {
            let (a, b, c) = (w[0], w[1], w[2]);
            let ab = a + b;
            let ba = b + a;
            assert_relative_eq!(ab.roll, ba.roll);
            assert_relative_eq!(ab.pitch, ba.pitch);
            assert_relative_eq!(ab.yaw, ba.yaw);

            let left = (a + b) + c;
            let right = a + (b + c);
            assert_relative_eq!(left.roll, right.roll, epsilon = 1e-12);
            assert_relative_eq!(left.pitch, right.pitch, epsilon = 1e-12);
            assert_relative_eq!(left.yaw, right.yaw, epsilon = 1e-12);
        }
        assert_eq!(Offset::new(0.1, 0.2, 0.3) + Offset::ZERO, Offset::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_step_toward() {
        assert_relative_eq!(step_toward(0.0, 1.0, 0.1), 0.1);
        assert_relative_eq!(step_toward(0.0, -1.0, 0.1), -0.1);
        assert_eq!(step_toward(0.95, 1.0, 0.1), 1.0);
    }

    #[test]
    fn test_pose_clamp() {
        let limits = PoseLimits::default();
        let pose = Pose::new(Offset::new(1.0, -1.0, 0.1), [5.0, -5.0], -9.0);
        let c = limits.clamp(pose);
        assert_relative_eq!(c.head.roll, 0.35);
        assert_relative_eq!(c.head.pitch, -0.52);
        assert_relative_eq!(c.head.yaw, 0.1);
        assert_eq!(c.antennas, [3.0, -3.0]);
        assert_relative_eq!(c.body_yaw, -2.8);
    }

    #[test]
    fn test_pose_lerp_mean() {
        let a = Pose::new(Offset::new(0.0, 0.2, -0.2), [0.0, 1.0], 0.5);
        let b = Pose::new(Offset::new(0.2, 0.0, 0.2), [1.0, 0.0], -0.5);
        let m = a.lerp(&b, 0.5);
        assert_relative_eq!(m.head.roll, 0.1);
        assert_relative_eq!(m.head.pitch, 0.1);
        assert_relative_eq!(m.head.yaw, 0.0);
        assert_relative_eq!(m.antennas[0], 0.5);
        assert_relative_eq!(m.body_yaw, 0.0);
    }

    #[test]
    fn test_pose_max_step() {
        let a = Pose::new(Offset::new(0.0, 0.1, 0.0), [0.0, 0.0], 0.0);
        assert_eq!(a.max_step_to(&a), 0.0);
        assert_relative_eq!(a.max_step_to(&a.with_antennas([0.0, -0.3])), 0.3);
        assert_relative_eq!(a.max_step_to(&a.with_body_yaw(0.2)), 0.2);
        assert_relative_eq!(a.max_step_to(&Pose::NEUTRAL), 0.1);
    }
}
