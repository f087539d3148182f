//! Math utilities: offset/pose algebra, rotation matrices, and filters
//!
//! Matrix types come from nalgebra; head orientation is carried around as a
//! plain roll/pitch/yaw [`Offset`] once it leaves the keyframe evaluator.

mod filter;
mod offset;
pub mod rotation;

pub use filter::{Filter, LowPassFilter, OffsetFilter};
pub use offset::{clamp_symmetric, step_toward, Offset, OffsetLimits, Pose, PoseLimits};

/// Type alias for 3D vectors
pub type Vector3 = nalgebra::Vector3<f64>;

/// Type alias for 4x4 matrices
pub type Matrix4 = nalgebra::Matrix4<f64>;

/// Type alias for 3x3 rotation matrices
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Linearly interpolate between two values
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Smoothstep ease curve `3t² − 2t³`, with `t` clamped to `[0, 1]`
#[inline]
pub fn smoothstep(t: f64) -> f64 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    t * t * (3.0 - 2.0 * t)
}
