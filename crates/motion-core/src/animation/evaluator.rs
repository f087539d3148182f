//! Keyframe evaluator
//!
//! Turns an [`Emotion`]'s timestamped keyframes into a continuous pose
//! function of time: binary search for the bracketing pair, linear blend of
//! every channel, then re-orthonormalization of the blended head rotation.

use super::{Emotion, Keyframe};
use crate::math::rotation::{lerp_matrix, matrix_to_rpy, orthonormalize};
use crate::math::{lerp, OffsetLimits, Pose};

/// Blend two keyframes
///
/// `alpha` is clamped to `[0, 1]`; a non-finite alpha counts as 0.
pub fn interpolate_keyframes(a: &Keyframe, b: &Keyframe, alpha: f64) -> Keyframe {
    let alpha = if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        0.0
    };

    Keyframe {
        head: orthonormalize(&lerp_matrix(&a.head, &b.head, alpha)),
        antennas: [
            lerp(a.antennas[0], b.antennas[0], alpha),
            lerp(a.antennas[1], b.antennas[1], alpha),
        ],
        body_yaw: lerp(a.body_yaw, b.body_yaw, alpha),
        check_collision: a.check_collision || b.check_collision,
    }
}

fn pose_of(keyframe: &Keyframe, limits: &OffsetLimits) -> Pose {
    let head = limits.clamp(matrix_to_rpy(&keyframe.head));
    Pose::new(head, keyframe.antennas, keyframe.body_yaw)
}

/// Pose of `emotion` at `elapsed` seconds, head clamped to the emotion range
pub fn evaluate(emotion: &Emotion, elapsed: f64) -> Pose {
    evaluate_with_limits(emotion, elapsed, &OffsetLimits::EMOTION)
}

/// Pose of `emotion` at `elapsed` seconds with explicit head limits
pub fn evaluate_with_limits(emotion: &Emotion, elapsed: f64, limits: &OffsetLimits) -> Pose {
    let keyframes = emotion.keyframes();
    let times = emotion.timestamps();

    match keyframes.len() {
        0 => return Pose::NEUTRAL,
        1 => return pose_of(&keyframes[0], limits),
        _ => {}
    }

    // NaN elapsed lands before the first sample
    let elapsed = if elapsed.is_nan() { f64::NEG_INFINITY } else { elapsed };

    // First timestamp strictly greater than elapsed
    let next = times.partition_point(|&t| t <= elapsed);
    if next == 0 {
        return pose_of(&keyframes[0], limits);
    }
    if next >= keyframes.len() {
        return pose_of(&keyframes[keyframes.len() - 1], limits);
    }

    let prev = next - 1;
    let span = times[next] - times[prev];
    let alpha = if span > 0.0 {
        (elapsed - times[prev]) / span
    } else {
        0.0
    };

    let blended = interpolate_keyframes(&keyframes[prev], &keyframes[next], alpha);
    pose_of(&blended, limits)
}
