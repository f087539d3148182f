//! Homogeneous transform helpers for keyframe head matrices
//!
//! Keyframes store the head as a 4x4 homogeneous transform. Blending two
//! rotations element-wise leaves the rotation block slightly skewed, so every
//! blended matrix goes through [`orthonormalize`] before angles are read back.

use nalgebra::Rotation3;

use super::{Matrix3, Matrix4, Offset, Vector3};

/// Columns shorter than this are treated as degenerate
const DEGENERATE_NORM: f64 = 1e-9;

/// `cos(pitch)` below this is treated as gimbal lock
const GIMBAL_EPSILON: f64 = 1e-6;

/// Build a homogeneous transform from roll/pitch/yaw and a translation
///
/// Rotation order is ZYX: `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn pose_matrix(head: &Offset, translation: [f64; 3]) -> Matrix4 {
    let rot = Rotation3::from_euler_angles(head.roll, head.pitch, head.yaw);
    let mut m = rot.to_homogeneous();
    m[(0, 3)] = translation[0];
    m[(1, 3)] = translation[1];
    m[(2, 3)] = translation[2];
    m
}

/// Translation part of a homogeneous transform
#[inline]
pub fn translation(m: &Matrix4) -> [f64; 3] {
    [m[(0, 3)], m[(1, 3)], m[(2, 3)]]
}

/// Rotation block of a homogeneous transform
#[inline]
pub fn rotation_block(m: &Matrix4) -> Matrix3 {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Element-wise linear blend of two matrices
#[inline]
pub fn lerp_matrix(a: &Matrix4, b: &Matrix4, t: f64) -> Matrix4 {
    a + (b - a) * t
}

/// Pick a unit vector orthogonal to `v` (which must be unit length)
fn any_orthogonal(v: &Vector3) -> Vector3 {
    let candidate = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let ortho = candidate - v * v.dot(&candidate);
    ortho.normalize()
}

/// Restore the rotation block of `m` to a proper rotation
///
/// Column 0 is normalized, column 1 is Gram-Schmidt orthogonalized against
/// it and normalized, and column 2 is their cross product. Translation and
/// the bottom row are kept as-is (bottom row reset to `[0, 0, 0, 1]`).
pub fn orthonormalize(m: &Matrix4) -> Matrix4 {
    let c0 = Vector3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
    let c1 = Vector3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]);

    let x = match c0.try_normalize(DEGENERATE_NORM) {
        Some(x) if x.iter().all(|v| v.is_finite()) => x,
        _ => Vector3::x(),
    };

    let y = match (c1 - x * x.dot(&c1)).try_normalize(DEGENERATE_NORM) {
        Some(y) if y.iter().all(|v| v.is_finite()) => y,
        _ => any_orthogonal(&x),
    };

    let z = x.cross(&y);

    let mut out = Matrix4::identity();
    for row in 0..3 {
        out[(row, 0)] = x[row];
        out[(row, 1)] = y[row];
        out[(row, 2)] = z[row];
        out[(row, 3)] = if m[(row, 3)].is_finite() { m[(row, 3)] } else { 0.0 };
    }
    out
}

/// Decompose a rotation block into roll/pitch/yaw (ZYX)
///
/// Near ±90° pitch the yaw and roll axes align; yaw is then pinned to zero
/// and roll absorbs the remaining rotation.
pub fn rotation_to_rpy(r: &Matrix3) -> Offset {
    let sin_pitch = (-r[(2, 0)]).clamp(-1.0, 1.0);
    let pitch = sin_pitch.asin();

    if pitch.cos() > GIMBAL_EPSILON {
        let roll = r[(2, 1)].atan2(r[(2, 2)]);
        let yaw = r[(1, 0)].atan2(r[(0, 0)]);
        Offset::new(roll, pitch, yaw)
    } else {
        let roll = (-r[(1, 2)]).atan2(r[(1, 1)]);
        Offset::new(roll, pitch, 0.0)
    }
}

/// Roll/pitch/yaw of a homogeneous transform
#[inline]
pub fn matrix_to_rpy(m: &Matrix4) -> Offset {
    let rpy = rotation_to_rpy(&rotation_block(m));
    if rpy.is_finite() {
        rpy
    } else {
        Offset::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn assert_orthonormal(m: &Matrix4) {
        let r = rotation_block(m);
        for i in 0..3 {
            assert_relative_eq!(r.column(i).norm(), 1.0, epsilon = 1e-9);
            for j in (i + 1)..3 {
                assert_relative_eq!(r.column(i).dot(&r.column(j)), 0.0, epsilon = 1e-9);
            }
        }
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rpy_roundtrip() {
        let head = Offset::new(0.1, -0.2, 0.3);
        let m = pose_matrix(&head, [0.0, 0.0, 0.01]);
        let back = matrix_to_rpy(&m);
        assert_relative_eq!(back.roll, 0.1, epsilon = 1e-10);
        assert_relative_eq!(back.pitch, -0.2, epsilon = 1e-10);
        assert_relative_eq!(back.yaw, 0.3, epsilon = 1e-10);
        assert_relative_eq!(translation(&m)[2], 0.01);
    }

    #[test]
    fn test_orthonormalize_restores_rotation() {
        let a = pose_matrix(&Offset::new(0.4, 0.1, -1.2), [0.0; 3]);
        let b = pose_matrix(&Offset::new(-0.3, 0.5, 1.4), [0.0; 3]);
        for &t in &[0.1, 0.5, 0.9] {
            let blended = lerp_matrix(&a, &b, t);
            assert_orthonormal(&orthonormalize(&blended));
        }

        // Heavy drift: scaled and sheared columns
        let mut drifted = a;
        drifted[(0, 0)] *= 7.5;
        drifted[(1, 1)] += 0.8;
        drifted[(2, 0)] -= 0.4;
        assert_orthonormal(&orthonormalize(&drifted));
    }

    #[test]
    fn test_orthonormalize_degenerate_columns() {
        let zero = Matrix4::zeros();
        let fixed = orthonormalize(&zero);
        assert_orthonormal(&fixed);

        // Column 1 parallel to column 0
        let mut parallel = Matrix4::identity();
        parallel[(0, 1)] = 1.0;
        parallel[(1, 1)] = 0.0;
        assert_orthonormal(&orthonormalize(&parallel));
    }

    #[test]
    fn test_gimbal_lock_pins_yaw() {
        let m = pose_matrix(&Offset::new(0.0, FRAC_PI_2, 0.7), [0.0; 3]);
        let rpy = matrix_to_rpy(&m);
        assert_relative_eq!(rpy.pitch, FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(rpy.yaw, 0.0);
        assert!(rpy.roll.is_finite());
    }
}
