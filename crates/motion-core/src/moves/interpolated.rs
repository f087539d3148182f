//! Eased transition between two poses

use crate::math::{smoothstep, Pose};

/// Smooth transition from `start` to `end` over a fixed duration
///
/// Uses the smoothstep curve so velocity is zero at both ends. At and after
/// the duration the end pose is returned exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedMove {
    start: Pose,
    end: Pose,
    duration: f64,
    name: String,
}

impl InterpolatedMove {
    /// Transition from `start` to `end` over `duration` seconds
    ///
    /// Negative or non-finite durations are treated as zero.
    pub fn new(start: Pose, end: Pose, duration: f64) -> Self {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        Self {
            start,
            end,
            duration,
            name: "goto".to_string(),
        }
    }

    /// Override the reported name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Move name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start pose
    pub fn start(&self) -> &Pose {
        &self.start
    }

    /// End pose
    pub fn end(&self) -> &Pose {
        &self.end
    }

    /// Transition length in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Pose at `elapsed` seconds
    pub fn evaluate(&self, elapsed: f64) -> Pose {
        if self.is_complete(elapsed) {
            return self.end;
        }
        if !(elapsed > 0.0) {
            return self.start;
        }
        self.start.lerp(&self.end, smoothstep(elapsed / self.duration))
    }

    /// Whether the transition has finished
    pub fn is_complete(&self, elapsed: f64) -> bool {
        elapsed >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Offset;
    use approx::assert_relative_eq;

    fn poses() -> (Pose, Pose) {
        (
            Pose::new(Offset::new(0.0, 0.0, -0.4), [0.0, 0.0], 0.0),
            Pose::new(Offset::new(0.2, -0.1, 0.4), [1.0, -1.0], 0.5),
        )
    }

    #[test]
    fn test_endpoints() {
        let (a, b) = poses();
        let m = InterpolatedMove::new(a, b, 2.0);
        assert_eq!(m.evaluate(0.0), a);
        assert_eq!(m.evaluate(-1.0), a);
        assert_eq!(m.evaluate(2.0), b);
        assert_eq!(m.evaluate(10.0), b);
        assert!(!m.is_complete(1.99));
        assert!(m.is_complete(2.0));
    }

    #[test]
    fn test_midpoint_and_easing() {
        let (a, b) = poses();
        let m = InterpolatedMove::new(a, b, 2.0);
        let mid = m.evaluate(1.0);
        assert_relative_eq!(mid.head.yaw, 0.0, epsilon = 1e-12);
        assert_relative_eq!(mid.body_yaw, 0.25, epsilon = 1e-12);

        // Eased: slower than linear near the start
        let early = m.evaluate(0.2);
        assert!(early.body_yaw < 0.5 * 0.1);
    }

    #[test]
    fn test_zero_duration() {
        let (a, b) = poses();
        let m = InterpolatedMove::new(a, b, -3.0);
        assert_eq!(m.duration(), 0.0);
        assert!(m.is_complete(0.0));
        assert_eq!(m.evaluate(0.0), b);
    }
}
