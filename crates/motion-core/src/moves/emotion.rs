//! Keyframe emotion playback

use std::sync::Arc;

use crate::animation::{evaluate_with_limits, Emotion};
use crate::math::{OffsetLimits, Pose};

/// Plays an [`Emotion`] from its first keyframe to its last
#[derive(Debug, Clone)]
pub struct EmotionMove {
    emotion: Arc<Emotion>,
    limits: OffsetLimits,
}

impl EmotionMove {
    /// Play `emotion` with the default emotion head limits
    pub fn new(emotion: Arc<Emotion>) -> Self {
        Self {
            emotion,
            limits: OffsetLimits::EMOTION,
        }
    }

    /// Override the head limits applied during playback
    pub fn with_limits(mut self, limits: OffsetLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The underlying animation
    pub fn emotion(&self) -> &Arc<Emotion> {
        &self.emotion
    }

    /// Pose at `elapsed` seconds
    pub fn evaluate(&self, elapsed: f64) -> Pose {
        evaluate_with_limits(&self.emotion, elapsed, &self.limits)
    }

    /// Whether playback has reached the last keyframe
    pub fn is_complete(&self, elapsed: f64) -> bool {
        elapsed >= self.emotion.duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Keyframe;
    use crate::math::Offset;
    use approx::assert_relative_eq;

    #[test]
    fn test_plays_and_completes() {
        let emotion = Emotion::new(
            "wave",
            "antenna wave",
            vec![0.0, 1.5],
            vec![
                Keyframe::default(),
                Keyframe::from_pose(&Pose::new(Offset::ZERO, [0.8, -0.8], 0.0)),
            ],
        )
        .unwrap();
        let m = EmotionMove::new(Arc::new(emotion));

        assert!(!m.is_complete(1.0));
        assert!(m.is_complete(1.5));
        assert_relative_eq!(m.evaluate(0.75).antennas[0], 0.4, epsilon = 1e-12);
        assert_relative_eq!(m.evaluate(3.0).antennas[1], -0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_custom_limits() {
        let emotion = Emotion::new(
            "look",
            "",
            vec![0.0],
            vec![Keyframe::from_pose(&Pose::from_head(Offset::new(0.0, 0.0, 0.5)))],
        )
        .unwrap();
        let m = EmotionMove::new(Arc::new(emotion)).with_limits(OffsetLimits::new(0.1, 0.1, 0.1));
        assert_relative_eq!(m.evaluate(0.0).head.yaw, 0.1);
    }
}
