//! Primary motion sources
//!
//! A [`Move`] is a pose as a function of time elapsed since it was
//! installed. The set of variants is closed: keyframe emotions, idle
//! breathing, a static hold, and an eased transition.

mod breathing;
mod emotion;
mod interpolated;

pub use breathing::{BreathingConfig, BreathingMove};
pub use emotion::EmotionMove;
pub use interpolated::InterpolatedMove;

use std::sync::Arc;

use crate::animation::Emotion;
use crate::math::Pose;

/// Holds a fixed pose forever
#[derive(Debug, Clone, PartialEq)]
pub struct IdleMove {
    pose: Pose,
}

impl IdleMove {
    /// Hold `pose`
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }

    /// The held pose
    pub fn pose(&self) -> Pose {
        self.pose
    }
}

/// A primary motion source
#[derive(Debug, Clone)]
pub enum Move {
    /// Keyframe emotion playback
    Emotion(EmotionMove),
    /// Continuous breathing
    Breathing(BreathingMove),
    /// Static hold
    Idle(IdleMove),
    /// Eased transition between two poses
    Interpolated(InterpolatedMove),
}

impl Move {
    /// Play an emotion with default limits
    pub fn emotion(emotion: Arc<Emotion>) -> Self {
        Move::Emotion(EmotionMove::new(emotion))
    }

    /// Hold a pose
    pub fn idle(pose: Pose) -> Self {
        Move::Idle(IdleMove::new(pose))
    }

    /// Transition between two poses
    pub fn interpolated(start: Pose, end: Pose, duration: f64) -> Self {
        Move::Interpolated(InterpolatedMove::new(start, end, duration))
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Move::Emotion(m) => m.emotion().name(),
            Move::Breathing(_) => "breathing",
            Move::Idle(_) => "idle",
            Move::Interpolated(m) => m.name(),
        }
    }

    /// Length in seconds; zero means continuous
    pub fn duration(&self) -> f64 {
        match self {
            Move::Emotion(m) => m.emotion().duration(),
            Move::Breathing(_) | Move::Idle(_) => 0.0,
            Move::Interpolated(m) => m.duration(),
        }
    }

    /// Pose at `elapsed` seconds since the move started
    pub fn evaluate(&self, elapsed: f64) -> Pose {
        match self {
            Move::Emotion(m) => m.evaluate(elapsed),
            Move::Breathing(m) => m.evaluate(elapsed),
            Move::Idle(m) => m.pose(),
            Move::Interpolated(m) => m.evaluate(elapsed),
        }
    }

    /// Whether the move has run its course
    pub fn is_complete(&self, elapsed: f64) -> bool {
        match self {
            Move::Emotion(m) => m.is_complete(elapsed),
            Move::Breathing(_) | Move::Idle(_) => false,
            Move::Interpolated(m) => m.is_complete(elapsed),
        }
    }
}

impl From<EmotionMove> for Move {
    fn from(m: EmotionMove) -> Self {
        Move::Emotion(m)
    }
}

impl From<BreathingMove> for Move {
    fn from(m: BreathingMove) -> Self {
        Move::Breathing(m)
    }
}

impl From<IdleMove> for Move {
    fn from(m: IdleMove) -> Self {
        Move::Idle(m)
    }
}

impl From<InterpolatedMove> for Move {
    fn from(m: InterpolatedMove) -> Self {
        Move::Interpolated(m)
    }
}
