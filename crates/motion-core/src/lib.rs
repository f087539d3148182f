//! motion-core: pose composition and command dispatch for an expressive robot head
//!
//! Drives head orientation, two antennas and body yaw from three kinds of
//! sources: recorded keyframe animations ("emotions"), an idle breathing
//! animation, and reactive secondary offsets (face tracking, speech wobble,
//! audio direction of arrival). Everything is fused by a fixed-rate control
//! loop into one clamped, rate-limited, dead-zone filtered command stream.
//!
//! # Modules
//!
//! - [`math`] - Offset/pose algebra, rotation matrix helpers, filters
//! - [`animation`] - Emotion assets and the keyframe evaluator
//! - [`moves`] - Primary motion sources as functions of elapsed time
//! - [`audio`] - Speech-synchronized head wobble DSP
//! - [`tracking`] - Face tracking and direction-of-arrival corrections
//! - [`control`] - Fixed-rate loop and the movement manager
//! - [`hardware`] - The "set pose" command sink boundary
//! - [`config`] - Tunables and TOML loading
//!
//! # Architecture
//!
//! ```text
//!  Move ──────────────► primary pose ─┐
//!                                     ├─► clamp ─► step limit ─► dead zone ─► PoseSink
//!  wobbler/tracker/doa ─► secondary ──┘
//! ```
//!
//! Producers only write through short lock-protected setters on
//! [`MovementManager`]; the control loop thread is the only caller of the
//! sink.

#![warn(unused_must_use)]

pub mod animation;
pub mod audio;
pub mod config;
pub mod control;
pub mod hardware;
pub mod math;
pub mod moves;
pub mod tracking;

// Re-exports for convenience
pub use animation::{Emotion, EmotionLibrary, Keyframe};
pub use audio::{SpeechWobbler, WobblerConfig};
pub use config::MotionConfig;
pub use control::{
    ControlLoop, ControlLoopConfig, ControlLoopHandle, Diagnostics, DirectPoseControl,
    ManagerConfig, MovementManager, SecondaryOffsets,
};
pub use hardware::{ChannelSink, MockSink, PoseCommand, PoseSink};
pub use math::{Offset, OffsetLimits, Pose, PoseLimits};
pub use moves::{BreathingMove, EmotionMove, IdleMove, InterpolatedMove, Move};
pub use tracking::{DoaClient, DoaReading, FaceTracker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for motion-core
///
/// Asset and configuration errors surface synchronously at load time.
/// Hardware errors are returned by [`PoseSink`] implementations and are
/// absorbed (counted and logged) by the control loop.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors must be handled or explicitly ignored with let _ = ..."]
#[non_exhaustive]
pub enum Error {
    /// An emotion asset contained no keyframes.
    #[error("Emotion '{0}' has no keyframes")]
    EmptyAnimation(String),

    /// Timestamp and keyframe arrays differ in length.
    #[error("Emotion '{name}': {timestamps} timestamps for {keyframes} keyframes")]
    KeyframeMismatch {
        /// Emotion name
        name: String,
        /// Number of timestamps
        timestamps: usize,
        /// Number of keyframes
        keyframes: usize,
    },

    /// A timestamp was NaN or infinite.
    #[error("Emotion '{name}': timestamp {index} is not finite")]
    InvalidTimestamp {
        /// Emotion name
        name: String,
        /// Offending index
        index: usize,
    },

    /// Any other malformed asset content.
    #[error("Asset error: {0}")]
    Asset(String),

    /// Requested emotion is not in the library.
    #[error("Unknown emotion: {0}")]
    UnknownEmotion(String),

    /// Hardware-level error from the pose sink.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Invalid configuration file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Control loop start/stop error.
    #[error("Control loop error: {0}")]
    ControlLoop(String),

    /// Communication channel was closed unexpectedly.
    #[error("Channel closed")]
    ChannelClosed,

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type alias for motion-core operations
pub type Result<T> = std::result::Result<T, Error>;
