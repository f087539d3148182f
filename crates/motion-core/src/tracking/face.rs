//! Face tracking correction
//!
//! Maps a detected face position in normalized image coordinates to a small
//! yaw/pitch offset that turns the head toward it. When the face is lost the
//! offset is held briefly, then eases back to zero.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::{interval, interval_secs, non_negative, positive_or};
use crate::math::{clamp_symmetric, Offset, OffsetFilter};

/// Face tracking tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceTrackingConfig {
    /// Yaw per unit of horizontal image offset, in radians
    pub yaw_gain: f64,
    /// Pitch per unit of vertical image offset, in radians
    pub pitch_gain: f64,
    /// Largest yaw correction
    pub max_yaw: f64,
    /// Largest pitch correction
    pub max_pitch: f64,
    /// Low-pass coefficient per update
    pub smoothing: f64,
    /// Hold the last correction this long after the face disappears
    pub lost_timeout_secs: f64,
}

impl Default for FaceTrackingConfig {
    fn default() -> Self {
        Self {
            yaw_gain: 0.5,
            pitch_gain: 0.3,
            max_yaw: 0.5,
            max_pitch: 0.3,
            smoothing: 0.25,
            lost_timeout_secs: 1.0,
        }
    }
}

impl FaceTrackingConfig {
    /// Clamp into usable ranges
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            yaw_gain: non_negative(self.yaw_gain),
            pitch_gain: non_negative(self.pitch_gain),
            max_yaw: non_negative(self.max_yaw),
            max_pitch: non_negative(self.max_pitch),
            smoothing: positive_or(self.smoothing, d.smoothing).min(1.0),
            lost_timeout_secs: interval_secs(self.lost_timeout_secs),
        }
    }

    /// Hold time after losing the face
    pub fn lost_timeout(&self) -> Duration {
        interval(self.lost_timeout_secs)
    }
}

/// Turns face detections into a head correction
#[derive(Debug, Clone)]
pub struct FaceTracker {
    config: FaceTrackingConfig,
    filter: OffsetFilter,
    last_seen: Option<Instant>,
}

impl FaceTracker {
    /// Create a tracker with zero correction
    pub fn new(config: FaceTrackingConfig) -> Self {
        let config = config.sanitized();
        Self {
            filter: OffsetFilter::new(config.smoothing),
            config,
            last_seen: None,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &FaceTrackingConfig {
        &self.config
    }

    /// Current correction
    pub fn offset(&self) -> Offset {
        self.filter.value()
    }

    /// Whether a face was seen within the lost timeout
    pub fn is_tracking(&self, now: Instant) -> bool {
        self.last_seen
            .is_some_and(|t| now.saturating_duration_since(t) <= self.config.lost_timeout())
    }

    /// Feed one detection result
    ///
    /// `face` is the face center with `x`, `y` in `[-1, 1]`, positive to the
    /// right of and below the image center. `None` means no face this frame.
    pub fn update(&mut self, face: Option<(f64, f64)>, now: Instant) -> Offset {
        let target = match face {
            Some((x, y)) if x.is_finite() && y.is_finite() => {
                if self.last_seen.is_none() {
                    tracing::debug!(x, y, "face acquired");
                }
                self.last_seen = Some(now);
                let x = x.clamp(-1.0, 1.0);
                let y = y.clamp(-1.0, 1.0);
                Offset::new(
                    0.0,
                    clamp_symmetric(y * self.config.pitch_gain, self.config.max_pitch),
                    clamp_symmetric(-x * self.config.yaw_gain, self.config.max_yaw),
                )
            }
            _ if self.is_tracking(now) => self.filter.value(),
            _ => {
                if self.last_seen.take().is_some() {
                    tracing::debug!("face lost, easing back");
                }
                Offset::ZERO
            }
        };
        self.filter.approach(target)
    }

    /// Zero the correction and forget the face
    pub fn reset(&mut self) {
        self.filter.reset();
        self.last_seen = None;
    }
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new(FaceTrackingConfig::default())
    }
}
