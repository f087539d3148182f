//! Configuration for the motion stack
//!
//! Loaded from TOML. Every section is optional and falls back to defaults.
//! Out-of-range values are clamped by [`MotionConfig::sanitized`] instead of
//! rejected, since keeping the robot moving matters more than strictness.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::audio::WobblerConfig;
use crate::control::{DeadZone, ManagerConfig, StepLimits};
use crate::math::{OffsetLimits, PoseLimits};
use crate::moves::BreathingConfig;
use crate::tracking::{DoaConfig, FaceTrackingConfig};
use crate::Result;

/// `value` if finite and strictly positive, otherwise `fallback`
pub(crate) fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// `|value|`, or zero when not finite
pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.abs()
    } else {
        0.0
    }
}

/// Longest accepted interval for timeouts and log spacing, in seconds
pub(crate) const MAX_INTERVAL_SECS: f64 = 3600.0;

/// Non-negative seconds capped at [`MAX_INTERVAL_SECS`]
pub(crate) fn interval_secs(value: f64) -> f64 {
    non_negative(value).min(MAX_INTERVAL_SECS)
}

/// Duration from seconds, clamped into `[0, MAX_INTERVAL_SECS]`
pub(crate) fn interval(value: f64) -> Duration {
    Duration::from_secs_f64(interval_secs(value))
}

/// Control loop timing and housekeeping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Tick rate in Hz
    pub rate_hz: f64,
    /// Emit a heartbeat every this many ticks (0 disables)
    pub heartbeat_every: u64,
    /// Minimum seconds between hardware failure log lines
    pub error_log_interval_secs: f64,
    /// Start idle breathing after this many idle seconds (0 disables)
    pub idle_breathing_after_secs: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100.0,
            heartbeat_every: 500,
            error_log_interval_secs: 5.0,
            idle_breathing_after_secs: 2.0,
        }
    }
}

impl ControlConfig {
    /// Set the tick rate
    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    /// Disable the idle breathing fallback
    pub fn without_idle_breathing(mut self) -> Self {
        self.idle_breathing_after_secs = 0.0;
        self
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / positive_or(self.rate_hz, 100.0))
    }

    /// Minimum spacing of hardware failure logs
    pub fn error_log_interval(&self) -> Duration {
        interval(self.error_log_interval_secs)
    }

    /// Idle time before breathing starts, if enabled
    pub fn idle_breathing_after(&self) -> Option<Duration> {
        let secs = self.idle_breathing_after_secs;
        (secs.is_finite() && secs > 0.0).then(|| interval(secs))
    }

    /// Clamp into usable ranges
    pub fn sanitized(self) -> Self {
        Self {
            rate_hz: positive_or(self.rate_hz, 100.0).clamp(1.0, 1000.0),
            heartbeat_every: self.heartbeat_every,
            error_log_interval_secs: interval_secs(self.error_log_interval_secs),
            idle_breathing_after_secs: interval_secs(self.idle_breathing_after_secs),
        }
    }
}

fn sanitize_limits(limits: OffsetLimits) -> OffsetLimits {
    OffsetLimits::new(
        non_negative(limits.roll),
        non_negative(limits.pitch),
        non_negative(limits.yaw),
    )
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Control loop settings
    pub control: ControlConfig,
    /// Absolute hardware limits
    pub limits: PoseLimits,
    /// Head limits applied during emotion playback
    #[serde(default = "emotion_limits")]
    pub emotion_limits: OffsetLimits,
    /// Max per-tick step
    pub step: StepLimits,
    /// Transmission dead zone
    pub dead_zone: DeadZone,
    /// Idle breathing
    pub breathing: BreathingConfig,
    /// Speech wobble DSP
    pub wobbler: WobblerConfig,
    /// Face tracking correction
    pub face_tracking: FaceTrackingConfig,
    /// Direction-of-arrival correction
    pub doa: DoaConfig,
}

fn emotion_limits() -> OffsetLimits {
    OffsetLimits::EMOTION
}

impl MotionConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use motion_core::config::MotionConfig;
    ///
    /// let config = MotionConfig::from_file("motion.toml")?.sanitized();
    /// # Ok::<(), motion_core::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Settings consumed by the movement manager
    pub fn manager(&self) -> ManagerConfig {
        ManagerConfig {
            control: self.control,
            limits: self.limits,
            emotion_limits: self.emotion_limits,
            step: self.step,
            dead_zone: self.dead_zone,
            breathing: self.breathing,
        }
    }

    /// Copy with every out-of-range value clamped into range
    ///
    /// Logs one warning per section that needed correcting.
    pub fn sanitized(&self) -> Self {
        let out = Self {
            control: self.control.sanitized(),
            limits: PoseLimits {
                head: sanitize_limits(self.limits.head),
                antenna: non_negative(self.limits.antenna),
                body_yaw: non_negative(self.limits.body_yaw),
            },
            emotion_limits: sanitize_limits(self.emotion_limits),
            step: self.step.sanitized(),
            dead_zone: self.dead_zone.sanitized(),
            breathing: self.breathing.sanitized(),
            wobbler: self.wobbler.sanitized(),
            face_tracking: self.face_tracking.sanitized(),
            doa: self.doa.sanitized(),
        };

        macro_rules! warn_changed {
            ($($field:ident),*) => {
                $(
                    if out.$field != self.$field {
                        tracing::warn!(
                            section = stringify!($field),
                            "clamped out-of-range configuration values"
                        );
                    }
                )*
            };
        }
        warn_changed!(
            control,
            limits,
            emotion_limits,
            step,
            dead_zone,
            breathing,
            wobbler,
            face_tracking,
            doa
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = MotionConfig::default();
        assert_relative_eq!(config.control.rate_hz, 100.0);
        assert_eq!(config.limits.head, OffsetLimits::HARDWARE);
        assert_eq!(config.emotion_limits, OffsetLimits::EMOTION);
        assert_eq!(config.control.period(), Duration::from_millis(10));
        assert_eq!(
            config.control.idle_breathing_after(),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = MotionConfig::from_toml_str(
            r#"
[control]
rate_hz = 50.0

[limits.head]
yaw = 0.5

[dead_zone]
head = 0.01
"#,
        )
        .unwrap();
        assert_relative_eq!(config.control.rate_hz, 50.0);
        assert_eq!(config.control.heartbeat_every, 500);
        assert_relative_eq!(config.limits.head.yaw, 0.5);
        assert_relative_eq!(config.limits.head.roll, 0.35);
        assert_relative_eq!(config.dead_zone.head, 0.01);
        assert_eq!(config.emotion_limits, OffsetLimits::EMOTION);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion.toml");

        let mut config = MotionConfig::default();
        config.control.rate_hz = 60.0;
        config.wobbler.master_gain = 0.5;
        config.to_file(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[control]"));
        assert!(text.contains("[wobbler]"));

        let loaded = MotionConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = MotionConfig::from_toml_str("[control\nrate_hz = ").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_sanitized_clamps() {
        let mut config = MotionConfig::default();
        config.control.rate_hz = -5.0;
        config.control.error_log_interval_secs = f64::NAN;
        config.limits.head.pitch = -0.4;
        config.step.head = 0.0;

        let s = config.sanitized();
        assert_relative_eq!(s.control.rate_hz, 100.0);
        assert_eq!(s.control.error_log_interval_secs, 0.0);
        assert_relative_eq!(s.limits.head.pitch, 0.4);
        assert_relative_eq!(s.step.head, StepLimits::default().head);

        let clean = MotionConfig::default();
        assert_eq!(clean.sanitized(), clean);
    }

    #[test]
    fn test_huge_intervals_are_capped_and_tick_safely() {
        use crate::control::MovementManager;
        use crate::hardware::MockSink;
        use std::sync::Arc;
        use std::time::Instant;

        let config = MotionConfig::from_toml_str(
            r#"
[control]
idle_breathing_after_secs = 1e20
error_log_interval_secs = 1e20

[face_tracking]
lost_timeout_secs = 1e300
"#,
        )
        .unwrap()
        .sanitized();
        assert_relative_eq!(config.control.idle_breathing_after_secs, MAX_INTERVAL_SECS);
        assert_relative_eq!(config.control.error_log_interval_secs, MAX_INTERVAL_SECS);
        assert_relative_eq!(config.face_tracking.lost_timeout_secs, MAX_INTERVAL_SECS);

        // Unsanitized values must not panic either
        let raw = ControlConfig {
            idle_breathing_after_secs: 1e20,
            error_log_interval_secs: 1e20,
            ..Default::default()
        };
        assert_eq!(raw.error_log_interval(), interval(MAX_INTERVAL_SECS));
        assert_eq!(raw.idle_breathing_after(), Some(interval(MAX_INTERVAL_SECS)));

        let sink = Arc::new(MockSink::new());
        sink.set_failing(true);
        let manager = MovementManager::new(sink.clone(), config.manager());
        let t0 = Instant::now();
        for i in 0..3u64 {
            manager.tick_at(t0 + Duration::from_millis(i * 10));
        }
        assert_eq!(manager.diagnostics().errors, 3);
        assert!(!manager.is_move_playing());
    }
}
