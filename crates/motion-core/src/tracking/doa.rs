//! Audio direction-of-arrival correction
//!
//! A microphone array reports the angle speech is coming from. The
//! [`DoaClient`] worker turns those readings into a yaw offset in the
//! manager's audio slot, and lets it decay when nobody is talking.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{non_negative, positive_or};
use crate::control::MovementManager;
use crate::math::{clamp_symmetric, Filter, LowPassFilter, Offset};
use crate::{Error, Result};

/// One reading from the microphone array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoaReading {
    /// Arrival angle in radians; `π/2` is straight ahead
    pub angle: f64,
    /// Whether the array currently hears speech
    pub speech_detected: bool,
}

impl DoaReading {
    /// Create a reading
    pub fn new(angle: f64, speech_detected: bool) -> Self {
        Self {
            angle,
            speech_detected,
        }
    }
}

/// Direction-of-arrival tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoaConfig {
    /// Yaw per radian of arrival angle
    pub gain: f64,
    /// Largest yaw correction
    pub max_yaw: f64,
    /// Low-pass coefficient per reading or timeout
    pub smoothing: f64,
    /// How long the worker waits for a reading before decaying
    pub poll_interval_ms: u64,
}

impl Default for DoaConfig {
    fn default() -> Self {
        Self {
            gain: 0.5,
            max_yaw: 0.4,
            smoothing: 0.2,
            poll_interval_ms: 100,
        }
    }
}

impl DoaConfig {
    /// Clamp into usable ranges
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            gain: if self.gain.is_finite() { self.gain } else { d.gain },
            max_yaw: non_negative(self.max_yaw),
            smoothing: positive_or(self.smoothing, d.smoothing).min(1.0),
            poll_interval_ms: self.poll_interval_ms.clamp(1, 1000),
        }
    }

    /// Unfiltered yaw correction for a reading
    pub fn yaw_for(&self, reading: &DoaReading) -> Option<f64> {
        (reading.speech_detected && reading.angle.is_finite())
            .then(|| clamp_symmetric((reading.angle - FRAC_PI_2) * self.gain, self.max_yaw))
    }
}

/// Smoothed yaw from a stream of readings
#[derive(Debug, Clone)]
pub struct DoaTracker {
    config: DoaConfig,
    yaw: LowPassFilter,
}

impl DoaTracker {
    /// Create a tracker at zero yaw
    pub fn new(config: DoaConfig) -> Self {
        let config = config.sanitized();
        Self {
            yaw: LowPassFilter::new(config.smoothing),
            config,
        }
    }

    /// Feed a reading, or `None` when none arrived in time
    ///
    /// Silence or a missing reading eases the correction back to zero.
    pub fn update(&mut self, reading: Option<&DoaReading>) -> Offset {
        let target = reading.and_then(|r| self.config.yaw_for(r)).unwrap_or(0.0);
        Offset::new(0.0, 0.0, self.yaw.approach(target))
    }

    /// Current correction
    pub fn offset(&self) -> Offset {
        Offset::new(0.0, 0.0, self.yaw.value())
    }
}

/// Background worker feeding DOA readings into a manager
///
/// Stops when [`DoaClient::stop`] is called or the sender side of the
/// channel is dropped; the audio slot is zeroed on exit.
pub struct DoaClient {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DoaClient {
    /// Start consuming `readings` on a new thread
    pub fn spawn(
        manager: Arc<MovementManager>,
        readings: Receiver<DoaReading>,
        config: DoaConfig,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let running = running.clone();
            thread::Builder::new()
                .name("doa-client".into())
                .spawn(move || {
                    Self::worker(&manager, &readings, config, &running);
                    running.store(false, Ordering::Release);
                })?
        };
        tracing::info!("doa client started");
        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    fn worker(
        manager: &MovementManager,
        readings: &Receiver<DoaReading>,
        config: DoaConfig,
        running: &AtomicBool,
    ) {
        let mut tracker = DoaTracker::new(config);
        let timeout = Duration::from_millis(tracker.config.poll_interval_ms);

        while running.load(Ordering::Acquire) {
            let offset = match readings.recv_timeout(timeout) {
                Ok(reading) => tracker.update(Some(&reading)),
                Err(RecvTimeoutError::Timeout) => tracker.update(None),
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("doa channel closed");
                    break;
                }
            };
            manager.set_audio_offset(offset);
        }
        manager.set_audio_offset(Offset::ZERO);
    }

    /// Whether the worker is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it to exit
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| Error::ControlLoop("doa client thread panicked".into()))?;
            tracing::info!("doa client stopped");
        }
        Ok(())
    }
}

impl Drop for DoaClient {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlConfig;
    use crate::control::ManagerConfig;
    use crate::hardware::MockSink;
    use approx::assert_relative_eq;
    use std::time::Instant;

    #[test]
    fn test_angle_mapping() {
        let c = DoaConfig::default();
        assert_relative_eq!(c.yaw_for(&DoaReading::new(FRAC_PI_2, true)).unwrap(), 0.0);
        let right = c.yaw_for(&DoaReading::new(FRAC_PI_2 + 0.4, true)).unwrap();
        assert_relative_eq!(right, 0.2, epsilon = 1e-12);
        assert_relative_eq!(c.yaw_for(&DoaReading::new(0.0, true)).unwrap(), -0.4);
        assert_eq!(c.yaw_for(&DoaReading::new(1.0, false)), None);
        assert_eq!(c.yaw_for(&DoaReading::new(f64::NAN, true)), None);
    }

    #[test]
    fn test_tracker_smooths_and_decays() {
        let mut t = DoaTracker::new(DoaConfig::default());
        let r = DoaReading::new(FRAC_PI_2 + 0.4, true);
        assert_relative_eq!(t.update(Some(&r)).yaw, 0.04, epsilon = 1e-12);
        for _ in 0..100 {
            t.update(Some(&r));
        }
        assert_relative_eq!(t.offset().yaw, 0.2, epsilon = 1e-6);

        for _ in 0..100 {
            t.update(Some(&DoaReading::new(0.3, false)));
        }
        assert!(t.offset().yaw.abs() < 1e-6);
    }

    #[test]
    fn test_client_writes_audio_slot() {
        let config =
            ManagerConfig::default().with_control(ControlConfig::default().without_idle_breathing());
        let manager = Arc::new(MovementManager::new(Arc::new(MockSink::new()), config));
        let (tx, rx) = crossbeam_channel::unbounded();

        let client = DoaClient::spawn(
            manager.clone(),
            rx,
            DoaConfig {
                smoothing: 1.0,
                poll_interval_ms: 1000,
                ..Default::default()
            },
        )
        .unwrap();
        tx.send(DoaReading::new(FRAC_PI_2 + 0.4, true)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while manager.secondary_offsets().audio.yaw == 0.0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_relative_eq!(manager.secondary_offsets().audio.yaw, 0.2, epsilon = 1e-12);

        client.stop().unwrap();
        assert_eq!(manager.secondary_offsets().audio, Offset::ZERO);
    }

    #[test]
    fn test_client_exits_when_sender_dropped() {
        let manager = Arc::new(MovementManager::new(
            Arc::new(MockSink::new()),
            ManagerConfig::default(),
        ));
        let (tx, rx) = crossbeam_channel::unbounded::<DoaReading>();
        let client = DoaClient::spawn(manager, rx, DoaConfig::default()).unwrap();
        drop(tx);

        let deadline = Instant::now() + Duration::from_secs(2);
        while client.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!client.is_running());
    }
}
