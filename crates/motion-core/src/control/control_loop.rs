//! Fixed-rate control loop
//!
//! Runs a callback at a fixed frequency on a dedicated thread, with timing
//! statistics and cooperative shutdown. The stop flag is checked once per
//! period, so a stop request is honoured within one tick.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Overrun warnings are emitted at most this often
const OVERRUN_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a control loop
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Target loop rate in Hz
    pub rate_hz: f64,
    /// Thread name, also used in log lines
    pub name: Arc<str>,
    /// Whether to warn on timing overruns
    pub warn_on_overrun: bool,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100.0,
            name: "motion".into(),
            warn_on_overrun: true,
        }
    }
}

impl ControlLoopConfig {
    /// Create a new config with the given rate
    pub fn new(rate_hz: f64) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Set the loop name
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the target period
    ///
    /// Non-positive or vanishingly small rates fall back to 100 Hz.
    pub fn period(&self) -> Duration {
        if self.rate_hz.is_finite() && self.rate_hz > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.rate_hz).unwrap_or(Duration::from_millis(10))
        } else {
            Duration::from_millis(10)
        }
    }
}

/// Timing statistics for a control loop
///
/// Jitter uses Welford's online algorithm for numerically stable variance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlLoopStats {
    /// Number of loop iterations
    pub iterations: u64,
    /// Number of timing overruns
    pub overruns: u64,
    /// Maximum iteration time
    pub max_iteration_time: Duration,
    /// Last iteration time
    pub last_iteration_time: Duration,
    welford_mean: f64,
    welford_m2: f64,
}

impl ControlLoopStats {
    /// Record one iteration
    pub fn update(&mut self, execution_time: Duration, target_period: Duration) {
        self.iterations += 1;
        self.last_iteration_time = execution_time;
        self.max_iteration_time = self.max_iteration_time.max(execution_time);

        let time_secs = execution_time.as_secs_f64();
        let delta = time_secs - self.welford_mean;
        self.welford_mean += delta / self.iterations as f64;
        self.welford_m2 += delta * (time_secs - self.welford_mean);

        if execution_time > target_period {
            self.overruns += 1;
        }
    }

    /// Mean iteration time
    pub fn mean_iteration_time(&self) -> Duration {
        Duration::from_secs_f64(self.welford_mean.max(0.0))
    }

    /// Fraction of iterations that overran the period
    pub fn overrun_ratio(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.overruns as f64 / self.iterations as f64
        }
    }

    /// Standard deviation of iteration time in seconds
    pub fn jitter_std_dev(&self) -> f64 {
        if self.iterations < 2 {
            0.0
        } else {
            (self.welford_m2 / (self.iterations - 1) as f64).sqrt()
        }
    }
}

/// Handle to a running control loop
pub struct ControlLoopHandle {
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<ControlLoopStats>>,
    thread: Option<JoinHandle<()>>,
}

impl ControlLoopHandle {
    /// Check if the loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get the current statistics
    pub fn stats(&self) -> ControlLoopStats {
        *self.stats.lock()
    }

    /// Request the loop to stop after the current iteration
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Stop and wait for the loop thread to exit
    pub fn join(mut self) -> Result<ControlLoopStats> {
        self.stop();
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| Error::ControlLoop("loop thread panicked".into()))?;
        }
        Ok(self.stats())
    }
}

impl Drop for ControlLoopHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.thread.take() {
            // The loop thread itself may drop the last owner of its handle.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// A fixed-rate control loop
///
/// # Example
/// ```no_run
/// use motion_core::control::{ControlLoop, ControlLoopConfig};
///
/// let config = ControlLoopConfig::new(100.0).with_name("demo");
/// let handle = ControlLoop::spawn(config, |iteration, _dt| iteration < 1000)?;
///
/// // Later...
/// handle.join()?;
/// # Ok::<(), motion_core::Error>(())
/// ```
pub struct ControlLoop;

impl ControlLoop {
    /// Spawn a control loop on a new named thread
    ///
    /// The callback receives the iteration count and the measured delta
    /// time in seconds, and returns `false` to stop.
    pub fn spawn<F>(config: ControlLoopConfig, callback: F) -> Result<ControlLoopHandle>
    where
        F: FnMut(u64, f64) -> bool + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(ControlLoopStats::default()));

        let thread = {
            let running = running.clone();
            let stats = stats.clone();
            thread::Builder::new()
                .name(config.name.to_string())
                .spawn(move || {
                    let _exit = ClearOnExit(&running);
                    drive(&config, &running, callback, |s| *stats.lock() = *s);
                })?
        };

        Ok(ControlLoopHandle {
            running,
            stats,
            thread: Some(thread),
        })
    }

    /// Run a control loop on the current thread until the callback returns `false`
    pub fn run<F>(config: ControlLoopConfig, callback: F) -> ControlLoopStats
    where
        F: FnMut(u64, f64) -> bool,
    {
        let running = AtomicBool::new(true);
        let mut out = ControlLoopStats::default();
        drive(&config, &running, callback, |s| out = *s);
        out
    }

    /// Run a control loop on the current thread for at most `duration`
    pub fn run_for<F>(config: ControlLoopConfig, duration: Duration, mut callback: F) -> ControlLoopStats
    where
        F: FnMut(u64, f64) -> bool,
    {
        let start = Instant::now();
        Self::run(config, |iter, dt| start.elapsed() < duration && callback(iter, dt))
    }
}

/// Clears the running flag when the loop thread exits, including by panic
struct ClearOnExit<'a>(&'a AtomicBool);

impl Drop for ClearOnExit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn drive<F, P>(config: &ControlLoopConfig, running: &AtomicBool, mut callback: F, mut publish: P)
where
    F: FnMut(u64, f64) -> bool,
    P: FnMut(&ControlLoopStats),
{
    let period = config.period();
    let mut stats = ControlLoopStats::default();
    let mut iteration = 0u64;
    let mut last_time = Instant::now();
    let mut last_overrun_log: Option<Instant> = None;

    while running.load(Ordering::Acquire) {
        let loop_start = Instant::now();
        let dt = loop_start.duration_since(last_time).as_secs_f64();
        last_time = loop_start;

        let should_continue = callback(iteration, dt);
        let execution_time = loop_start.elapsed();

        if !should_continue {
            break;
        }

        stats.update(execution_time, period);
        publish(&stats);

        if let Some(sleep_time) = period.checked_sub(execution_time) {
            thread::sleep(sleep_time);
        } else if config.warn_on_overrun
            && last_overrun_log.map_or(true, |t| t.elapsed() >= OVERRUN_LOG_INTERVAL)
        {
            last_overrun_log = Some(Instant::now());
            tracing::warn!(
                "{}: loop overrun by {:?} ({} total)",
                config.name,
                execution_time - period,
                stats.overruns
            );
        }

        iteration += 1;
    }
}
