//! The movement manager
//!
//! Owns the single primary move, the secondary offset slots and the
//! bookkeeping needed to turn them into a clamped, rate-limited,
//! dead-zone filtered command stream.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use motion_core::{MockSink, MovementManager, Offset, Pose};
//! use motion_core::control::ManagerConfig;
//!
//! let manager = Arc::new(MovementManager::new(
//!     Arc::new(MockSink::new()),
//!     ManagerConfig::default(),
//! ));
//! manager.run()?;
//! manager.goto(Pose::from_head(Offset::from_degrees(0.0, 10.0, 0.0)), 1.0);
//! manager.set_speech_offset(Offset::new(0.0, 0.02, 0.0));
//! manager.stop()?;
//! # Ok::<(), motion_core::Error>(())
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use super::control_loop::{ControlLoop, ControlLoopConfig, ControlLoopHandle, ControlLoopStats};
use super::limiter::{DeadZone, StepLimits};
use super::secondary::SecondaryOffsets;
use crate::animation::Emotion;
use crate::config::ControlConfig;
use crate::hardware::{PoseCommand, PoseSink};
use crate::math::{Offset, OffsetLimits, Pose, PoseLimits};
use crate::moves::{BreathingConfig, BreathingMove, EmotionMove, InterpolatedMove, Move};
use crate::{Error, Result};

/// Settings for a [`MovementManager`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagerConfig {
    /// Loop timing and housekeeping
    pub control: ControlConfig,
    /// Absolute limits applied to every command
    pub limits: PoseLimits,
    /// Head limits for emotions started with [`MovementManager::play_emotion`]
    pub emotion_limits: OffsetLimits,
    /// Max per-tick change
    pub step: StepLimits,
    /// Suppression thresholds
    pub dead_zone: DeadZone,
    /// Idle breathing shape
    pub breathing: BreathingConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            limits: PoseLimits::default(),
            emotion_limits: OffsetLimits::EMOTION,
            step: StepLimits::default(),
            dead_zone: DeadZone::default(),
            breathing: BreathingConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Set the control section
    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.control = control;
        self
    }

    /// Set the step limits
    pub fn with_step(mut self, step: StepLimits) -> Self {
        self.step = step;
        self
    }

    /// Set the dead zone
    pub fn with_dead_zone(mut self, dead_zone: DeadZone) -> Self {
        self.dead_zone = dead_zone;
        self
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A command reached the sink
    Sent,
    /// The command was inside the dead zone
    Skipped,
    /// The sink returned an error
    Failed,
}

/// Point-in-time counters and state
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Ticks executed
    pub ticks: u64,
    /// Commands accepted by the sink
    pub sent: u64,
    /// Ticks suppressed by the dead zone
    pub skipped: u64,
    /// Sink failures
    pub errors: u64,
    /// Last sent head pose, or the current primary head before any send
    pub head: Offset,
    /// Name of the installed move
    pub current_move: Option<String>,
    /// Whether the background loop is running
    pub running: bool,
    /// Loop timing, if a loop was started
    pub loop_stats: Option<ControlLoopStats>,
}

#[derive(Clone)]
struct ActiveMove {
    mv: Arc<Move>,
    started: Instant,
    /// Installed by the idle fallback rather than a caller
    filler: bool,
}

struct Shared {
    active: Option<ActiveMove>,
    /// Bumped whenever `active` is replaced by a caller
    generation: u64,
    idle_pose: Pose,
    idle_since: Instant,
    last_primary: Pose,
    last_sent: Option<Pose>,
    secondary: SecondaryOffsets,
}

#[derive(Debug, Default)]
struct FailureLog {
    last: Option<Instant>,
    suppressed: u64,
}

impl FailureLog {
    /// Returns the suppressed count when a line is due, else counts this one
    fn record(&mut self, now: Instant, interval: Duration) -> Option<u64> {
        let due = self
            .last
            .map_or(true, |t| now.saturating_duration_since(t) >= interval);
        if due {
            self.last = Some(now);
            Some(std::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }
}

/// Fuses the primary move and secondary offsets into hardware commands
///
/// All methods take `&self`; producers on any thread may call the setters
/// while the control loop is ticking. The state lock is never held while a
/// move is evaluated or the sink is called.
pub struct MovementManager {
    config: ManagerConfig,
    sink: Arc<dyn PoseSink>,
    shared: Mutex<Shared>,
    failure_log: Mutex<FailureLog>,
    ticks: AtomicU64,
    sent: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
    control_loop: Mutex<Option<ControlLoopHandle>>,
}

impl std::fmt::Debug for MovementManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovementManager")
            .field("sink", &self.sink.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MovementManager {
    /// Create a manager holding the neutral pose
    pub fn new(sink: Arc<dyn PoseSink>, config: ManagerConfig) -> Self {
        let config = ManagerConfig {
            control: config.control.sanitized(),
            step: config.step.sanitized(),
            dead_zone: config.dead_zone.sanitized(),
            breathing: config.breathing.sanitized(),
            ..config
        };
        Self {
            config,
            sink,
            shared: Mutex::new(Shared {
                active: None,
                generation: 0,
                idle_pose: Pose::NEUTRAL,
                idle_since: Instant::now(),
                last_primary: Pose::NEUTRAL,
                last_sent: None,
                secondary: SecondaryOffsets::default(),
            }),
            failure_log: Mutex::new(FailureLog::default()),
            ticks: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            control_loop: Mutex::new(None),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ---- primary move ----

    /// Replace the current move, starting it now
    pub fn queue_move(&self, mv: impl Into<Move>) {
        self.queue_move_at(mv, Instant::now());
    }

    /// Replace the current move, starting it at `started`
    ///
    /// The preempted move's last evaluated pose becomes the idle baseline.
    pub fn queue_move_at(&self, mv: impl Into<Move>, started: Instant) {
        let mv = mv.into();
        tracing::debug!(name = mv.name(), duration = mv.duration(), "queued move");

        Self::install(&mut self.shared.lock(), mv, started);
    }

    /// Hold `edit(pose)`, where `pose` is the currently held pose
    ///
    /// If an idle hold is installed its pose is the starting point, otherwise
    /// the last primary pose. Read and replace happen under one lock, so
    /// edits issued within the same tick period compose.
    pub fn update_hold(&self, edit: impl FnOnce(Pose) -> Pose) {
        let mut s = self.shared.lock();
        let base = match s.active.as_ref().map(|a| a.mv.as_ref()) {
            Some(Move::Idle(hold)) => hold.pose(),
            _ => s.last_primary,
        };
        let mv = Move::idle(edit(base));
        tracing::trace!(name = mv.name(), "updated hold");
        Self::install(&mut s, mv, Instant::now());
    }

    fn install(s: &mut Shared, mv: Move, started: Instant) {
        if s.active.is_some() {
            s.idle_pose = s.last_primary;
        }
        s.generation += 1;
        s.active = Some(ActiveMove {
            mv: Arc::new(mv),
            started,
            filler: false,
        });
    }

    /// Play an emotion under the configured emotion head limits
    pub fn play_emotion(&self, emotion: Arc<Emotion>) {
        self.queue_move(EmotionMove::new(emotion).with_limits(self.config.emotion_limits));
    }

    /// Ease from the current primary pose to `target` over `duration` seconds
    pub fn goto(&self, target: Pose, duration: f64) {
        let start = self.shared.lock().last_primary;
        self.queue_move(InterpolatedMove::new(start, target, duration));
    }

    /// Drop the current move and hold its last pose
    ///
    /// Returns whether a move was installed.
    pub fn stop_move(&self) -> bool {
        let stopped = {
            let mut s = self.shared.lock();
            let stopped = s.active.take();
            if stopped.is_some() {
                s.idle_pose = s.last_primary;
                s.idle_since = Instant::now();
                s.generation += 1;
            }
            stopped
        };
        if let Some(a) = &stopped {
            tracing::debug!(name = a.mv.name(), "stopped move");
        }
        stopped.is_some()
    }

    /// Whether a caller-installed move is still running
    ///
    /// The idle breathing fallback does not count.
    pub fn is_move_playing(&self) -> bool {
        let now = Instant::now();
        let s = self.shared.lock();
        s.active.as_ref().is_some_and(|a| {
            !a.filler
                && !a
                    .mv
                    .is_complete(now.saturating_duration_since(a.started).as_secs_f64())
        })
    }

    /// Name of the installed move, including the idle fallback
    pub fn current_move_name(&self) -> Option<String> {
        self.shared
            .lock()
            .active
            .as_ref()
            .map(|a| a.mv.name().to_string())
    }

    // ---- secondary offsets ----

    /// Set the face tracking correction
    pub fn set_face_tracking_offset(&self, offset: Offset) {
        self.shared.lock().secondary.face_tracking = offset;
    }

    /// Set the speech wobble
    pub fn set_speech_offset(&self, offset: Offset) {
        self.shared.lock().secondary.speech = offset;
    }

    /// Set the direction-of-arrival correction
    pub fn set_audio_offset(&self, offset: Offset) {
        self.shared.lock().secondary.audio = offset;
    }

    /// Zero every secondary slot
    pub fn clear_secondary_offsets(&self) {
        self.shared.lock().secondary.clear();
    }

    /// Current secondary slots
    pub fn secondary_offsets(&self) -> SecondaryOffsets {
        self.shared.lock().secondary
    }

    // ---- pose getters ----

    /// Pose held when no move is installed
    pub fn idle_pose(&self) -> Pose {
        self.shared.lock().idle_pose
    }

    /// Primary pose computed by the latest tick
    pub fn last_primary_pose(&self) -> Pose {
        self.shared.lock().last_primary
    }

    /// Pose most recently accepted by the sink
    pub fn last_sent_pose(&self) -> Option<Pose> {
        self.shared.lock().last_sent
    }

    /// Counters and state snapshot
    pub fn diagnostics(&self) -> Diagnostics {
        let (head, current_move) = {
            let s = self.shared.lock();
            (
                s.last_sent.unwrap_or(s.last_primary).head,
                s.active.as_ref().map(|a| a.mv.name().to_string()),
            )
        };
        let (running, loop_stats) = {
            let slot = self.control_loop.lock();
            (
                slot.as_ref().is_some_and(|h| h.is_running()),
                slot.as_ref().map(|h| h.stats()),
            )
        };
        Diagnostics {
            ticks: self.ticks.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            head,
            current_move,
            running,
            loop_stats,
        }
    }

    // ---- loop ----

    /// Start ticking on a background thread at the configured rate
    ///
    /// The loop holds only a weak reference, so dropping the last `Arc`
    /// also ends it.
    pub fn run(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.control_loop.lock();
        if slot.as_ref().is_some_and(|h| h.is_running()) {
            return Err(Error::ControlLoop("movement manager already running".into()));
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let config = ControlLoopConfig::new(self.config.control.rate_hz).with_name("movement-manager");
        let handle = ControlLoop::spawn(config, move |_, _| match weak.upgrade() {
            Some(manager) => {
                manager.tick();
                true
            }
            None => false,
        })?;
        *slot = Some(handle);

        tracing::info!(
            rate_hz = self.config.control.rate_hz,
            sink = self.sink.name(),
            "movement manager started"
        );
        Ok(())
    }

    /// Stop the background loop and wait for it to exit
    pub fn stop(&self) -> Result<()> {
        let handle = self.control_loop.lock().take();
        if let Some(handle) = handle {
            let stats = handle.join()?;
            tracing::info!(
                iterations = stats.iterations,
                overruns = stats.overruns,
                "movement manager stopped"
            );
        }
        Ok(())
    }

    /// Whether the background loop is running
    pub fn is_running(&self) -> bool {
        self.control_loop
            .lock()
            .as_ref()
            .is_some_and(|h| h.is_running())
    }

    /// Run one tick now
    pub fn tick(&self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Run one tick as if the current time were `now`
    pub fn tick_at(&self, now: Instant) -> TickOutcome {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        let (active, generation, idle_pose, secondary, last_sent, started_breathing) = {
            let mut s = self.shared.lock();
            let started_breathing = s.active.is_none() && self.start_idle_breathing(&mut s, now);
            (
                s.active.clone(),
                s.generation,
                s.idle_pose,
                s.secondary,
                s.last_sent,
                started_breathing,
            )
        };
        if started_breathing {
            tracing::debug!("idle, starting breathing");
        }

        let (primary, finished) = match &active {
            Some(a) => {
                let elapsed = now.saturating_duration_since(a.started).as_secs_f64();
                let pose = a.mv.evaluate(elapsed);
                let pose = if pose.is_finite() { pose } else { idle_pose };
                (pose, a.mv.is_complete(elapsed))
            }
            None => (idle_pose, false),
        };

        let cleared = {
            let mut s = self.shared.lock();
            // A move queued mid-tick must not be overwritten or cleared.
            if s.generation == generation {
                s.last_primary = primary;
                if finished {
                    s.active = None;
                    s.idle_pose = primary;
                    s.idle_since = now;
                }
                finished
            } else {
                false
            }
        };
        if cleared {
            if let Some(a) = &active {
                tracing::debug!(name = a.mv.name(), "move finished");
            }
        }

        let target = self.config.limits.clamp(Pose {
            head: primary.head + secondary.combined(),
            ..primary
        });
        let command = match &last_sent {
            Some(last) => {
                if self.config.step.exceeds(last, &target) {
                    tracing::trace!(step = last.max_step_to(&target), "rate limiting toward target");
                }
                self.config.step.limit(last, &target)
            }
            None => target,
        };

        let outcome = match &last_sent {
            Some(last) if self.config.dead_zone.suppresses(last, &command) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Skipped
            }
            _ => self.dispatch(command, now),
        };

        if self.heartbeat_due(tick) {
            tracing::debug!(
                tick,
                sent = self.sent.load(Ordering::Relaxed),
                skipped = self.skipped.load(Ordering::Relaxed),
                errors = self.errors.load(Ordering::Relaxed),
                roll = command.head.roll,
                pitch = command.head.pitch,
                yaw = command.head.yaw,
                "heartbeat"
            );
        }

        outcome
    }

    fn heartbeat_due(&self, tick: u64) -> bool {
        let every = self.config.control.heartbeat_every;
        every > 0 && tick % every == 0
    }

    fn start_idle_breathing(&self, s: &mut Shared, now: Instant) -> bool {
        let Some(after) = self.config.control.idle_breathing_after() else {
            return false;
        };
        if now.saturating_duration_since(s.idle_since) < after {
            return false;
        }
        s.generation += 1;
        s.active = Some(ActiveMove {
            mv: Arc::new(Move::Breathing(BreathingMove::new(
                s.idle_pose,
                self.config.breathing,
            ))),
            started: now,
            filler: true,
        });
        true
    }

    fn dispatch(&self, command: Pose, now: Instant) -> TickOutcome {
        tracing::trace!(
            roll = command.head.roll,
            pitch = command.head.pitch,
            yaw = command.head.yaw,
            "sending pose"
        );
        match self.sink.set_pose(PoseCommand::full(&command)) {
            Ok(()) => {
                self.shared.lock().last_sent = Some(command);
                self.sent.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Sent
            }
            Err(e) => {
                let total = self.errors.fetch_add(1, Ordering::Relaxed) + 1;
                self.log_failure(&e, total, now);
                TickOutcome::Failed
            }
        }
    }

    fn log_failure(&self, err: &Error, total: u64, now: Instant) {
        let interval = self.config.control.error_log_interval();
        let suppressed = self.failure_log.lock().record(now, interval);
        if let Some(suppressed) = suppressed {
            tracing::warn!(
                sink = self.sink.name(),
                error = %err,
                suppressed,
                total,
                "failed to send pose"
            );
        }
    }
}
