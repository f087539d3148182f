//! Pose sink trait and reference implementations
//!
//! The movement manager only ever talks to hardware through [`PoseSink`].
//! Real transports (HTTP, pub/sub) live outside this crate; [`ChannelSink`]
//! hands commands to such a transport task and [`MockSink`] records them
//! for tests.

use crossbeam_channel::{self as cc, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::math::{Offset, Pose};
use crate::{Error, Result};

/// One batched "set pose" command
///
/// `None` fields leave the corresponding actuator unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseCommand {
    /// Head rotation target
    pub head: Option<Offset>,
    /// Antenna targets (left, right)
    pub antennas: Option<[f64; 2]>,
    /// Body yaw target
    pub body_yaw: Option<f64>,
}

impl PoseCommand {
    /// Command every actuator to `pose`
    pub fn full(pose: &Pose) -> Self {
        Self {
            head: Some(pose.head),
            antennas: Some(pose.antennas),
            body_yaw: Some(pose.body_yaw),
        }
    }

    /// Command only the head
    pub fn head(head: Offset) -> Self {
        Self {
            head: Some(head),
            ..Default::default()
        }
    }

    /// Whether the command would change nothing
    pub fn is_empty(&self) -> bool {
        self.head.is_none() && self.antennas.is_none() && self.body_yaw.is_none()
    }

    /// Apply this command on top of `pose`
    pub fn apply_to(&self, pose: &Pose) -> Pose {
        Pose {
            head: self.head.unwrap_or(pose.head),
            antennas: self.antennas.unwrap_or(pose.antennas),
            body_yaw: self.body_yaw.unwrap_or(pose.body_yaw),
        }
    }
}

impl From<Pose> for PoseCommand {
    fn from(pose: Pose) -> Self {
        Self::full(&pose)
    }
}

/// The hardware "set pose" interface
///
/// Called from the control loop thread at up to the tick rate, never while
/// the manager's state lock is held. Implementations must not need extra
/// client-side throttling.
pub trait PoseSink: Send + Sync {
    /// Send one batched command
    fn set_pose(&self, command: PoseCommand) -> Result<()>;

    /// Sink name for logging
    fn name(&self) -> &str {
        "pose_sink"
    }
}

impl<S: PoseSink + ?Sized> PoseSink for std::sync::Arc<S> {
    fn set_pose(&self, command: PoseCommand) -> Result<()> {
        (**self).set_pose(command)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A sink that records every command, for tests and dry runs
#[derive(Debug, Default)]
pub struct MockSink {
    commands: Mutex<Vec<PoseCommand>>,
    failing: AtomicBool,
    attempts: AtomicU64,
}

impl MockSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Successfully recorded commands
    pub fn commands(&self) -> Vec<PoseCommand> {
        self.commands.lock().clone()
    }

    /// Number of successfully recorded commands
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Number of calls, including failed ones
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Most recent recorded command
    pub fn last(&self) -> Option<PoseCommand> {
        self.commands.lock().last().copied()
    }

    /// Forget recorded commands
    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl PoseSink for MockSink {
    fn set_pose(&self, command: PoseCommand) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::Hardware("mock sink set to fail".into()));
        }
        self.commands.lock().push(command);
        Ok(())
    }

    fn name(&self) -> &str {
        "MockSink"
    }
}

/// Forwards commands over a bounded channel to a transport task
///
/// Never blocks: a full channel is reported as a hardware error so the
/// manager counts it and keeps its last-sent reference unchanged.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: cc::Sender<PoseCommand>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport task should drain
    pub fn bounded(capacity: usize) -> (Self, cc::Receiver<PoseCommand>) {
        let (tx, rx) = cc::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl PoseSink for ChannelSink {
    fn set_pose(&self, command: PoseCommand) -> Result<()> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Hardware("transport queue full".into())),
            Err(TrySendError::Disconnected(_)) => Err(Error::ChannelClosed),
        }
    }

    fn name(&self) -> &str {
        "ChannelSink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_apply() {
        let base = Pose::new(Offset::new(0.1, 0.2, 0.3), [0.4, 0.5], 0.6);
        let cmd = PoseCommand::head(Offset::ZERO);
        let out = cmd.apply_to(&base);
        assert_eq!(out.head, Offset::ZERO);
        assert_eq!(out.antennas, [0.4, 0.5]);
        assert_eq!(out.body_yaw, 0.6);
        assert!(PoseCommand::default().is_empty());
        assert_eq!(PoseCommand::from(base).apply_to(&Pose::NEUTRAL), base);
    }

    #[test]
    fn test_mock_sink() {
        let sink = MockSink::new();
        sink.set_pose(PoseCommand::full(&Pose::NEUTRAL)).unwrap();
        sink.set_failing(true);
        assert!(matches!(
            sink.set_pose(PoseCommand::default()),
            Err(Error::Hardware(_))
        ));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.attempts(), 2);
    }

    #[test]
    fn test_channel_sink() {
        let (sink, rx) = ChannelSink::bounded(1);
        sink.set_pose(PoseCommand::head(Offset::new(0.0, 0.1, 0.0)))
            .unwrap();
        assert!(matches!(
            sink.set_pose(PoseCommand::default()),
            Err(Error::Hardware(_))
        ));
        assert_eq!(rx.try_recv().unwrap().head, Some(Offset::new(0.0, 0.1, 0.0)));

        drop(rx);
        assert!(matches!(
            sink.set_pose(PoseCommand::default()),
            Err(Error::ChannelClosed)
        ));
    }
}
