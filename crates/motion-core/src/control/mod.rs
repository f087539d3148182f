//! Pose composition and dispatch
//!
//! [`MovementManager`] fuses the primary [`Move`](crate::moves::Move) with
//! the [`SecondaryOffsets`] on a fixed-rate [`ControlLoop`] and sends the
//! result through a [`PoseSink`](crate::hardware::PoseSink).

mod control_loop;
mod direct;
mod limiter;
mod manager;
mod secondary;

pub use control_loop::{ControlLoop, ControlLoopConfig, ControlLoopHandle, ControlLoopStats};
pub use direct::DirectPoseControl;
pub use limiter::{DeadZone, StepLimits};
pub use manager::{Diagnostics, ManagerConfig, MovementManager, TickOutcome};
pub use secondary::SecondaryOffsets;
