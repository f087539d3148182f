//! Setter-style pose control on top of the movement manager
//!
//! For callers that think in "set the head to X" rather than moves. Each
//! setter installs an [`IdleMove`](crate::moves::IdleMove) holding the
//! updated target, so the manager's clamping, step limiting and dead zone
//! still apply.

use std::sync::Arc;

use super::manager::MovementManager;
use crate::math::{Offset, Pose};
use crate::moves::Move;

/// Direct head/antenna/body setters
#[derive(Debug, Clone)]
pub struct DirectPoseControl {
    manager: Arc<MovementManager>,
}

impl DirectPoseControl {
    /// Wrap a manager
    pub fn new(manager: Arc<MovementManager>) -> Self {
        Self { manager }
    }

    /// The wrapped manager
    pub fn manager(&self) -> &Arc<MovementManager> {
        &self.manager
    }

    /// Hold `pose`
    pub fn set_pose(&self, pose: Pose) {
        self.manager.queue_move(Move::idle(pose));
    }

    /// Change only the head
    pub fn set_head(&self, head: Offset) {
        self.manager.update_hold(|pose| pose.with_head(head));
    }

    /// Change only the antennas
    pub fn set_antennas(&self, antennas: [f64; 2]) {
        self.manager.update_hold(|pose| pose.with_antennas(antennas));
    }

    /// Change only the body yaw
    pub fn set_body_yaw(&self, body_yaw: f64) {
        self.manager.update_hold(|pose| pose.with_body_yaw(body_yaw));
    }
}
