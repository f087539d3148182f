//! Reactive offsets layered on top of the primary move

use serde::{Deserialize, Serialize};

use crate::math::Offset;

/// One slot per reactive producer
///
/// Each slot has a single writer (face tracker, speech wobbler, DOA client).
/// Locking is provided by the owning [`MovementManager`](super::MovementManager).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryOffsets {
    /// Face tracking correction
    pub face_tracking: Offset,
    /// Speech wobble
    pub speech: Offset,
    /// Audio direction-of-arrival correction
    pub audio: Offset,
}

impl SecondaryOffsets {
    /// Element-wise sum of all slots
    #[inline]
    pub fn combined(&self) -> Offset {
        self.face_tracking + self.speech + self.audio
    }

    /// Zero every slot
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
