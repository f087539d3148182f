//! Reactive head corrections
//!
//! Producers for the face tracking and audio slots of
//! [`SecondaryOffsets`](crate::control::SecondaryOffsets).

mod doa;
mod face;

pub use doa::{DoaClient, DoaConfig, DoaReading, DoaTracker};
pub use face::{FaceTracker, FaceTrackingConfig};
