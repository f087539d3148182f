//! Hardware command boundary
//!
//! The crate does not drive motors itself; it produces [`PoseCommand`]s and
//! hands them to a [`PoseSink`].

mod traits;

pub use traits::{ChannelSink, MockSink, PoseCommand, PoseSink};
