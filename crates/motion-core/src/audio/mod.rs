//! Speech-synchronized motion
//!
//! [`SpeechWobbler`] consumes audio chunks and emits a head [`Offset`] per
//! hop. Wire it to a manager with [`speech_offset_writer`].

mod resample;
mod vad;
mod wobbler;

pub use resample::LinearResampler;
pub use vad::{rms_dbfs, VoiceActivity};
pub use wobbler::{OscillatorConfig, SpeechWobbler, WobblerConfig, WobblerState};

use std::sync::Arc;

use crate::control::MovementManager;
use crate::math::Offset;

/// Callback that writes each wobble offset into `manager`'s speech slot
pub fn speech_offset_writer(manager: &Arc<MovementManager>) -> impl FnMut(Offset) + Send {
    let manager = Arc::clone(manager);
    move |offset| manager.set_speech_offset(offset)
}
