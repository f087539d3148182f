//! Speech-synchronized head wobble
//!
//! Turns a live mono audio stream into a small oscillating head offset.
//! Each hop measures loudness over the latest frame, runs the voice activity
//! detector, moves a sway envelope toward its attack or release ramp, and
//! scales three fixed sine oscillators by loudness, envelope and master gain.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::TAU;

use super::resample::LinearResampler;
use super::vad::{rms_dbfs, VoiceActivity};
use crate::config::{non_negative, positive_or};
use crate::math::Offset;

/// One sine oscillator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorConfig {
    /// Frequency in Hz
    pub frequency_hz: f64,
    /// Peak amplitude in degrees
    pub amplitude_deg: f64,
    /// Phase at time zero in radians
    pub phase: f64,
}

impl OscillatorConfig {
    /// Create an oscillator
    pub const fn new(frequency_hz: f64, amplitude_deg: f64, phase: f64) -> Self {
        Self {
            frequency_hz,
            amplitude_deg,
            phase,
        }
    }

    fn sample(&self, t: f64) -> f64 {
        self.amplitude_deg.to_radians() * (TAU * self.frequency_hz * t + self.phase).sin()
    }

    fn phase_at(&self, t: f64) -> f64 {
        (TAU * self.frequency_hz * t + self.phase).rem_euclid(TAU)
    }

    fn sanitized(self, fallback: Self) -> Self {
        Self {
            frequency_hz: non_negative(self.frequency_hz),
            amplitude_deg: non_negative(self.amplitude_deg),
            phase: if self.phase.is_finite() {
                self.phase
            } else {
                fallback.phase
            },
        }
    }
}

/// Wobbler tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WobblerConfig {
    /// Internal processing rate in Hz
    pub sample_rate: u32,
    /// Hop length in milliseconds
    pub hop_ms: f64,
    /// Loudness analysis window in milliseconds
    pub frame_ms: f64,
    /// VAD on threshold in dBFS
    pub vad_on_db: f64,
    /// VAD off threshold in dBFS
    pub vad_off_db: f64,
    /// Time above the on threshold before voice is declared
    pub vad_attack_ms: f64,
    /// Time below the off threshold before voice ends
    pub vad_release_ms: f64,
    /// Envelope ramp-up time
    pub sway_attack_ms: f64,
    /// Envelope ramp-down time
    pub sway_release_ms: f64,
    /// Fraction of the remaining distance the envelope covers per hop
    pub envelope_gain: f64,
    /// Added to the measured level before loudness mapping
    pub sensitivity_db: f64,
    /// Level mapped to zero loudness
    pub loudness_floor_db: f64,
    /// Level mapped to full loudness
    pub loudness_ceiling_db: f64,
    /// Loudness curve exponent
    pub loudness_gamma: f64,
    /// Overall output scale
    pub master_gain: f64,
    /// Pitch oscillator
    pub pitch: OscillatorConfig,
    /// Yaw oscillator
    pub yaw: OscillatorConfig,
    /// Roll oscillator
    pub roll: OscillatorConfig,
}

/// Longest hop or analysis frame
const MAX_WINDOW_MS: f64 = 1000.0;
/// Highest internal analysis rate
const MAX_SAMPLE_RATE: u32 = 192_000;

const PITCH: OscillatorConfig = OscillatorConfig::new(2.2, 4.5, 0.0);
const YAW: OscillatorConfig = OscillatorConfig::new(0.6, 7.5, 1.0);
const ROLL: OscillatorConfig = OscillatorConfig::new(1.3, 2.25, 2.0);

impl Default for WobblerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            hop_ms: 10.0,
            frame_ms: 20.0,
            vad_on_db: -35.0,
            vad_off_db: -45.0,
            vad_attack_ms: 40.0,
            vad_release_ms: 250.0,
            sway_attack_ms: 50.0,
            sway_release_ms: 250.0,
            envelope_gain: 0.65,
            sensitivity_db: 4.0,
            loudness_floor_db: -46.0,
            loudness_ceiling_db: -18.0,
            loudness_gamma: 0.9,
            master_gain: 1.5,
            pitch: PITCH,
            yaw: YAW,
            roll: ROLL,
        }
    }
}

impl WobblerConfig {
    /// Set the master gain
    pub fn with_master_gain(mut self, gain: f64) -> Self {
        self.master_gain = gain;
        self
    }

    /// Set both VAD thresholds
    pub fn with_vad_thresholds(mut self, on_db: f64, off_db: f64) -> Self {
        self.vad_on_db = on_db;
        self.vad_off_db = off_db;
        self
    }

    /// Samples per hop at the internal rate
    pub fn hop_samples(&self) -> usize {
        ((f64::from(self.sample_rate) * self.hop_ms / 1000.0).round() as usize).max(1)
    }

    /// Samples per analysis frame at the internal rate
    pub fn frame_samples(&self) -> usize {
        ((f64::from(self.sample_rate) * self.frame_ms / 1000.0).round() as usize)
            .max(self.hop_samples())
    }

    /// Hop length in seconds
    pub fn hop_secs(&self) -> f64 {
        self.hop_samples() as f64 / f64::from(self.sample_rate.max(1))
    }

    fn hops(&self, ms: f64) -> u32 {
        (ms / self.hop_ms).ceil().max(1.0) as u32
    }

    /// Clamp into usable ranges
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let (on, off) = match (self.vad_on_db.is_finite(), self.vad_off_db.is_finite()) {
            (true, true) if self.vad_off_db <= self.vad_on_db => (self.vad_on_db, self.vad_off_db),
            (true, true) => (self.vad_off_db, self.vad_on_db),
            _ => (d.vad_on_db, d.vad_off_db),
        };
        let (floor, ceiling) = if self.loudness_floor_db.is_finite()
            && self.loudness_ceiling_db.is_finite()
            && self.loudness_ceiling_db > self.loudness_floor_db
        {
            (self.loudness_floor_db, self.loudness_ceiling_db)
        } else {
            (d.loudness_floor_db, d.loudness_ceiling_db)
        };
        let hop_ms = positive_or(self.hop_ms, d.hop_ms).min(MAX_WINDOW_MS);
        Self {
            sample_rate: if (1000..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
                self.sample_rate
            } else {
                d.sample_rate
            },
            hop_ms,
            frame_ms: positive_or(self.frame_ms, d.frame_ms)
                .min(MAX_WINDOW_MS)
                .max(hop_ms),
            vad_on_db: on,
            vad_off_db: off,
            vad_attack_ms: non_negative(self.vad_attack_ms),
            vad_release_ms: non_negative(self.vad_release_ms),
            sway_attack_ms: non_negative(self.sway_attack_ms),
            sway_release_ms: non_negative(self.sway_release_ms),
            envelope_gain: if self.envelope_gain.is_finite() {
                self.envelope_gain.clamp(0.0, 1.0)
            } else {
                d.envelope_gain
            },
            sensitivity_db: if self.sensitivity_db.is_finite() {
                self.sensitivity_db
            } else {
                d.sensitivity_db
            },
            loudness_floor_db: floor,
            loudness_ceiling_db: ceiling,
            loudness_gamma: positive_or(self.loudness_gamma, d.loudness_gamma),
            master_gain: non_negative(self.master_gain),
            pitch: self.pitch.sanitized(PITCH),
            yaw: self.yaw.sanitized(YAW),
            roll: self.roll.sanitized(ROLL),
        }
    }

    /// Map a level in dBFS to a loudness scale in `[0, 1]`
    pub fn loudness(&self, level_db: f64) -> f64 {
        let span = self.loudness_ceiling_db - self.loudness_floor_db;
        if !(span > 0.0) || !level_db.is_finite() {
            return 0.0;
        }
        let t = ((level_db + self.sensitivity_db - self.loudness_floor_db) / span).clamp(0.0, 1.0);
        t.powf(self.loudness_gamma)
    }
}

/// Snapshot of the wobbler's transient state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WobblerState {
    /// Voice currently detected
    pub vad_active: bool,
    /// Consecutive hops at or above the on threshold
    pub vad_above: u32,
    /// Consecutive hops at or below the off threshold
    pub vad_below: u32,
    /// Sway envelope in `[0, 1]`
    pub envelope: f64,
    /// Loudness scale of the latest hop
    pub loudness: f64,
    /// Level of the latest frame in dBFS
    pub level_db: f64,
    /// Oscillator phases (pitch, yaw, roll) in radians
    pub phases: [f64; 3],
    /// Running time in seconds
    pub time_secs: f64,
    /// Hops processed since the last reset
    pub hops: u64,
}

/// Speech-to-motion processor
///
/// `feed` is synchronous and calls `on_offset` once per completed hop, so
/// the callback must be cheap, e.g. a manager's speech offset setter.
///
/// # Example
/// ```
/// use motion_core::{Offset, SpeechWobbler, WobblerConfig};
///
/// let mut last = Offset::ZERO;
/// let mut wobbler = SpeechWobbler::new(WobblerConfig::default(), |o| last = o);
/// wobbler.feed(&[0.0f32; 1600], 16_000);
/// drop(wobbler);
/// assert_eq!(last, Offset::ZERO);
/// ```
pub struct SpeechWobbler<F: FnMut(Offset)> {
    config: WobblerConfig,
    on_offset: F,
    resampler: LinearResampler,
    scratch: Vec<f32>,
    pending: Vec<f32>,
    window: VecDeque<f32>,
    vad: VoiceActivity,
    sway_up: u32,
    sway_down: u32,
    envelope: f64,
    loudness: f64,
    level_db: f64,
    time_secs: f64,
    hops: u64,
}

impl<F: FnMut(Offset)> SpeechWobbler<F> {
    /// Create a wobbler emitting offsets to `on_offset`
    pub fn new(config: WobblerConfig, on_offset: F) -> Self {
        let config = config.sanitized();
        Self {
            resampler: LinearResampler::new(config.sample_rate, config.sample_rate),
            scratch: Vec::new(),
            pending: Vec::new(),
            window: VecDeque::with_capacity(config.frame_samples()),
            vad: Self::detector(&config),
            sway_up: 0,
            sway_down: 0,
            envelope: 0.0,
            loudness: 0.0,
            level_db: rms_dbfs(&[] as &[f32]),
            time_secs: 0.0,
            hops: 0,
            config,
            on_offset,
        }
    }

    fn detector(config: &WobblerConfig) -> VoiceActivity {
        VoiceActivity::new(
            config.vad_on_db,
            config.vad_off_db,
            config.hops(config.vad_attack_ms),
            config.hops(config.vad_release_ms),
        )
    }

    /// Active configuration
    pub fn config(&self) -> &WobblerConfig {
        &self.config
    }

    /// Current transient state
    pub fn state(&self) -> WobblerState {
        let t = self.time_secs;
        WobblerState {
            vad_active: self.vad.is_active(),
            vad_above: self.vad.above(),
            vad_below: self.vad.below(),
            envelope: self.envelope,
            loudness: self.loudness,
            level_db: self.level_db,
            phases: [
                self.config.pitch.phase_at(t),
                self.config.yaw.phase_at(t),
                self.config.roll.phase_at(t),
            ],
            time_secs: t,
            hops: self.hops,
        }
    }

    /// Process normalized float samples recorded at `sample_rate`
    pub fn feed(&mut self, samples: &[f32], sample_rate: u32) {
        if sample_rate == 0 {
            tracing::warn!(len = samples.len(), "dropping audio chunk with zero sample rate");
            return;
        }
        if self.resampler.from_hz() != sample_rate {
            tracing::debug!(
                from = sample_rate,
                to = self.config.sample_rate,
                "wobbler input rate changed"
            );
            self.resampler = LinearResampler::new(sample_rate, self.config.sample_rate);
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        self.resampler.process(samples, &mut scratch);
        self.pending.extend_from_slice(&scratch);
        self.scratch = scratch;

        let hop = self.config.hop_samples();
        let mut consumed = 0;
        while self.pending.len() - consumed >= hop {
            let end = consumed + hop;
            self.push_window(end - hop, end);
            self.process_hop();
            consumed = end;
        }
        self.pending.drain(..consumed);
    }

    /// Process signed 16-bit samples recorded at `sample_rate`
    pub fn feed_i16(&mut self, samples: &[i16], sample_rate: u32) {
        let floats: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
        self.feed(&floats, sample_rate);
    }

    /// Clear detector, envelope, time and buffers, and emit a zero offset
    pub fn reset(&mut self) {
        self.resampler.reset();
        self.pending.clear();
        self.window.clear();
        self.vad.reset();
        self.sway_up = 0;
        self.sway_down = 0;
        self.envelope = 0.0;
        self.loudness = 0.0;
        self.level_db = rms_dbfs(&[] as &[f32]);
        self.time_secs = 0.0;
        self.hops = 0;
        (self.on_offset)(Offset::ZERO);
    }

    fn push_window(&mut self, start: usize, end: usize) {
        let frame = self.config.frame_samples();
        for &s in &self.pending[start..end] {
            if self.window.len() == frame {
                self.window.pop_front();
            }
            self.window.push_back(s);
        }
    }

    fn process_hop(&mut self) {
        let c = self.config;

        self.level_db = rms_dbfs(&self.window);
        let was_active = self.vad.is_active();
        let active = self.vad.update(self.level_db);
        if active != was_active {
            tracing::debug!(active, level_db = self.level_db, "voice activity changed");
        }

        let target = if active {
            let attack = c.hops(c.sway_attack_ms);
            self.sway_up = (self.sway_up + 1).min(attack);
            self.sway_down = 0;
            f64::from(self.sway_up) / f64::from(attack)
        } else {
            let release = c.hops(c.sway_release_ms);
            self.sway_down = (self.sway_down + 1).min(release);
            self.sway_up = 0;
            1.0 - f64::from(self.sway_down) / f64::from(release)
        };
        self.envelope += c.envelope_gain * (target - self.envelope);
        self.envelope = self.envelope.clamp(0.0, 1.0);

        self.loudness = c.loudness(self.level_db);

        let t = self.time_secs;
        let scale = self.loudness * self.envelope * c.master_gain;
        let offset = Offset::new(
            c.roll.sample(t) * scale,
            c.pitch.sample(t) * scale,
            c.yaw.sample(t) * scale,
        );

        self.hops += 1;
        self.time_secs = self.hops as f64 * c.hop_secs();
        (self.on_offset)(offset);
    }
}

impl<F: FnMut(Offset)> std::fmt::Debug for SpeechWobbler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechWobbler")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
