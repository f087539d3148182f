//! Streaming linear resampler

/// Linear-interpolating sample rate converter
///
/// Keeps its fractional read position and the previous chunk's last sample,
/// so arbitrary chunk boundaries produce the same output as one long buffer.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    from_hz: u32,
    to_hz: u32,
    /// Read position relative to the start of the next chunk, in `[-1, ∞)`
    pos: f64,
    prev: Option<f32>,
}

impl LinearResampler {
    /// Convert from `from_hz` to `to_hz`
    pub fn new(from_hz: u32, to_hz: u32) -> Self {
        Self {
            from_hz: from_hz.max(1),
            to_hz: to_hz.max(1),
            pos: 0.0,
            prev: None,
        }
    }

    /// Input rate
    pub fn from_hz(&self) -> u32 {
        self.from_hz
    }

    /// Output rate
    pub fn to_hz(&self) -> u32 {
        self.to_hz
    }

    /// Whether input passes through unchanged
    pub fn is_passthrough(&self) -> bool {
        self.from_hz == self.to_hz
    }

    /// Forget the read position and carried sample
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev = None;
    }

    /// Resample `input` and append the result to `out`
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if input.is_empty() {
            return;
        }
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }

        let step = f64::from(self.from_hz) / f64::from(self.to_hz);
        let n = input.len() as isize;
        loop {
            let base = self.pos.floor();
            let frac = (self.pos - base) as f32;
            let i = base as isize;
            if i + 1 >= n {
                break;
            }
            let a = if i < 0 {
                self.prev.unwrap_or(input[0])
            } else {
                input[i as usize]
            };
            let b = input[(i + 1) as usize];
            out.push(a + (b - a) * frac);
            self.pos += step;
        }
        self.pos -= n as f64;
        self.prev = input.last().copied();
    }
}
