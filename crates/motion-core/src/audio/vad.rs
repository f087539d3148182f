//! Loudness measurement and voice activity detection

/// RMS level of `samples` in dBFS
///
/// Silence maps to about -240 dB rather than negative infinity.
pub fn rms_dbfs<'a, I>(samples: I) -> f64
where
    I: IntoIterator<Item = &'a f32>,
{
    let (sum, count) = samples
        .into_iter()
        .fold((0.0f64, 0usize), |(sum, n), &s| {
            let s = if s.is_finite() { f64::from(s) } else { 0.0 };
            (sum + s * s, n + 1)
        });
    let rms = if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    };
    20.0 * (rms + 1e-12).log10()
}

/// Two-threshold voice activity detector
///
/// Turns on after `attack` consecutive hops at or above `on_db`, and off
/// after `release` consecutive hops at or below `off_db`. Levels strictly
/// between the thresholds leave both counters untouched.
#[derive(Debug, Clone)]
pub struct VoiceActivity {
    on_db: f64,
    off_db: f64,
    attack: u32,
    release: u32,
    above: u32,
    below: u32,
    active: bool,
}

impl VoiceActivity {
    /// Create a detector
    pub fn new(on_db: f64, off_db: f64, attack: u32, release: u32) -> Self {
        Self {
            on_db,
            off_db,
            attack: attack.max(1),
            release: release.max(1),
            above: 0,
            below: 0,
            active: false,
        }
    }

    /// Feed one hop's level; returns whether voice is active afterwards
    pub fn update(&mut self, level_db: f64) -> bool {
        if level_db >= self.on_db {
            self.above = self.above.saturating_add(1);
            self.below = 0;
            if !self.active && self.above >= self.attack {
                self.active = true;
            }
        } else if level_db <= self.off_db {
            self.below = self.below.saturating_add(1);
            self.above = 0;
            if self.active && self.below >= self.release {
                self.active = false;
            }
        }
        self.active
    }

    /// Whether voice is currently active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Consecutive hops at or above the on threshold
    pub fn above(&self) -> u32 {
        self.above
    }

    /// Consecutive hops at or below the off threshold
    pub fn below(&self) -> u32 {
        self.below
    }

    /// Back to inactive with zeroed counters
    pub fn reset(&mut self) {
        self.above = 0;
        self.below = 0;
        self.active = false;
    }
}
