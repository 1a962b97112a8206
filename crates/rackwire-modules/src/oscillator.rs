//! Audio-rate oscillator with PolyBLEP anti-aliasing.

use core::f32::consts::PI;
use libm::sinf;

/// Oscillator waveform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Pure fundamental.
    #[default]
    Sine,
    /// All harmonics, bright.
    Saw,
    /// 50% duty, odd harmonics.
    Square,
}

impl Waveform {
    /// Names in parameter-index order.
    pub const NAMES: &'static [&'static str] = &["sine", "saw", "square"];

    /// Looks up a waveform by its parameter index.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Sine),
            1 => Some(Self::Saw),
            2 => Some(Self::Square),
            _ => None,
        }
    }

    /// Parameter index of this waveform.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Phase-accumulating oscillator.
///
/// The rendered frequency is `frequency + hz[i]` per frame, so a patch can
/// either fix the pitch as a parameter or drive it from a `Pitch` module with
/// `frequency` left at zero. Negative sums clamp to zero.
///
/// ## Parameters
/// - `frequency`: Base frequency in Hz (0.0 to 20000.0, default 440.0)
/// - `waveform`: `sine`, `saw` or `square` (default `sine`)
#[derive(Debug, Clone)]
pub struct Oscillator {
    sample_rate: f32,
    frequency: f32,
    waveform: Waveform,
    phase: f32,
}

impl Oscillator {
    /// Creates a sine oscillator at `frequency` Hz.
    pub fn new(sample_rate: f32, frequency: f32) -> Self {
        Self {
            sample_rate,
            frequency,
            waveform: Waveform::Sine,
            phase: 0.0,
        }
    }

    /// Sets the base frequency in Hz.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency.max(0.0);
    }

    /// Base frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Sets the waveform.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Restarts at phase zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Fills `out`, offsetting the base frequency by `hz` frame by frame.
    pub fn render(&mut self, hz: &[f64], out: &mut [f32]) {
        for (sample, &offset) in out.iter_mut().zip(hz) {
            let frequency = (self.frequency + offset as f32).max(0.0);
            let dt = (frequency / self.sample_rate).min(0.5);
            *sample = self.sample(dt);
            self.phase += dt;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    #[inline]
    fn sample(&self, dt: f32) -> f32 {
        let phase = self.phase;
        match self.waveform {
            Waveform::Sine => sinf(phase * 2.0 * PI),
            Waveform::Saw => 2.0 * phase - 1.0 - poly_blep(phase, dt),
            Waveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                let falling = phase + 0.5;
                let falling = if falling >= 1.0 { falling - 1.0 } else { falling };
                naive + poly_blep(phase, dt) - poly_blep(falling, dt)
            }
        }
    }
}

/// Two-sample polynomial band-limited step residual at a phase wrap.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let n = t / dt;
        n + n - n * n - 1.0
    } else if t > 1.0 - dt {
        let n = (t - 1.0) / dt;
        n * n + n + n + 1.0
    } else {
        0.0
    }
}
