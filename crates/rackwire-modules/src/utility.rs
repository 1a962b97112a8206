//! Sources, gain stages and taps.

/// Holds a constant `f32` on its output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    /// Output value.
    pub value: f32,
}

/// Holds a constant `i32` gate on its output. Above zero means open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gate {
    /// Output value.
    pub value: i32,
}

impl Gate {
    /// Opens or closes the gate.
    pub fn set_open(&mut self, open: bool) {
        self.value = i32::from(open);
    }

    /// Returns true when the gate is open.
    pub fn is_open(&self) -> bool {
        self.value > 0
    }
}

/// Holds a note frequency in Hz on an `f64` output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    /// Output frequency in Hz.
    pub hz: f64,
}

impl Pitch {
    /// Tunes to a MIDI note.
    pub fn set_note(&mut self, note: u8) {
        self.hz = midi_to_freq(note);
    }

    /// Nearest MIDI note to the current frequency, clamped to `0..=127`.
    pub fn note(&self) -> u8 {
        if self.hz <= 0.0 {
            return 0;
        }
        let note = 69.0 + 12.0 * libm::log2(self.hz / 440.0);
        libm::round(note).clamp(0.0, 127.0) as u8
    }
}

/// Scales its input by `level`. Also used as the summing bus (`Mixer`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    /// Linear gain.
    pub level: f32,
}

impl Gain {
    /// Fills `out` with `input * level`.
    #[inline]
    pub fn render(&self, input: &[f32], out: &mut [f32]) {
        for (o, &i) in out.iter_mut().zip(input) {
            *o = i * self.level;
        }
    }
}

/// Pass-through tap that tracks the peak magnitude it has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Probe {
    /// Largest absolute sample since the last reset.
    pub peak: f32,
}

impl Probe {
    /// Copies `input` to `out` and updates the peak.
    #[inline]
    pub fn render(&mut self, input: &[f32], out: &mut [f32]) {
        out.copy_from_slice(input);
        self.peak = input.iter().fold(self.peak, |peak, v| peak.max(v.abs()));
    }
}

/// Converts a MIDI note number to frequency in Hz (A4 = 69 = 440 Hz).
#[inline]
pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * libm::pow(2.0, (f64::from(note) - 69.0) / 12.0)
}
