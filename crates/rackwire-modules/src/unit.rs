//! The closed set of concrete modules a patch can instantiate.

#[cfg(not(feature = "std"))]
use alloc::string::{String, ToString};

use rackwire_core::{BlockIo, Module, PortSpec};
use thiserror::Error;

use crate::envelope::Envelope;
use crate::oscillator::{Oscillator, Waveform};
use crate::utility::{Constant, Gain, Gate, Pitch, Probe};

/// Kind of a [`Unit`], without its state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Constant `f32` source.
    Constant,
    /// Sine/saw/square oscillator with an `f64` frequency input.
    Oscillator,
    /// Linear gain.
    Gain,
    /// Linear gain on a summing input.
    Mixer,
    /// Attack/release envelope with an `i32` gate input.
    Envelope,
    /// Constant `i32` gate source.
    Gate,
    /// Constant `f64` frequency source.
    Pitch,
    /// Pass-through tap with peak tracking.
    Probe,
}

/// Description of one numeric parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    /// Name used in patch files.
    pub name: &'static str,
    /// Minimum accepted value.
    pub min: f32,
    /// Maximum accepted value.
    pub max: f32,
    /// Value a fresh unit starts with.
    pub default: f32,
    /// For enumerated parameters, the value names in index order.
    pub choices: &'static [&'static str],
}

impl ParamSpec {
    const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            choices: &[],
        }
    }

    const fn choice(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self {
            name,
            min: 0.0,
            max: (choices.len() - 1) as f32,
            default: 0.0,
            choices,
        }
    }

    /// Returns true for enumerated parameters.
    pub fn is_choice(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Index of a named choice.
    pub fn choice_index(&self, value: &str) -> Option<usize> {
        self.choices.iter().position(|c| c.eq_ignore_ascii_case(value))
    }
}

/// Parameter update failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// The unit has no parameter with that name.
    #[error("module kind '{kind}' has no parameter '{name}'")]
    UnknownParam {
        /// Unit kind name.
        kind: &'static str,
        /// Requested parameter.
        name: String,
    },

    /// The value is outside the parameter's range.
    #[error("parameter '{name}' = {value} is outside {min}..={max}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f32,
        /// Minimum accepted value.
        min: f32,
        /// Maximum accepted value.
        max: f32,
    },

    /// The value names no choice of an enumerated parameter.
    #[error("parameter '{name}' has no choice '{value}' (expected one of {choices:?})")]
    UnknownChoice {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: String,
        /// Accepted values.
        choices: &'static [&'static str],
    },
}

const AUDIO_IN: &[PortSpec] = &[PortSpec::of::<f32>("in")];
const MIX_IN: &[PortSpec] = &[PortSpec::of::<f32>("in").summing()];
const HZ_IN: &[PortSpec] = &[PortSpec::of::<f64>("hz")];
const GATE_IN: &[PortSpec] = &[PortSpec::of::<i32>("gate")];
const AUDIO_OUT: &[PortSpec] = &[PortSpec::of::<f32>("out")];
const GATE_OUT: &[PortSpec] = &[PortSpec::of::<i32>("gate")];
const HZ_OUT: &[PortSpec] = &[PortSpec::of::<f64>("hz")];

const VALUE_PARAMS: &[ParamSpec] = &[ParamSpec::new("value", -1.0e6, 1.0e6, 0.0)];
const OSC_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 0.0, 20000.0, 440.0),
    ParamSpec::choice("waveform", Waveform::NAMES),
];
const LEVEL_PARAMS: &[ParamSpec] = &[ParamSpec::new("level", -16.0, 16.0, 1.0)];
const ENV_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("attack", 0.0001, 10.0, 0.005),
    ParamSpec::new("release", 0.0001, 10.0, 0.2),
];
const GATE_PARAMS: &[ParamSpec] = &[ParamSpec::new("value", 0.0, 1.0, 0.0)];
const PITCH_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("frequency", 0.0, 20000.0, 440.0),
    ParamSpec::new("note", 0.0, 127.0, 69.0),
];

impl UnitKind {
    /// Every kind, in listing order.
    pub const ALL: [UnitKind; 8] = [
        Self::Constant,
        Self::Oscillator,
        Self::Gain,
        Self::Mixer,
        Self::Envelope,
        Self::Gate,
        Self::Pitch,
        Self::Probe,
    ];

    /// Name used in patch files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Oscillator => "oscillator",
            Self::Gain => "gain",
            Self::Mixer => "mixer",
            Self::Envelope => "envelope",
            Self::Gate => "gate",
            Self::Pitch => "pitch",
            Self::Probe => "probe",
        }
    }

    /// Looks up a kind by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Input ports.
    pub const fn inputs(self) -> &'static [PortSpec] {
        match self {
            Self::Constant | Self::Gate | Self::Pitch => &[],
            Self::Oscillator => HZ_IN,
            Self::Gain | Self::Probe => AUDIO_IN,
            Self::Mixer => MIX_IN,
            Self::Envelope => GATE_IN,
        }
    }

    /// Output ports.
    pub const fn outputs(self) -> &'static [PortSpec] {
        match self {
            Self::Gate => GATE_OUT,
            Self::Pitch => HZ_OUT,
            _ => AUDIO_OUT,
        }
    }

    /// Settable parameters.
    pub const fn params(self) -> &'static [ParamSpec] {
        match self {
            Self::Constant => VALUE_PARAMS,
            Self::Oscillator => OSC_PARAMS,
            Self::Gain | Self::Mixer => LEVEL_PARAMS,
            Self::Envelope => ENV_PARAMS,
            Self::Gate => GATE_PARAMS,
            Self::Pitch => PITCH_PARAMS,
            Self::Probe => &[],
        }
    }

    /// Looks up one parameter by name.
    pub fn param(self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|p| p.name == name)
    }
}

impl core::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete module. The renderer is generic over this one type, so every
/// `Render` action dispatches through a single `match`.
#[derive(Debug, Clone)]
pub enum Unit {
    /// See [`UnitKind::Constant`].
    Constant(Constant),
    /// See [`UnitKind::Oscillator`].
    Oscillator(Oscillator),
    /// See [`UnitKind::Gain`].
    Gain(Gain),
    /// See [`UnitKind::Mixer`].
    Mixer(Gain),
    /// See [`UnitKind::Envelope`].
    Envelope(Envelope),
    /// See [`UnitKind::Gate`].
    Gate(Gate),
    /// See [`UnitKind::Pitch`].
    Pitch(Pitch),
    /// See [`UnitKind::Probe`].
    Probe(Probe),
}

impl Unit {
    /// Creates a unit of `kind` with default parameters.
    pub fn new(kind: UnitKind, sample_rate: f32) -> Self {
        match kind {
            UnitKind::Constant => Self::constant(0.0),
            UnitKind::Oscillator => Self::oscillator(sample_rate, 440.0),
            UnitKind::Gain => Self::gain(1.0),
            UnitKind::Mixer => Self::mixer(1.0),
            UnitKind::Envelope => Self::envelope(sample_rate, 0.005, 0.2),
            UnitKind::Gate => Self::gate(false),
            UnitKind::Pitch => Self::pitch(440.0),
            UnitKind::Probe => Self::probe(),
        }
    }

    /// Constant source.
    pub fn constant(value: f32) -> Self {
        Self::Constant(Constant { value })
    }

    /// Sine oscillator at `frequency` Hz.
    pub fn oscillator(sample_rate: f32, frequency: f32) -> Self {
        Self::Oscillator(Oscillator::new(sample_rate, frequency))
    }

    /// Gain stage.
    pub fn gain(level: f32) -> Self {
        Self::Gain(Gain { level })
    }

    /// Summing mixer with output `level`.
    pub fn mixer(level: f32) -> Self {
        Self::Mixer(Gain { level })
    }

    /// Attack/release envelope, times in seconds.
    pub fn envelope(sample_rate: f32, attack: f32, release: f32) -> Self {
        Self::Envelope(Envelope::new(sample_rate, attack, release))
    }

    /// Gate source.
    pub fn gate(open: bool) -> Self {
        Self::Gate(Gate {
            value: i32::from(open),
        })
    }

    /// Frequency source.
    pub fn pitch(hz: f64) -> Self {
        Self::Pitch(Pitch { hz })
    }

    /// Pass-through tap.
    pub fn probe() -> Self {
        Self::Probe(Probe::default())
    }

    /// Kind of this unit.
    pub fn kind(&self) -> UnitKind {
        match self {
            Self::Constant(_) => UnitKind::Constant,
            Self::Oscillator(_) => UnitKind::Oscillator,
            Self::Gain(_) => UnitKind::Gain,
            Self::Mixer(_) => UnitKind::Mixer,
            Self::Envelope(_) => UnitKind::Envelope,
            Self::Gate(_) => UnitKind::Gate,
            Self::Pitch(_) => UnitKind::Pitch,
            Self::Probe(_) => UnitKind::Probe,
        }
    }

    /// Sets a numeric parameter. Enumerated parameters take the choice index.
    pub fn set_param(&mut self, name: &str, value: f32) -> Result<(), ParamError> {
        let spec = self.kind().param(name).ok_or_else(|| ParamError::UnknownParam {
            kind: self.kind().name(),
            name: name.to_string(),
        })?;
        if !(spec.min..=spec.max).contains(&value) {
            return Err(ParamError::OutOfRange {
                name: spec.name,
                value,
                min: spec.min,
                max: spec.max,
            });
        }

        match (self, spec.name) {
            (Self::Constant(c), "value") => c.value = value,
            (Self::Oscillator(osc), "frequency") => osc.set_frequency(value),
            (Self::Oscillator(osc), "waveform") => {
                if let Some(waveform) = Waveform::from_index(value as usize) {
                    osc.set_waveform(waveform);
                }
            }
            (Self::Gain(g) | Self::Mixer(g), "level") => g.level = value,
            (Self::Envelope(env), "attack") => env.set_attack(value),
            (Self::Envelope(env), "release") => env.set_release(value),
            (Self::Gate(g), "value") => g.value = value as i32,
            (Self::Pitch(p), "frequency") => p.hz = f64::from(value),
            (Self::Pitch(p), "note") => p.set_note(value as u8),
            _ => {}
        }
        Ok(())
    }

    /// Sets an enumerated parameter by choice name.
    pub fn set_choice(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        let kind = self.kind();
        let spec = kind
            .param(name)
            .filter(|spec| spec.is_choice())
            .ok_or_else(|| ParamError::UnknownParam {
                kind: kind.name(),
                name: name.to_string(),
            })?;
        let index = spec
            .choice_index(value)
            .ok_or_else(|| ParamError::UnknownChoice {
                name: spec.name,
                value: value.to_string(),
                choices: spec.choices,
            })?;
        self.set_param(name, index as f32)
    }

    /// Reads a parameter's current value.
    pub fn param(&self, name: &str) -> Option<f32> {
        let value = match (self, name) {
            (Self::Constant(c), "value") => c.value,
            (Self::Oscillator(osc), "frequency") => osc.frequency(),
            (Self::Oscillator(osc), "waveform") => osc.waveform().index() as f32,
            (Self::Gain(g) | Self::Mixer(g), "level") => g.level,
            (Self::Envelope(env), "attack") => env.attack(),
            (Self::Envelope(env), "release") => env.release(),
            (Self::Gate(g), "value") => g.value as f32,
            (Self::Pitch(p), "frequency") => p.hz as f32,
            (Self::Pitch(p), "note") => f32::from(p.note()),
            _ => return None,
        };
        Some(value)
    }
}

impl Module for Unit {
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn inputs(&self) -> &'static [PortSpec] {
        self.kind().inputs()
    }

    fn outputs(&self) -> &'static [PortSpec] {
        self.kind().outputs()
    }

    fn render(&mut self, io: &mut BlockIo<'_>, _frames: usize) {
        match self {
            Self::Constant(c) => io.output::<f32>(0).fill(c.value),
            Self::Gate(g) => io.output::<i32>(0).fill(g.value),
            Self::Pitch(p) => io.output::<f64>(0).fill(p.hz),
            Self::Oscillator(osc) => {
                let (inputs, mut outputs) = io.split();
                osc.render(inputs.get::<f64>(0), outputs.get_mut::<f32>(0));
            }
            Self::Envelope(env) => {
                let (inputs, mut outputs) = io.split();
                env.render(inputs.get::<i32>(0), outputs.get_mut::<f32>(0));
            }
            Self::Gain(g) | Self::Mixer(g) => {
                let (inputs, mut outputs) = io.split();
                g.render(inputs.get::<f32>(0), outputs.get_mut::<f32>(0));
            }
            Self::Probe(p) => {
                let (inputs, mut outputs) = io.split();
                p.render(inputs.get::<f32>(0), outputs.get_mut::<f32>(0));
            }
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Oscillator(osc) => osc.reset(),
            Self::Envelope(env) => env.reset(),
            Self::Probe(p) => p.peak = 0.0,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackwire_core::ElementType;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in UnitKind::ALL {
            assert_eq!(UnitKind::from_name(kind.name()), Some(kind));
            assert_eq!(Unit::new(kind, 48000.0).kind(), kind);
        }
        assert_eq!(UnitKind::from_name("OSCILLATOR"), Some(UnitKind::Oscillator));
        assert_eq!(UnitKind::from_name("reverb"), None);
    }

    #[test]
    fn test_port_types() {
        assert_eq!(UnitKind::Oscillator.inputs()[0].element, ElementType::F64);
        assert_eq!(UnitKind::Envelope.inputs()[0].element, ElementType::I32);
        assert_eq!(UnitKind::Gate.outputs()[0].element, ElementType::I32);
        assert_eq!(UnitKind::Pitch.outputs()[0].element, ElementType::F64);
        assert!(UnitKind::Mixer.inputs()[0].summing);
        assert!(!UnitKind::Gain.inputs()[0].summing);
    }

    #[test]
    fn test_defaults_match_param_specs() {
        for kind in UnitKind::ALL {
            let unit = Unit::new(kind, 48000.0);
            for spec in kind.params() {
                if let Some(value) = unit.param(spec.name) {
                    assert_eq!(value, spec.default, "{kind}.{}", spec.name);
                }
            }
        }
    }

    #[test]
    fn test_set_param_validates() {
        let mut unit = Unit::gain(1.0);
        unit.set_param("level", 0.25).unwrap();
        assert_eq!(unit.param("level"), Some(0.25));

        assert!(matches!(
            unit.set_param("drive", 1.0),
            Err(ParamError::UnknownParam { kind: "gain", .. })
        ));
        assert!(matches!(
            unit.set_param("level", 100.0),
            Err(ParamError::OutOfRange { .. })
        ));
        assert!(matches!(
            unit.set_param("level", f32::NAN),
            Err(ParamError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_set_choice() {
        let mut unit = Unit::oscillator(48000.0, 220.0);
        unit.set_choice("waveform", "Saw").unwrap();
        match &unit {
            Unit::Oscillator(osc) => assert_eq!(osc.waveform(), Waveform::Saw),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            unit.set_choice("waveform", "triangle"),
            Err(ParamError::UnknownChoice { .. })
        ));
        assert!(matches!(
            unit.set_choice("frequency", "saw"),
            Err(ParamError::UnknownParam { .. })
        ));
    }

    #[test]
    fn test_pitch_note_param() {
        let mut unit = Unit::pitch(0.0);
        unit.set_param("note", 81.0).unwrap();
        assert!((unit.param("frequency").unwrap() - 880.0).abs() < 1e-3);
        assert_eq!(unit.param("note"), Some(81.0));

        unit.set_param("frequency", 261.63).unwrap();
        assert_eq!(unit.param("note"), Some(60.0));
    }

    #[test]
    fn test_param_error_display() {
        let err = ParamError::OutOfRange {
            name: "level",
            value: 100.0,
            min: -16.0,
            max: 16.0,
        };
        assert_eq!(err.to_string(), "parameter 'level' = 100 is outside -16..=16");
    }
}
