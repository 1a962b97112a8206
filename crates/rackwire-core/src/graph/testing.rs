//! Small modules shared by the graph unit tests.

use crate::module::{BlockIo, Module};
use crate::port::PortSpec;

/// Writes a constant to its `f32` output.
#[derive(Debug, Default)]
pub(crate) struct Source {
    pub value: f32,
    pub renders: usize,
}

impl Source {
    pub fn new(value: f32) -> Self {
        Self { value, renders: 0 }
    }
}

/// Copies its `f32` input to its output and counts renders.
#[derive(Debug, Default)]
pub(crate) struct Probe {
    pub renders: usize,
    pub resets: usize,
}

pub(crate) enum TestModule {
    Source(Source),
    /// Constant `f64` source.
    Source64(f64),
    /// Constant `i32` source.
    Ints(i32),
    Probe(Probe),
    /// A probe whose input sums.
    Mixer(Probe),
    /// Declares one input more than a port mask holds.
    Wide,
}

const F32_OUT: &[PortSpec] = &[PortSpec::of::<f32>("out")];
const F64_OUT: &[PortSpec] = &[PortSpec::of::<f64>("out")];
const I32_OUT: &[PortSpec] = &[PortSpec::of::<i32>("out")];
const F32_IN: &[PortSpec] = &[PortSpec::of::<f32>("in")];
const SUM_IN: &[PortSpec] = &[PortSpec::of::<f32>("in").summing()];
const WIDE_IN: &[PortSpec] = &[PortSpec::of::<f32>("x"); 65];

impl Module for TestModule {
    fn name(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Source64(_) => "source64",
            Self::Ints(_) => "ints",
            Self::Probe(_) => "probe",
            Self::Mixer(_) => "mixer",
            Self::Wide => "wide",
        }
    }

    fn inputs(&self) -> &'static [PortSpec] {
        match self {
            Self::Source(_) | Self::Source64(_) | Self::Ints(_) => &[],
            Self::Probe(_) => F32_IN,
            Self::Mixer(_) => SUM_IN,
            Self::Wide => WIDE_IN,
        }
    }

    fn outputs(&self) -> &'static [PortSpec] {
        match self {
            Self::Source(_) | Self::Probe(_) | Self::Mixer(_) => F32_OUT,
            Self::Source64(_) => F64_OUT,
            Self::Ints(_) => I32_OUT,
            Self::Wide => &[],
        }
    }

    fn render(&mut self, io: &mut BlockIo<'_>, _frames: usize) {
        match self {
            Self::Source(source) => {
                source.renders += 1;
                io.output::<f32>(0).fill(source.value);
            }
            Self::Source64(value) => io.output::<f64>(0).fill(*value),
            Self::Ints(value) => io.output::<i32>(0).fill(*value),
            Self::Probe(probe) | Self::Mixer(probe) => {
                probe.renders += 1;
                let (inputs, mut outputs) = io.split();
                outputs.get_mut::<f32>(0).copy_from_slice(inputs.get::<f32>(0));
            }
            Self::Wide => {}
        }
    }

    fn reset(&mut self) {
        if let Self::Probe(probe) | Self::Mixer(probe) = self {
            probe.resets += 1;
        }
    }
}
