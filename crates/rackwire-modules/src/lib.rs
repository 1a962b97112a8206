//! Rackwire Modules - concrete modules for the rackwire render core
//!
//! This crate provides the closed set of modules a patch can instantiate and
//! a voice pool that implements the core's allocator contract.
//!
//! # Core Components
//!
//! ## Units
//!
//! - [`Unit`] - The module enum the renderer is generic over
//! - [`UnitKind`] - Kind names, port tables and [`ParamSpec`]s without state
//!
//! | Kind | Inputs | Outputs |
//! |------|--------|---------|
//! | `constant` | | `out: f32` |
//! | `oscillator` | `hz: f64` | `out: f32` |
//! | `gain` | `in: f32` | `out: f32` |
//! | `mixer` | `in: f32` (summing) | `out: f32` |
//! | `envelope` | `gate: i32` | `out: f32` |
//! | `gate` | | `gate: i32` |
//! | `pitch` | | `hz: f64` |
//! | `probe` | `in: f32` | `out: f32` |
//!
//! ## Voice Management
//!
//! - [`VoicePool`] - Polyphonic voice allocation over module chains
//! - [`VoiceAllocationMode`] - Voice stealing strategies
//!
//! # Example
//!
//! ```rust
//! use rackwire_core::{Link, ModuleGraph, OutputPort, Renderer};
//! use rackwire_modules::Unit;
//!
//! let mut graph = ModuleGraph::new();
//! let osc = graph.add_module(Unit::oscillator(48000.0, 220.0)).unwrap();
//! let vca = graph.add_module(Unit::gain(0.5)).unwrap();
//! let link = Link::new(
//!     graph.input::<f32>(vca, "in").unwrap(),
//!     graph.output::<f32>(osc, "out").unwrap(),
//! );
//! graph.connect(link).unwrap();
//!
//! let mut renderer = Renderer::new(graph, 256);
//! renderer.compile().unwrap();
//! renderer.process(256);
//! let out = renderer.read_output(OutputPort::<f32>::new(vca, 0)).unwrap();
//! assert!(out.iter().all(|v| v.abs() <= 0.5));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod envelope;
pub mod oscillator;
pub mod unit;
pub mod utility;
pub mod voice;

pub use envelope::{Envelope, EnvelopeStage};
pub use oscillator::{Oscillator, Waveform};
pub use unit::{ParamError, ParamSpec, Unit, UnitKind};
pub use utility::{Constant, Gain, Gate, Pitch, Probe, midi_to_freq};
pub use voice::{VoiceAllocationMode, VoiceChain, VoicePool};
