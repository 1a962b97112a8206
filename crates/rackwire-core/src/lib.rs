//! Rackwire Core - render dispatch for modular synthesis graphs
//!
//! This crate turns a graph of signal-processing modules into a flat program
//! of [`Action`]s and executes that program once per audio block with zero
//! allocations and no dynamic dispatch.
//!
//! # Core Abstractions
//!
//! ## Modules and Ports
//!
//! - [`Module`] - The render capability every concrete module implements
//! - [`PortSpec`] - Static description of a module's input or output slot
//! - [`InputPort`] / [`OutputPort`] - Typed port handles checked at link time
//! - [`Element`] - Buffer element types (`f32`, `f64`, `i32`)
//!
//! ## Wiring
//!
//! - [`Link`] - Output → Input wiring with optional scale and control signal
//! - [`ModuleGraph`] - Owns modules and links, compiles to an [`ActionSequence`]
//!
//! ## Execution
//!
//! - [`Action`] - Closed set of compiled operations (Clear, Alias, Copy, Add, Render)
//! - [`Engine`] - Executes an [`ActionSequence`] against buffer storage
//! - [`Renderer`] - Graph + engine + current program, with compile-then-swap
//!
//! ## Collaborators
//!
//! - [`VoiceAllocator`] - Contract for voice allocation policies
//! - [`count_bits`] / [`PortMask`] - Port bitmask bookkeeping
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc`). Disable the default
//! `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rackwire-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rackwire_core::{Link, ModuleGraph, Renderer};
//!
//! let mut graph = ModuleGraph::new();
//! let osc = graph.add_module(Unit::oscillator(48000.0, 220.0))?;
//! let vca = graph.add_module(Unit::gain(0.5))?;
//! graph.connect(Link::new(graph.input(vca, "in")?, graph.output(osc, "out")?))?;
//!
//! let mut renderer = Renderer::new(graph, 256);
//! renderer.compile()?;
//! renderer.process(256);
//! ```
//!
//! # Design Principles
//!
//! - **Compile once, run every block**: all type checks, wiring decisions and
//!   ordering happen in [`ModuleGraph::compile`]
//! - **Indices, not pointers**: actions name buffers and modules by index
//! - **Static dispatch**: the renderer is generic over one module type
//! - **Real-time safe**: no allocation inside [`Engine::run`]

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod bits;
pub mod buffer;
pub mod element;
pub mod graph;
pub mod module;
pub mod port;
pub mod voice;

// Re-export main types at crate root
pub use bits::{BitWord, PortMask, count_bits};
pub use buffer::{Buffer, BufferId, BufferStore};
pub use element::{ConvertFrom, Element, ElementType, FloatElement, Transfer};
pub use graph::{
    Action, ActionCounts, ActionSequence, BufferLayout, Engine, GraphError, InputSlot, Link,
    LinkId, ModuleGraph, PortName, Renderer, ScheduleViolation,
};
pub use module::{BlockIo, Inputs, Module, ModuleId, Outputs};
pub use port::{Direction, InputPort, MAX_PORTS, OutputPort, PortHandle, PortRef, PortSpec};
pub use voice::{VoiceAllocator, VoiceHandle, VoiceState};
