//! Graph compilation and execution for the Rackwire render core.
//!
//! Edit the graph at mutation time (add/remove/connect), compile it to an
//! [`ActionSequence`], and run that sequence once per audio block with zero
//! allocations.
//!
//! # Architecture
//!
//! - [`ModuleGraph`]: owns modules and [`Link`]s and performs mutations.
//!   [`compile()`](ModuleGraph::compile) validates every link, orders modules
//!   topologically, and decides per input port how it gets its value.
//! - [`ActionSequence`]: immutable program. A flat `Vec<Action>` plus the
//!   [`BufferLayout`] its indices refer to. Shared via `Arc`.
//! - [`Engine`]: owns buffer storage and walks a sequence per block. One
//!   `match` per action; no trait objects.
//! - [`Renderer`]: bundles the three and swaps in new programs atomically
//!   from the audio path's point of view.
//!
//! # Input Wiring
//!
//! Each input port is filled in one of three ways:
//!
//! - **Clear**: no links; the input reads zeros.
//! - **Alias**: one unscaled link of matching type; the input reads the
//!   producer's output buffer with no copy.
//! - **Copy/Add**: everything else. The first link copies into the input's
//!   own buffer, later links accumulate.
//!
//! # no_std Support
//!
//! This module is `no_std` compatible with `alloc`. The `Arc` type comes from
//! `alloc::sync::Arc` in `no_std` mode.

mod action;
mod compiler;
mod engine;
mod error;
mod link;
mod module_graph;
mod renderer;
#[cfg(test)]
pub(crate) mod testing;

pub use action::{
    Action, ActionCounts, ActionSequence, BufferLayout, BufferOwner, InputSlot, ModuleLayout,
    ScheduleViolation,
};
pub use engine::Engine;
pub use error::{GraphError, PortName};
pub use link::{Link, LinkId};
pub use module_graph::ModuleGraph;
pub use renderer::Renderer;
