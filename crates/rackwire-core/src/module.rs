//! The module capability and the per-block I/O view handed to it.
//!
//! The renderer is generic over a single module type `M: Module`. Callers
//! typically implement [`Module`] for a closed enum of concrete modules, so a
//! `Render` action resolves to a direct call plus one `match`; no trait
//! object sits in the audio path.

use core::fmt;

use crate::buffer::{Buffer, BufferId, BufferStore};
use crate::element::Element;
use crate::port::PortSpec;

/// Unique identifier for a module in a [`ModuleGraph`](crate::ModuleGraph).
///
/// Module IDs are assigned sequentially by the graph and never reused within
/// a graph instance. They double as the slot index used by compiled actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Returns the slot index.
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

/// A signal-processing unit with typed ports and a render step.
///
/// # Example
///
/// ```rust
/// use rackwire_core::{BlockIo, Module, PortSpec};
///
/// struct Doubler;
///
/// impl Module for Doubler {
///     fn name(&self) -> &'static str {
///         "doubler"
///     }
///
///     fn inputs(&self) -> &'static [PortSpec] {
///         const IN: &[PortSpec] = &[PortSpec::of::<f32>("in")];
///         IN
///     }
///
///     fn outputs(&self) -> &'static [PortSpec] {
///         const OUT: &[PortSpec] = &[PortSpec::of::<f32>("out")];
///         OUT
///     }
///
///     fn render(&mut self, io: &mut BlockIo<'_>, _frames: usize) {
///         let (inputs, mut outputs) = io.split();
///         let input = inputs.get::<f32>(0);
///         for (o, i) in outputs.get_mut::<f32>(0).iter_mut().zip(input) {
///             *o = 2.0 * i;
///         }
///     }
/// }
/// ```
pub trait Module {
    /// Short kind name, used in diagnostics and schedule dumps.
    fn name(&self) -> &'static str;

    /// Input port slots, in index order.
    fn inputs(&self) -> &'static [PortSpec];

    /// Output port slots, in index order.
    fn outputs(&self) -> &'static [PortSpec];

    /// Renders one block of `frames` samples.
    ///
    /// Inputs are final when this runs; outputs must be written for the
    /// first `frames` samples. Called exactly once per block.
    fn render(&mut self, io: &mut BlockIo<'_>, frames: usize);

    /// Clears internal state (phases, envelopes) without changing parameters.
    fn reset(&mut self) {}
}

/// Per-render view of one module's port buffers.
pub struct BlockIo<'a> {
    inputs: Inputs<'a>,
    outputs: &'a mut [Buffer],
    frames: usize,
}

impl<'a> BlockIo<'a> {
    pub(crate) fn new(
        store: &'a BufferStore,
        bindings: &'a [BufferId],
        outputs: &'a mut [Buffer],
        frames: usize,
    ) -> Self {
        Self {
            inputs: Inputs {
                store,
                bindings,
                frames,
            },
            outputs,
            frames,
        }
    }

    /// Number of frames in this block.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Reads input `index` as `T`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the port holds another element type.
    #[inline]
    pub fn input<T: Element>(&self, index: usize) -> &[T] {
        self.inputs.get(index)
    }

    /// Writes output `index` as `T`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the port holds another element type.
    #[inline]
    pub fn output<T: Element>(&mut self, index: usize) -> &mut [T] {
        self.outputs[index].expect_slice_mut(self.frames)
    }

    /// Splits into read-only inputs and writable outputs so both can be held
    /// at once.
    #[inline]
    pub fn split(&mut self) -> (Inputs<'a>, Outputs<'_>) {
        (
            self.inputs,
            Outputs {
                buffers: &mut *self.outputs,
                frames: self.frames,
            },
        )
    }
}

/// Read-only access to a module's inputs for one block.
///
/// Each input resolves through the engine's current binding, so an aliased
/// input reads its producer's output buffer directly.
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    store: &'a BufferStore,
    bindings: &'a [BufferId],
    frames: usize,
}

impl<'a> Inputs<'a> {
    /// Number of inputs.
    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if the module has no inputs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Reads input `index` as `T`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the port holds another element type.
    #[inline]
    pub fn get<T: Element>(&self, index: usize) -> &'a [T] {
        self.store
            .get(self.bindings[index])
            .expect_slice(self.frames)
    }
}

/// Writable access to a module's outputs for one block.
pub struct Outputs<'b> {
    buffers: &'b mut [Buffer],
    frames: usize,
}

impl Outputs<'_> {
    /// Number of outputs.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if the module has no outputs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Writes output `index` as `T`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the port holds another element type.
    #[inline]
    pub fn get_mut<T: Element>(&mut self, index: usize) -> &mut [T] {
        self.buffers[index].expect_slice_mut(self.frames)
    }
}
