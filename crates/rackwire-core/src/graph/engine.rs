//! Action sequence execution.
//!
//! The [`Engine`] owns every port buffer of one compiled graph plus the input
//! binding table, and walks an [`ActionSequence`] once per block.
//!
//! **RT-safety**: [`Engine::run`] performs no heap allocation. Buffers, the
//! binding table, and the scratch slots that hold a module's outputs during
//! its render are all sized in [`Engine::prepare`].

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::action::{Action, ActionSequence, InputSlot};
use super::module_graph::ModuleGraph;
use crate::buffer::{Buffer, BufferId, BufferStore};
use crate::module::{BlockIo, Module};

/// What [`Engine::prepare`] sized storage for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Installed {
    generation: u64,
    buffers: usize,
    module_slots: usize,
}

/// Executes compiled action sequences against owned buffer storage.
#[derive(Debug)]
pub struct Engine {
    store: BufferStore,
    /// Buffer each input currently reads, indexed by [`InputSlot`].
    bindings: Vec<BufferId>,
    /// Holds a module's output buffers while it renders.
    scratch: Vec<Buffer>,
    block_size: usize,
    installed: Option<Installed>,
}

impl Engine {
    /// Creates an engine for blocks of at most `block_size` frames.
    pub fn new(block_size: usize) -> Self {
        Self {
            store: BufferStore::new(),
            bindings: Vec::new(),
            scratch: Vec::new(),
            block_size,
            installed: None,
        }
    }

    /// Returns the maximum block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Changes the maximum block size. The next [`run`](Self::run) needs a
    /// fresh [`prepare`](Self::prepare).
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
        self.installed = None;
    }

    /// Sizes storage for `seq` and resets every input to its home buffer.
    ///
    /// Allocates when the layout grows; call it between blocks, never from
    /// the audio path.
    pub fn prepare(&mut self, seq: &ActionSequence) {
        let layout = seq.layout();
        self.store.rebuild(layout.elements(), self.block_size);
        self.bindings.clear();
        self.bindings.extend_from_slice(layout.input_homes());
        self.scratch
            .resize_with(layout.max_outputs(), Buffer::default);
        self.installed = Some(Installed {
            generation: seq.generation(),
            buffers: layout.buffer_count(),
            module_slots: layout.module_slots(),
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "engine_prepare: {} buffers × {} frames, generation {}",
            layout.buffer_count(),
            self.block_size,
            seq.generation()
        );
    }

    /// Returns true if storage is sized for `seq`.
    pub fn is_prepared_for(&self, seq: &ActionSequence) -> bool {
        self.installed.is_some_and(|i| {
            i.generation == seq.generation()
                && i.buffers == seq.layout().buffer_count()
                && i.module_slots == seq.layout().module_slots()
        })
    }

    /// Runs every action of `seq` once, in order, for `frames` samples.
    ///
    /// # Panics
    ///
    /// Panics if the engine was not prepared for `seq`, if a module `seq`
    /// renders was removed from `graph` or changed its ports, or if `frames`
    /// exceeds the block size. Each of these means the program is stale.
    /// Links added or removed since `seq` was compiled do not affect it.
    pub fn run<M: Module>(&mut self, seq: &ActionSequence, graph: &mut ModuleGraph<M>, frames: usize) {
        let layout = seq.layout();
        assert!(
            self.is_prepared_for(seq),
            "stale action sequence: engine prepared for {:?}, sequence is generation {}",
            self.installed,
            seq.generation()
        );
        assert!(
            frames <= self.block_size,
            "block of {frames} frames exceeds block size {}",
            self.block_size
        );
        // Link edits since compile are fine: the program keeps its own
        // wiring. Removed modules or changed port layouts are not.
        assert!(
            layout.describes(graph),
            "stale action sequence: modules of generation {} no longer match the graph (generation {})",
            seq.generation(),
            graph.generation()
        );

        for action in seq.actions() {
            match *action {
                Action::Clear { input } => {
                    let home = layout.input_home(input);
                    self.bindings[input.index()] = home;
                    self.store.get_mut(home).clear();
                }

                Action::Alias { output, input } => {
                    self.bindings[input.index()] = output;
                }

                Action::Copy {
                    src,
                    dst,
                    ctl,
                    gain,
                    transfer,
                } => {
                    self.store
                        .transfer(transfer, src, dst, ctl, gain, false, frames);
                }

                Action::Add {
                    src,
                    dst,
                    ctl,
                    gain,
                    transfer,
                } => {
                    self.store
                        .transfer(transfer, src, dst, ctl, gain, true, frames);
                }

                Action::Render { module } => {
                    let Some(module_layout) = layout.module(module) else {
                        panic!("{module} has no layout in this sequence");
                    };
                    let Some(unit) = graph.module_at_mut(module.slot()) else {
                        panic!("{module} was removed after compile");
                    };

                    // Move the outputs out of the store so inputs stay
                    // readable while the module writes.
                    let outputs = module_layout.output_range();
                    let scratch = &mut self.scratch[..outputs.len()];
                    for (id, buf) in outputs.clone().zip(scratch.iter_mut()) {
                        self.store.swap(BufferId(id as u32), buf);
                    }

                    let bindings = &self.bindings[module_layout.input_range()];
                    let mut io = BlockIo::new(&self.store, bindings, scratch, frames);
                    unit.render(&mut io, frames);

                    for (id, buf) in outputs.zip(self.scratch.iter_mut()) {
                        self.store.swap(BufferId(id as u32), buf);
                    }
                }
            }
        }
    }

    /// Returns a buffer by id.
    pub fn buffer(&self, id: BufferId) -> &Buffer {
        self.store.get(id)
    }

    /// Returns the buffer an input currently reads.
    pub fn input_buffer(&self, input: InputSlot) -> &Buffer {
        self.store.get(self.bindings[input.index()])
    }

    /// Returns the buffer storage.
    pub fn store(&self) -> &BufferStore {
        &self.store
    }

    /// Zeroes every buffer.
    pub fn clear(&mut self) {
        self.store.clear_all();
    }
}
