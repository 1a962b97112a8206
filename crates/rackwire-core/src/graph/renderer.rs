//! Graph, engine and current program in one owner.
//!
//! [`Renderer`] follows a compile-then-swap protocol: [`compile()`](Renderer::compile)
//! builds the new [`ActionSequence`] off to the side, sizes the engine for
//! it, and only then replaces the current program. A failed compile leaves
//! the previous program installed, and it keeps rendering with the wiring it
//! was compiled from as long as none of its modules was removed or changed
//! ports.

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Arc;

use super::action::ActionSequence;
use super::engine::Engine;
use super::error::GraphError;
use super::module_graph::ModuleGraph;
use crate::element::Element;
use crate::module::{Module, ModuleId};
use crate::port::{InputPort, OutputPort, PortRef};
use crate::voice::{VoiceAllocator, VoiceHandle};

/// Owns a [`ModuleGraph`], an [`Engine`], and the program currently running.
///
/// # Example
///
/// ```rust,ignore
/// let mut renderer = Renderer::new(graph, 256);
/// renderer.compile()?;
/// renderer.process(256);
/// let out = renderer.read_output(vca_out).unwrap();
/// ```
pub struct Renderer<M> {
    graph: ModuleGraph<M>,
    engine: Engine,
    sequence: Option<Arc<ActionSequence>>,
}

impl<M: Module> Renderer<M> {
    /// Wraps `graph` with an engine for blocks of at most `block_size` frames.
    /// Nothing is compiled yet.
    pub fn new(graph: ModuleGraph<M>, block_size: usize) -> Self {
        Self {
            graph,
            engine: Engine::new(block_size),
            sequence: None,
        }
    }

    /// Compiles the graph and installs the result.
    ///
    /// # Errors
    ///
    /// Any [`GraphError`] from [`ModuleGraph::compile`]; the previous program
    /// stays installed and [`process()`](Self::process) keeps running it.
    pub fn compile(&mut self) -> Result<Arc<ActionSequence>, GraphError> {
        let sequence = Arc::new(self.graph.compile()?);
        self.engine.prepare(&sequence);
        #[cfg(feature = "tracing")]
        if self.sequence.is_some() {
            tracing::debug!("graph_swap: generation {}", sequence.generation());
        }
        self.sequence = Some(Arc::clone(&sequence));
        Ok(sequence)
    }

    /// Renders one block of `frames` samples.
    ///
    /// # Panics
    ///
    /// Panics if nothing was compiled, or if a module of the installed program
    /// was removed or changed its ports since the last
    /// [`compile()`](Self::compile).
    pub fn process(&mut self, frames: usize) {
        let Self {
            graph,
            engine,
            sequence,
        } = self;
        let sequence = sequence
            .as_deref()
            .expect("process called before compile()");
        engine.run(sequence, graph, frames);
    }

    /// Reads the last block written to an output port.
    pub fn read_output<T: Element>(&self, port: OutputPort<T>) -> Option<&[T]> {
        let id = self.sequence.as_ref()?.layout().output_buffer(port.port())?;
        self.engine.buffer(id).as_slice()
    }

    /// Reads what an input port saw during the last block.
    pub fn read_input<T: Element>(&self, port: InputPort<T>) -> Option<&[T]> {
        let slot = self.sequence.as_ref()?.layout().input_slot(port.port())?;
        self.engine.input_buffer(slot).as_slice()
    }

    /// Reads an `f32` output by untyped reference, for taps named at run time.
    pub fn read_output_handle(&self, port: PortRef) -> Option<&[f32]> {
        let id = self.sequence.as_ref()?.layout().output_buffer(port)?;
        self.engine.buffer(id).as_slice()
    }

    /// Returns the graph.
    pub fn graph(&self) -> &ModuleGraph<M> {
        &self.graph
    }

    /// Returns the graph for editing. Topology changes need a
    /// [`compile()`](Self::compile) before the next block.
    pub fn graph_mut(&mut self) -> &mut ModuleGraph<M> {
        &mut self.graph
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns true if the installed program was compiled from the graph as
    /// it is now.
    pub fn is_current(&self) -> bool {
        self.sequence
            .as_ref()
            .is_some_and(|seq| seq.generation() == self.graph.generation())
    }

    /// Returns the installed program, if any.
    pub fn sequence(&self) -> Option<&Arc<ActionSequence>> {
        self.sequence.as_ref()
    }

    /// Returns the maximum block size.
    pub fn block_size(&self) -> usize {
        self.engine.block_size()
    }

    /// Changes the maximum block size and resizes storage for the installed
    /// program.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.engine.set_block_size(block_size);
        if let Some(sequence) = &self.sequence {
            self.engine.prepare(sequence);
        }
    }

    /// Resets every module and zeroes every buffer.
    pub fn reset(&mut self) {
        self.graph.reset_all();
        self.engine.clear();
    }

    /// Resets the listed modules.
    pub fn reset_modules(&mut self, ids: &[ModuleId]) {
        self.graph.reset_modules(ids);
    }

    /// Resets the modules an allocator assigned to `voice`.
    pub fn reset_voice<A: VoiceAllocator>(&mut self, allocator: &A, voice: VoiceHandle) {
        self.graph.reset_modules(allocator.voice_modules(voice));
    }

    /// Consumes the renderer, returning its graph.
    pub fn into_graph(self) -> ModuleGraph<M> {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Link;
    use crate::graph::testing::{Probe, Source, TestModule};
    use crate::voice::VoiceState;

    fn chain(value: f32) -> (Renderer<TestModule>, ModuleId, ModuleId) {
        let mut graph = ModuleGraph::new();
        let s = graph.add_module(TestModule::Source(Source::new(value))).unwrap();
        let p = graph.add_module(TestModule::Probe(Probe::default())).unwrap();
        graph
            .connect(Link::new(
                graph.input::<f32>(p, "in").unwrap(),
                graph.output::<f32>(s, "out").unwrap(),
            ))
            .unwrap();
        (Renderer::new(graph, 16), s, p)
    }

    #[test]
    fn test_process_and_read() {
        let (mut renderer, s, p) = chain(7.0);
        renderer.compile().unwrap();
        renderer.process(16);

        let out = OutputPort::<f32>::new(p, 0);
        assert!(renderer.read_output(out).unwrap().iter().all(|&v| v == 7.0));
        let inp = InputPort::<f32>::new(p, 0);
        assert!(renderer.read_input(inp).unwrap().iter().all(|&v| v == 7.0));
        assert_eq!(
            renderer.read_output_handle(PortRef::new(s, 0)).map(<[f32]>::len),
            Some(16)
        );
        assert!(renderer.read_output(OutputPort::<f64>::new(p, 0)).is_none());
    }

    #[test]
    #[should_panic(expected = "before compile")]
    fn test_process_before_compile_panics() {
        let (mut renderer, _, _) = chain(1.0);
        renderer.process(16);
    }

    #[test]
    fn test_failed_compile_keeps_previous_program() {
        let (mut renderer, s, p) = chain(1.0);
        let first = renderer.compile().unwrap();
        let graph = renderer.graph_mut();
        graph
            .connect(Link::new(
                graph.input::<f32>(p, "in").unwrap(),
                graph.output::<f32>(s, "out").unwrap(),
            ))
            .unwrap();
        assert!(matches!(
            renderer.compile(),
            Err(GraphError::AmbiguousWiring { .. })
        ));
        assert!(Arc::ptr_eq(renderer.sequence().unwrap(), &first));
        assert!(!renderer.is_current());

        // The old single-link program still renders.
        renderer.process(16);
        let inp = InputPort::<f32>::new(p, 0);
        assert!(renderer.read_input(inp).unwrap().iter().all(|&v| v == 1.0));
        match renderer.graph().module(p) {
            Some(TestModule::Probe(probe)) => assert_eq!(probe.renders, 1),
            _ => panic!("probe missing"),
        }
    }

    #[test]
    #[should_panic(expected = "stale action sequence")]
    fn test_removed_module_stops_previous_program() {
        let (mut renderer, _, p) = chain(1.0);
        renderer.compile().unwrap();
        renderer.graph_mut().remove_module(p).unwrap();
        renderer.process(16);
    }

    #[test]
    fn test_swap_to_new_program() {
        let (mut renderer, s, p) = chain(2.0);
        renderer.compile().unwrap();
        renderer.process(16);

        let graph = renderer.graph_mut();
        let link = graph.links().next().map(|(id, _)| id).unwrap();
        graph.disconnect(link).unwrap();
        graph
            .connect(Link::scaled(
                graph.input::<f32>(p, "in").unwrap(),
                graph.output::<f32>(s, "out").unwrap(),
                0.5,
            ))
            .unwrap();
        renderer.compile().unwrap();
        renderer.process(16);

        let inp = InputPort::<f32>::new(p, 0);
        assert!(renderer.read_input(inp).unwrap().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_set_block_size_resizes() {
        let (mut renderer, _, p) = chain(1.0);
        renderer.compile().unwrap();
        renderer.set_block_size(32);
        renderer.process(32);
        let out = OutputPort::<f32>::new(p, 0);
        assert_eq!(renderer.read_output(out).unwrap().len(), 32);
    }

    struct OneVoice {
        modules: [ModuleId; 1],
    }

    impl VoiceAllocator for OneVoice {
        fn allocate_voice(&mut self) -> Option<VoiceHandle> {
            Some(VoiceHandle::new(0))
        }

        fn release_voice(&mut self, _voice: VoiceHandle) {}

        fn voice_state(&self, _voice: VoiceHandle) -> VoiceState {
            VoiceState::Idle
        }

        fn voice_modules(&self, _voice: VoiceHandle) -> &[ModuleId] {
            &self.modules
        }
    }

    #[test]
    fn test_reset_voice_resets_its_modules() {
        let (mut renderer, _, p) = chain(1.0);
        let mut voices = OneVoice { modules: [p] };
        let voice = voices.allocate_voice().unwrap();
        renderer.reset_voice(&voices, voice);
        match renderer.graph().module(p) {
            Some(TestModule::Probe(probe)) => assert_eq!(probe.resets, 1),
            _ => panic!("probe missing"),
        }
    }
}
