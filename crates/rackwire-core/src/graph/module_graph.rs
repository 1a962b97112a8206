//! Module graph: mutation API and port lookup.
//!
//! [`ModuleGraph`] owns the modules and the links between their ports. It is
//! edited freely between blocks and compiled into an immutable
//! [`ActionSequence`] by [`compile()`](ModuleGraph::compile). Every topology
//! change bumps the graph's generation, and each program records the
//! generation it was compiled from.

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, vec::Vec};
#[cfg(feature = "std")]
use std::collections::BTreeMap;

use super::action::ActionSequence;
use super::compiler;
use super::error::{GraphError, PortName};
use super::link::{Link, LinkId};
use crate::bits::PortMask;
use crate::element::Element;
use crate::module::{Module, ModuleId};
use crate::port::{Direction, InputPort, MAX_PORTS, OutputPort, PortHandle, PortRef, PortSpec};

/// A module plus its adjacency lists.
pub(crate) struct ModuleSlot<M> {
    pub module: M,
    /// Links whose destination is one of this module's inputs.
    pub incoming: Vec<LinkId>,
    /// Links reading one of this module's outputs (as source or control).
    pub outgoing: Vec<LinkId>,
}

/// Modules and the links between their ports.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add modules: [`add_module()`](Self::add_module)
/// 3. Look up typed ports: [`input()`](Self::input), [`output()`](Self::output)
/// 4. Wire them: [`connect()`](Self::connect)
/// 5. Compile: [`compile()`](Self::compile), or hand the graph to a
///    [`Renderer`](super::Renderer)
pub struct ModuleGraph<M> {
    modules: Vec<Option<ModuleSlot<M>>>,
    links: Vec<Option<Link>>,
    summing: BTreeMap<PortRef, bool>,
    generation: u64,
}

impl<M> Default for ModuleGraph<M> {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            links: Vec::new(),
            summing: BTreeMap::new(),
            generation: 0,
        }
    }
}

impl<M: Module> ModuleGraph<M> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Module mutations ---

    /// Adds a module. Returns its new ID.
    ///
    /// # Errors
    ///
    /// [`GraphError::TooManyPorts`] if the module declares more than
    /// [`MAX_PORTS`] inputs or outputs.
    pub fn add_module(&mut self, module: M) -> Result<ModuleId, GraphError> {
        check_port_counts(&module)?;
        let id = ModuleId(self.modules.len() as u32);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: {} module {id}", module.name());
        self.modules.push(Some(ModuleSlot {
            module,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }));
        self.generation += 1;
        Ok(id)
    }

    /// Removes a module and every link touching it. Returns the module.
    pub fn remove_module(&mut self, id: ModuleId) -> Result<M, GraphError> {
        let slot = self.slot(id)?;
        let link_ids: Vec<LinkId> = slot
            .incoming
            .iter()
            .chain(slot.outgoing.iter())
            .copied()
            .collect();
        for link_id in link_ids {
            self.disconnect_internal(link_id);
        }
        self.summing.retain(|port, _| port.module != id);

        let slot = self.modules[id.slot()]
            .take()
            .ok_or(GraphError::ModuleNotFound(id))?;
        self.generation += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_remove: module {id}");
        Ok(slot.module)
    }

    /// Swaps in a new module at `id`, keeping its links. Returns the old one.
    ///
    /// Links are re-checked against the new ports at the next compile.
    pub fn replace_module(&mut self, id: ModuleId, module: M) -> Result<M, GraphError> {
        check_port_counts(&module)?;
        let slot = self.slot_mut(id)?;
        let old = core::mem::replace(&mut slot.module, module);
        self.generation += 1;
        Ok(old)
    }

    /// Returns a reference to a module.
    pub fn module(&self, id: ModuleId) -> Option<&M> {
        self.slot(id).ok().map(|s| &s.module)
    }

    /// Returns a mutable reference to a module.
    ///
    /// Parameter edits through this reference do not invalidate the compiled
    /// program. Swapping in a module with different ports does; the engine
    /// checks port layouts before every block and panics on a mismatch. Use
    /// [`replace_module()`](Self::replace_module) and recompile instead.
    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut M> {
        self.slot_mut(id).ok().map(|s| &mut s.module)
    }

    /// Iterates over live module IDs in slot order.
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_some())
            .map(|(i, _)| ModuleId(i as u32))
    }

    /// Calls [`Module::reset`] on each listed module that exists.
    pub fn reset_modules(&mut self, ids: &[ModuleId]) {
        for &id in ids {
            if let Ok(slot) = self.slot_mut(id) {
                slot.module.reset();
            }
        }
    }

    /// Calls [`Module::reset`] on every module.
    pub fn reset_all(&mut self) {
        for slot in self.modules.iter_mut().flatten() {
            slot.module.reset();
        }
    }

    // --- Links ---

    /// Adds a link. Returns its new ID.
    ///
    /// The link is checked against the live ports immediately. Cycles and
    /// conflicting writers are only detected by [`compile()`](Self::compile),
    /// since they depend on the whole graph.
    ///
    /// # Errors
    ///
    /// [`GraphError::ModuleNotFound`], [`GraphError::PortNotFound`],
    /// [`GraphError::WrongDirection`] or [`GraphError::TypeMismatch`].
    pub fn connect(&mut self, link: Link) -> Result<LinkId, GraphError> {
        self.check_link(&link)?;

        let id = LinkId(self.links.len() as u32);
        self.links.push(Some(link));
        self.slot_mut(link.dest().module)?.incoming.push(id);
        for producer in link.producers() {
            let outgoing = &mut self.slot_mut(producer)?.outgoing;
            if !outgoing.contains(&id) {
                outgoing.push(id);
            }
        }
        self.generation += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {link}");
        Ok(id)
    }

    /// Removes a link. Returns it.
    pub fn disconnect(&mut self, id: LinkId) -> Result<Link, GraphError> {
        let link = self.disconnect_internal(id).ok_or(GraphError::LinkNotFound(id))?;
        self.generation += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: link {id}");
        Ok(link)
    }

    /// Returns a link.
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0 as usize)?.as_ref()
    }

    /// Iterates over live links in insertion order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> + '_ {
        self.links
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|l| (LinkId(i as u32), l)))
    }

    /// Links into one input port, in insertion order.
    pub fn links_into(&self, input: PortRef) -> impl Iterator<Item = (LinkId, &Link)> + '_ {
        self.links().filter(move |(_, l)| l.dest() == input)
    }

    /// Overrides whether an input sums its links.
    pub fn set_summing(&mut self, input: PortRef, summing: bool) -> Result<(), GraphError> {
        self.input_handle(input)?;
        self.summing.insert(input, summing);
        self.generation += 1;
        Ok(())
    }

    /// Returns whether an input sums its links: the override set by
    /// [`set_summing()`](Self::set_summing), else the port's declaration.
    pub fn is_summing(&self, input: PortRef) -> bool {
        if let Some(&summing) = self.summing.get(&input) {
            return summing;
        }
        self.input_spec(input).is_ok_and(|spec| spec.summing)
    }

    /// Bitmask of a module's inputs that have at least one link.
    pub fn connected_inputs(&self, id: ModuleId) -> Result<PortMask, GraphError> {
        let slot = self.slot(id)?;
        let mut mask = PortMask::EMPTY;
        for link_id in &slot.incoming {
            if let Some(link) = self.link(*link_id) {
                mask.insert(usize::from(link.dest().index));
            }
        }
        Ok(mask)
    }

    // --- Port lookup ---

    /// Looks up an input port by name, typed as `T`.
    ///
    /// # Errors
    ///
    /// [`GraphError::PortNotFound`] if there is no such input, or
    /// [`GraphError::TypeMismatch`] if it does not hold `T`.
    pub fn input<T: Element>(&self, id: ModuleId, name: &str) -> Result<InputPort<T>, GraphError> {
        let handle = self.find_port(id, Direction::Input, name)?;
        expect_type::<T>(handle)?;
        Ok(InputPort::new(id, handle.port.index))
    }

    /// Looks up an output port by name, typed as `T`.
    ///
    /// # Errors
    ///
    /// [`GraphError::PortNotFound`] if there is no such output, or
    /// [`GraphError::TypeMismatch`] if it does not hold `T`.
    pub fn output<T: Element>(
        &self,
        id: ModuleId,
        name: &str,
    ) -> Result<OutputPort<T>, GraphError> {
        let handle = self.find_port(id, Direction::Output, name)?;
        expect_type::<T>(handle)?;
        Ok(OutputPort::new(id, handle.port.index))
    }

    /// Looks up a port by name without fixing its element type.
    pub fn find_port(
        &self,
        id: ModuleId,
        direction: Direction,
        name: &str,
    ) -> Result<PortHandle, GraphError> {
        let module = &self.slot(id)?.module;
        let specs = match direction {
            Direction::Input => module.inputs(),
            Direction::Output => module.outputs(),
        };
        let (index, spec) = specs
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name == name)
            .ok_or_else(|| GraphError::PortNotFound {
                module: id,
                direction,
                name: PortName::Named(name.into()),
            })?;
        Ok(PortHandle {
            port: PortRef::new(id, index as u16),
            direction,
            element: spec.element,
        })
    }

    /// Resolves an input port by index against the live module.
    pub fn input_handle(&self, port: PortRef) -> Result<PortHandle, GraphError> {
        let spec = self.input_spec(port)?;
        Ok(PortHandle {
            port,
            direction: Direction::Input,
            element: spec.element,
        })
    }

    /// Resolves an output port by index against the live module.
    pub fn output_handle(&self, port: PortRef) -> Result<PortHandle, GraphError> {
        let spec = self.spec(port, Direction::Output)?;
        Ok(PortHandle {
            port,
            direction: Direction::Output,
            element: spec.element,
        })
    }

    // --- Queries ---

    /// Returns the number of live modules.
    pub fn module_count(&self) -> usize {
        self.modules.iter().filter(|m| m.is_some()).count()
    }

    /// Returns the number of live links.
    pub fn link_count(&self) -> usize {
        self.links.iter().filter(|l| l.is_some()).count()
    }

    /// Returns the topology generation. Bumped by every structural change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // --- Compilation ---

    /// Compiles the graph into an [`ActionSequence`].
    ///
    /// # Errors
    ///
    /// [`GraphError::EmptyGraph`], any link validation error,
    /// [`GraphError::AmbiguousWiring`] or [`GraphError::CycleDetected`].
    pub fn compile(&self) -> Result<ActionSequence, GraphError> {
        compiler::compile(self)
    }

    // --- Internal helpers ---

    /// Number of module slots, including removed ones.
    pub(crate) fn slot_count(&self) -> usize {
        self.modules.len()
    }

    /// Modules by slot, `None` for removed slots.
    pub(crate) fn slots(&self) -> &[Option<ModuleSlot<M>>] {
        &self.modules
    }

    /// Mutable module by raw slot, for the engine.
    #[inline]
    pub(crate) fn module_at_mut(&mut self, slot: usize) -> Option<&mut M> {
        self.modules.get_mut(slot)?.as_mut().map(|s| &mut s.module)
    }

    /// Resolves all endpoints of `link` and checks them.
    pub(crate) fn check_link(&self, link: &Link) -> Result<(), GraphError> {
        let dest = self.input_handle(link.dest())?;
        let src = self.output_handle(link.src())?;
        let ctl = link.ctl().map(|c| self.output_handle(c)).transpose()?;
        link.check(dest, src, ctl)
    }

    fn slot(&self, id: ModuleId) -> Result<&ModuleSlot<M>, GraphError> {
        self.modules
            .get(id.slot())
            .and_then(|m| m.as_ref())
            .ok_or(GraphError::ModuleNotFound(id))
    }

    fn slot_mut(&mut self, id: ModuleId) -> Result<&mut ModuleSlot<M>, GraphError> {
        self.modules
            .get_mut(id.slot())
            .and_then(|m| m.as_mut())
            .ok_or(GraphError::ModuleNotFound(id))
    }

    fn input_spec(&self, port: PortRef) -> Result<PortSpec, GraphError> {
        self.spec(port, Direction::Input)
    }

    fn spec(&self, port: PortRef, direction: Direction) -> Result<PortSpec, GraphError> {
        let module = &self.slot(port.module)?.module;
        let specs = match direction {
            Direction::Input => module.inputs(),
            Direction::Output => module.outputs(),
        };
        specs
            .get(usize::from(port.index))
            .copied()
            .ok_or(GraphError::PortNotFound {
                module: port.module,
                direction,
                name: PortName::Index(port.index),
            })
    }

    fn disconnect_internal(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.get_mut(id.0 as usize)?.take()?;
        if let Ok(slot) = self.slot_mut(link.dest().module) {
            slot.incoming.retain(|&l| l != id);
        }
        for producer in link.producers() {
            if let Ok(slot) = self.slot_mut(producer) {
                slot.outgoing.retain(|&l| l != id);
            }
        }
        Some(link)
    }
}

fn check_port_counts<M: Module>(module: &M) -> Result<(), GraphError> {
    let count = module.inputs().len().max(module.outputs().len());
    if count > MAX_PORTS {
        return Err(GraphError::TooManyPorts {
            kind: module.name(),
            count,
        });
    }
    Ok(())
}

fn expect_type<T: Element>(handle: PortHandle) -> Result<(), GraphError> {
    if handle.element == T::TYPE {
        Ok(())
    } else {
        Err(GraphError::TypeMismatch {
            port: handle.port,
            expected: T::TYPE,
            found: handle.element,
        })
    }
}
