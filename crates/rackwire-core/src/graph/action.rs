//! Compiled action types.
//!
//! An [`ActionSequence`] is the immutable program produced by
//! [`ModuleGraph::compile()`](super::ModuleGraph::compile). It holds a flat
//! list of [`Action`]s that the engine executes in order, plus the
//! [`BufferLayout`] those actions index into.
//!
//! The sequence is shared through `Arc`; the engine never sees a partially
//! built program.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};
use core::fmt;
use core::ops::Range;

use thiserror::Error;

use super::module_graph::ModuleGraph;
use crate::buffer::BufferId;
use crate::element::{ElementType, Transfer};
use crate::module::{Module, ModuleId};
use crate::port::PortRef;

/// Index of an input port in the engine's binding table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputSlot(pub(crate) u32);

impl InputSlot {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in[{}]", self.0)
    }
}

/// A single compiled operation.
///
/// Every variant holds indices and small scalars only, so the enum is `Copy`
/// and a sequence is one contiguous allocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Bind the input to its own buffer and zero it.
    Clear {
        /// Input to reset.
        input: InputSlot,
    },

    /// Bind the input directly to an output buffer.
    Alias {
        /// Output buffer to read.
        output: BufferId,
        /// Input to rebind.
        input: InputSlot,
    },

    /// `dst = convert(src) * gain * ctl`.
    Copy {
        /// Output buffer read.
        src: BufferId,
        /// Input home buffer written.
        dst: BufferId,
        /// Per-sample `f32` multiplier.
        ctl: Option<BufferId>,
        /// Constant multiplier.
        gain: f32,
        /// Element conversion kernel.
        transfer: Transfer,
    },

    /// `dst += convert(src) * gain * ctl`.
    Add {
        /// Output buffer read.
        src: BufferId,
        /// Input home buffer accumulated into.
        dst: BufferId,
        /// Per-sample `f32` multiplier.
        ctl: Option<BufferId>,
        /// Constant multiplier.
        gain: f32,
        /// Element conversion kernel.
        transfer: Transfer,
    },

    /// Call the module's render step.
    Render {
        /// Module to render.
        module: ModuleId,
    },
}

impl Action {
    /// Returns true for actions that belong to the prep phase.
    pub fn is_prep(&self) -> bool {
        matches!(self, Self::Clear { .. } | Self::Alias { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear { input } => write!(f, "Clear {input}"),
            Self::Alias { output, input } => write!(f, "Alias {output} → {input}"),
            Self::Copy {
                src,
                dst,
                ctl,
                gain,
                transfer,
            } => {
                write!(f, "Copy {src} → {dst} (gain={gain:.2}")?;
                write_transfer_tail(f, *ctl, *transfer)
            }
            Self::Add {
                src,
                dst,
                ctl,
                gain,
                transfer,
            } => {
                write!(f, "Add {src} → {dst} (gain={gain:.2}")?;
                write_transfer_tail(f, *ctl, *transfer)
            }
            Self::Render { module } => write!(f, "Render {module}"),
        }
    }
}

fn write_transfer_tail(
    f: &mut fmt::Formatter<'_>,
    ctl: Option<BufferId>,
    transfer: Transfer,
) -> fmt::Result {
    if let Some(ctl) = ctl {
        write!(f, ", ctl={ctl}")?;
    }
    if !transfer.is_identity() {
        write!(f, ", {}←{}", transfer.dest(), transfer.source())?;
    }
    f.write_str(")")
}

/// What a buffer in the layout belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferOwner {
    /// Written by this output port during its module's render.
    Output(PortRef),
    /// Home buffer of this input.
    Input(InputSlot),
}

/// Where one module's ports live in the layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleLayout {
    /// The module's input slots.
    pub inputs: Range<u32>,
    /// The module's output buffers.
    pub outputs: Range<u32>,
}

impl ModuleLayout {
    /// Input slot range as `usize` indices.
    #[inline]
    pub fn input_range(&self) -> Range<usize> {
        self.inputs.start as usize..self.inputs.end as usize
    }

    /// Output buffer range as `usize` indices.
    #[inline]
    pub fn output_range(&self) -> Range<usize> {
        self.outputs.start as usize..self.outputs.end as usize
    }
}

/// Buffer and input-slot assignment for one compiled graph.
///
/// Each output port owns one buffer. Each input port owns one [`InputSlot`]
/// and one home buffer that `Clear`, `Copy` and `Add` write into. A module's
/// outputs (and its inputs) occupy a contiguous range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferLayout {
    elements: Vec<ElementType>,
    owners: Vec<BufferOwner>,
    input_homes: Vec<BufferId>,
    input_ports: Vec<PortRef>,
    modules: Vec<Option<ModuleLayout>>,
    max_outputs: usize,
}

impl BufferLayout {
    /// Creates an empty layout with room for `module_slots` modules.
    pub(crate) fn with_slots(module_slots: usize) -> Self {
        Self {
            modules: vec![None; module_slots],
            ..Self::default()
        }
    }

    /// Appends one module's ports. Outputs get buffers first, then each input
    /// gets a slot and a home buffer.
    pub(crate) fn push_module(
        &mut self,
        module: ModuleId,
        inputs: impl Iterator<Item = ElementType>,
        outputs: impl Iterator<Item = ElementType>,
    ) {
        let first_output = self.elements.len() as u32;
        for (index, element) in outputs.enumerate() {
            self.elements.push(element);
            self.owners
                .push(BufferOwner::Output(PortRef::new(module, index as u16)));
        }
        let output_end = self.elements.len() as u32;

        let first_input = self.input_homes.len() as u32;
        for (index, element) in inputs.enumerate() {
            let slot = InputSlot(self.input_homes.len() as u32);
            let home = BufferId(self.elements.len() as u32);
            self.elements.push(element);
            self.owners.push(BufferOwner::Input(slot));
            self.input_homes.push(home);
            self.input_ports.push(PortRef::new(module, index as u16));
        }
        let input_end = self.input_homes.len() as u32;

        self.max_outputs = self.max_outputs.max((output_end - first_output) as usize);
        self.modules[module.slot()] = Some(ModuleLayout {
            inputs: first_input..input_end,
            outputs: first_output..output_end,
        });
    }

    /// Element type of every buffer, indexed by [`BufferId`].
    pub fn elements(&self) -> &[ElementType] {
        &self.elements
    }

    /// Number of buffers.
    pub fn buffer_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of input slots.
    pub fn input_count(&self) -> usize {
        self.input_homes.len()
    }

    /// Home buffer of every input, indexed by [`InputSlot`].
    pub fn input_homes(&self) -> &[BufferId] {
        &self.input_homes
    }

    /// Number of module slots, including removed ones.
    pub fn module_slots(&self) -> usize {
        self.modules.len()
    }

    /// Largest output count of any module.
    pub fn max_outputs(&self) -> usize {
        self.max_outputs
    }

    /// Returns the layout of `module`, if it was present at compile time.
    pub fn module(&self, module: ModuleId) -> Option<&ModuleLayout> {
        self.modules.get(module.slot())?.as_ref()
    }

    /// Modules present at compile time, in slot order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_some())
            .map(|(i, _)| ModuleId(i as u32))
    }

    /// Returns true if every module laid out here is still in `graph` and
    /// declares the same port element types. Modules added to the graph since
    /// are not part of this layout and are ignored.
    pub fn describes<M: Module>(&self, graph: &ModuleGraph<M>) -> bool {
        self.modules.iter().enumerate().all(|(slot, layout)| {
            let Some(layout) = layout else {
                return true;
            };
            let Some(Some(entry)) = graph.slots().get(slot) else {
                return false;
            };
            let outputs = entry.module.outputs();
            let inputs = entry.module.inputs();
            let output_types = &self.elements[layout.output_range()];
            let homes = &self.input_homes[layout.input_range()];
            outputs.len() == output_types.len()
                && inputs.len() == homes.len()
                && outputs
                    .iter()
                    .zip(output_types)
                    .all(|(spec, &element)| spec.element == element)
                && inputs
                    .iter()
                    .zip(homes)
                    .all(|(spec, home)| spec.element == self.elements[home.index()])
        })
    }

    /// Returns the owner of a buffer.
    pub fn owner(&self, buffer: BufferId) -> Option<BufferOwner> {
        self.owners.get(buffer.index()).copied()
    }

    /// Returns the home buffer of an input slot.
    #[inline]
    pub fn input_home(&self, input: InputSlot) -> BufferId {
        self.input_homes[input.index()]
    }

    /// Returns the port an input slot belongs to.
    pub fn input_port(&self, input: InputSlot) -> PortRef {
        self.input_ports[input.index()]
    }

    /// Looks up the slot of an input port.
    pub fn input_slot(&self, port: PortRef) -> Option<InputSlot> {
        let layout = self.module(port.module)?;
        let slot = layout.inputs.start + u32::from(port.index);
        (slot < layout.inputs.end).then_some(InputSlot(slot))
    }

    /// Looks up the buffer of an output port.
    pub fn output_buffer(&self, port: PortRef) -> Option<BufferId> {
        let layout = self.module(port.module)?;
        let id = layout.outputs.start + u32::from(port.index);
        (id < layout.outputs.end).then_some(BufferId(id))
    }

    /// Module that renders into `buffer`, if it is an output buffer.
    fn producer(&self, buffer: BufferId) -> Option<ModuleId> {
        match self.owner(buffer)? {
            BufferOwner::Output(port) => Some(port.module),
            BufferOwner::Input(_) => None,
        }
    }

    /// Input slot whose home is `buffer`, if any.
    fn home_of(&self, buffer: BufferId) -> Option<InputSlot> {
        match self.owner(buffer)? {
            BufferOwner::Input(slot) => Some(slot),
            BufferOwner::Output(_) => None,
        }
    }
}

/// Number of actions of each kind in a sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionCounts {
    /// `Clear` actions.
    pub clear: usize,
    /// `Alias` actions.
    pub alias: usize,
    /// `Copy` actions.
    pub copy: usize,
    /// `Add` actions.
    pub add: usize,
    /// `Render` actions.
    pub render: usize,
}

impl ActionCounts {
    /// Prep actions: one per input, except inputs filled by a `Copy`.
    pub fn prep(&self) -> usize {
        self.clear + self.alias
    }

    /// Buffer transfers.
    pub fn transfers(&self) -> usize {
        self.copy + self.add
    }

    /// All actions.
    pub fn total(&self) -> usize {
        self.prep() + self.transfers() + self.render
    }
}

/// A broken ordering or coverage rule in an [`ActionSequence`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleViolation {
    /// A prep action appears after the prep phase, or a process action inside it.
    #[error("action {position} is in the wrong phase")]
    MisplacedPhase {
        /// Index of the offending action.
        position: usize,
    },

    /// An action names a buffer or slot the layout does not have.
    #[error("action {position} references storage outside the layout")]
    OutOfLayout {
        /// Index of the offending action.
        position: usize,
    },

    /// An input is never cleared, aliased or copied into.
    #[error("input {input} is never prepared")]
    Unprepared {
        /// The input port.
        input: PortRef,
    },

    /// An input is prepared by more than one action.
    #[error("input {input} is prepared twice (action {position})")]
    PreparedTwice {
        /// The input port.
        input: PortRef,
        /// Index of the second preparing action.
        position: usize,
    },

    /// An `Add` runs before its input was cleared or copied into.
    #[error("add into {input} at action {position} precedes its copy")]
    AddBeforeCopy {
        /// The input port.
        input: PortRef,
        /// Index of the `Add`.
        position: usize,
    },

    /// A module renders more than once.
    #[error("{module} renders twice (action {position})")]
    RenderedTwice {
        /// The module.
        module: ModuleId,
        /// Index of the second `Render`.
        position: usize,
    },

    /// A module present in the layout never renders.
    #[error("{module} never renders")]
    NotRendered {
        /// The module.
        module: ModuleId,
    },

    /// A buffer is read before its producer rendered.
    #[error("action {position} reads {producer} before it renders")]
    ReadBeforeRender {
        /// The producing module.
        producer: ModuleId,
        /// Index of the reading action.
        position: usize,
    },

    /// An input is written after its module rendered.
    #[error("action {position} writes into {consumer} after it rendered")]
    WriteAfterRender {
        /// The consuming module.
        consumer: ModuleId,
        /// Index of the writing action.
        position: usize,
    },
}

/// Immutable compiled program for one graph.
///
/// Prep actions (`Clear`, `Alias`) come first; process actions (`Copy`,
/// `Add`, `Render`) follow in dependency order.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionSequence {
    pub(crate) actions: Vec<Action>,
    pub(crate) layout: BufferLayout,
    pub(crate) generation: u64,
    pub(crate) prep_len: usize,
}

impl ActionSequence {
    /// Returns every action in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Returns the prep phase.
    pub fn prep(&self) -> &[Action] {
        &self.actions[..self.prep_len]
    }

    /// Returns the process phase.
    pub fn process(&self) -> &[Action] {
        &self.actions[self.prep_len..]
    }

    /// Returns the number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the sequence has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the buffer layout the actions index into.
    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Returns the graph generation this sequence was compiled from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Counts actions by kind.
    pub fn counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for action in &self.actions {
            match action {
                Action::Clear { .. } => counts.clear += 1,
                Action::Alias { .. } => counts.alias += 1,
                Action::Copy { .. } => counts.copy += 1,
                Action::Add { .. } => counts.add += 1,
                Action::Render { .. } => counts.render += 1,
            }
        }
        counts
    }

    /// Position of `module`'s `Render` action.
    pub fn render_position(&self, module: ModuleId) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| matches!(a, Action::Render { module: m } if *m == module))
    }

    /// Checks the ordering and coverage rules the engine relies on.
    ///
    /// - every input is prepared by exactly one `Clear`, `Alias` or `Copy`
    /// - every `Add` follows its input's `Clear` or `Copy`
    /// - every module renders exactly once
    /// - every transfer and alias reads a module that has already rendered
    ///   (aliases are checked at the consumer's render), and writes before
    ///   the consumer renders
    ///
    /// # Errors
    ///
    /// Returns the first [`ScheduleViolation`] found.
    pub fn verify(&self) -> Result<(), ScheduleViolation> {
        let layout = &self.layout;
        let mut prepared: Vec<bool> = vec![false; layout.input_count()];
        let mut rendered: Vec<Option<usize>> = vec![None; layout.module_slots()];
        // Producer of each aliased input, checked when the consumer renders.
        let mut alias_source: Vec<Option<ModuleId>> = vec![None; layout.input_count()];

        for (position, action) in self.actions.iter().enumerate() {
            if action.is_prep() != (position < self.prep_len) {
                return Err(ScheduleViolation::MisplacedPhase { position });
            }
            let out_of_layout = || ScheduleViolation::OutOfLayout { position };

            match *action {
                Action::Clear { input } => {
                    if input.index() >= prepared.len() {
                        return Err(out_of_layout());
                    }
                    prepare(&mut prepared, layout, input, position)?;
                }
                Action::Alias { output, input } => {
                    let producer = layout.producer(output).ok_or_else(out_of_layout)?;
                    if input.index() >= prepared.len() {
                        return Err(out_of_layout());
                    }
                    prepare(&mut prepared, layout, input, position)?;
                    alias_source[input.index()] = Some(producer);
                }
                Action::Copy { src, dst, ctl, .. } | Action::Add { src, dst, ctl, .. } => {
                    let input = layout.home_of(dst).ok_or_else(out_of_layout)?;
                    for read in core::iter::once(src).chain(ctl) {
                        let producer = layout.producer(read).ok_or_else(out_of_layout)?;
                        if rendered[producer.slot()].is_none() {
                            return Err(ScheduleViolation::ReadBeforeRender { producer, position });
                        }
                    }
                    let consumer = layout.input_port(input).module;
                    if rendered[consumer.slot()].is_some() {
                        return Err(ScheduleViolation::WriteAfterRender { consumer, position });
                    }
                    if matches!(action, Action::Copy { .. }) {
                        prepare(&mut prepared, layout, input, position)?;
                    } else if !prepared[input.index()] {
                        return Err(ScheduleViolation::AddBeforeCopy {
                            input: layout.input_port(input),
                            position,
                        });
                    }
                }
                Action::Render { module } => {
                    let module_layout = layout.module(module).ok_or_else(out_of_layout)?;
                    if rendered[module.slot()].is_some() {
                        return Err(ScheduleViolation::RenderedTwice { module, position });
                    }
                    for slot in module_layout.input_range() {
                        if let Some(producer) = alias_source[slot]
                            && rendered[producer.slot()].is_none()
                        {
                            return Err(ScheduleViolation::ReadBeforeRender { producer, position });
                        }
                    }
                    rendered[module.slot()] = Some(position);
                }
            }
        }

        if let Some(slot) = prepared.iter().position(|p| !p) {
            return Err(ScheduleViolation::Unprepared {
                input: layout.input_port(InputSlot(slot as u32)),
            });
        }
        if let Some(module) = layout.modules().find(|m| rendered[m.slot()].is_none()) {
            return Err(ScheduleViolation::NotRendered { module });
        }
        Ok(())
    }
}

fn prepare(
    prepared: &mut [bool],
    layout: &BufferLayout,
    input: InputSlot,
    position: usize,
) -> Result<(), ScheduleViolation> {
    let seen = &mut prepared[input.index()];
    if *seen {
        return Err(ScheduleViolation::PreparedTwice {
            input: layout.input_port(input),
            position,
        });
    }
    *seen = true;
    Ok(())
}

impl fmt::Display for ActionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i == self.prep_len {
                writeln!(f, "--")?;
            }
            writeln!(f, "{i:4}  {action}")?;
        }
        Ok(())
    }
}
