//! Graph → [`ActionSequence`] compilation.
//!
//! Compilation runs in five passes:
//!
//! 1. **Layout**: one buffer per output port, one slot plus home buffer per
//!    input port, in module slot order.
//! 2. **Validation**: every link is re-checked against the live ports.
//! 3. **Ordering**: Kahn's algorithm over module dependencies, lowest slot
//!    first among ready modules so the output is deterministic.
//! 4. **Wiring**: each input is classified by its incoming links into
//!    `Clear`, `Alias`, or a `Copy`/`Add` run.
//! 5. **Emission**: all prep actions, then per module in topological order
//!    its transfers followed by its `Render`.

#[cfg(not(feature = "std"))]
use alloc::{
    collections::{BTreeMap, BinaryHeap},
    vec,
    vec::Vec,
};
use core::cmp::Reverse;
#[cfg(feature = "std")]
use std::collections::{BTreeMap, BinaryHeap};

use super::action::{Action, ActionSequence, BufferLayout, InputSlot};
use super::error::{GraphError, PortName};
use super::link::Link;
use super::module_graph::ModuleGraph;
use crate::buffer::BufferId;
use crate::module::{Module, ModuleId};
use crate::port::{Direction, PortRef};

/// Compiles `graph` into a verified action sequence.
pub(crate) fn compile<M: Module>(graph: &ModuleGraph<M>) -> Result<ActionSequence, GraphError> {
    if graph.module_count() == 0 {
        return Err(GraphError::EmptyGraph);
    }

    let layout = lay_out(graph);
    #[cfg(feature = "tracing")]
    tracing::debug!(
        "graph_layout: {} buffers, {} input slots",
        layout.buffer_count(),
        layout.input_count()
    );

    let mut wiring: BTreeMap<PortRef, Vec<&Link>> = BTreeMap::new();
    for (_, link) in graph.links() {
        graph.check_link(link)?;
        wiring.entry(link.dest()).or_default().push(link);
    }

    let order = kahn_sort(graph)?;
    #[cfg(feature = "tracing")]
    tracing::debug!("graph_sort: {} modules in topo order", order.len());

    let mut prep = Vec::with_capacity(layout.input_count());
    let mut transfers: Vec<Vec<Action>> = vec![Vec::new(); layout.module_slots()];
    for slot in 0..layout.input_count() {
        let input = InputSlot(slot as u32);
        let port = layout.input_port(input);
        let links = wiring.get(&port).map(Vec::as_slice).unwrap_or_default();
        wire_input(
            graph,
            &layout,
            input,
            links,
            &mut prep,
            &mut transfers[port.module.slot()],
        )?;
    }

    let prep_len = prep.len();
    let mut actions = prep;
    for &module in &order {
        actions.append(&mut transfers[module]);
        actions.push(Action::Render {
            module: ModuleId(module as u32),
        });
    }

    #[cfg(feature = "tracing")]
    for (i, action) in actions.iter().enumerate() {
        tracing::debug!("  action[{i}]: {action}");
    }

    let sequence = ActionSequence {
        actions,
        layout,
        generation: graph.generation(),
        prep_len,
    };
    debug_assert!(
        sequence.verify().is_ok(),
        "compiled an invalid schedule: {:?}",
        sequence.verify()
    );
    Ok(sequence)
}

/// Assigns buffers and input slots, module by module in slot order.
fn lay_out<M: Module>(graph: &ModuleGraph<M>) -> BufferLayout {
    let mut layout = BufferLayout::with_slots(graph.slot_count());
    for (slot, entry) in graph.slots().iter().enumerate() {
        if let Some(entry) = entry {
            layout.push_module(
                ModuleId(slot as u32),
                entry.module.inputs().iter().map(|spec| spec.element),
                entry.module.outputs().iter().map(|spec| spec.element),
            );
        }
    }
    layout
}

/// Emits the actions that fill one input from its links.
///
/// | links | input sums | actions |
/// |---|---|---|
/// | none | — | `Clear` |
/// | one plain, identity transfer | no | `Alias` |
/// | one plain | yes | `Clear` + `Add` |
/// | anything else | — | `Copy`, then `Add` per further link |
///
/// A plain link is unscaled and uncontrolled. Two or more plain links into
/// an input that does not sum are [`GraphError::AmbiguousWiring`].
fn wire_input<M: Module>(
    graph: &ModuleGraph<M>,
    layout: &BufferLayout,
    input: InputSlot,
    links: &[&Link],
    prep: &mut Vec<Action>,
    process: &mut Vec<Action>,
) -> Result<(), GraphError> {
    let port = layout.input_port(input);
    let home = layout.input_home(input);
    let sums = graph.is_summing(port) || links.iter().any(|l| l.is_summing());

    match links {
        [] => prep.push(Action::Clear { input }),
        [link] if link.is_plain() && !sums && link.transfer().is_identity() => {
            let (output, _) = link_buffers(layout, link)?;
            prep.push(Action::Alias { output, input });
        }
        [link] if link.is_plain() && sums => {
            let (src, ctl) = link_buffers(layout, link)?;
            prep.push(Action::Clear { input });
            process.push(link.make_add_action(src, home, ctl));
        }
        [first, rest @ ..] => {
            let plain = links.iter().filter(|l| l.is_plain()).count();
            if !sums && plain >= 2 {
                return Err(GraphError::AmbiguousWiring {
                    input: port,
                    links: links.len(),
                });
            }
            let (src, ctl) = link_buffers(layout, first)?;
            process.push(first.make_copy_action(src, home, ctl));
            for link in rest {
                let (src, ctl) = link_buffers(layout, link)?;
                process.push(link.make_add_action(src, home, ctl));
            }
        }
    }
    Ok(())
}

/// Resolves the source and control buffers of a link.
fn link_buffers(
    layout: &BufferLayout,
    link: &Link,
) -> Result<(BufferId, Option<BufferId>), GraphError> {
    let output = |port: PortRef| {
        layout
            .output_buffer(port)
            .ok_or(GraphError::PortNotFound {
                module: port.module,
                direction: Direction::Output,
                name: PortName::Index(port.index),
            })
    };
    let src = output(link.src())?;
    let ctl = link.ctl().map(output).transpose()?;
    Ok((src, ctl))
}

/// Kahn's algorithm over module slots.
///
/// Ready modules are taken lowest slot first. Returns the slots in
/// execution order, or `CycleDetected` naming a module on a cycle.
fn kahn_sort<M: Module>(graph: &ModuleGraph<M>) -> Result<Vec<usize>, GraphError> {
    let n = graph.slot_count();
    let mut in_degree = vec![0u32; n];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (_, link) in graph.links() {
        let to = link.dest().module;
        for from in link.producers() {
            if from == to {
                return Err(GraphError::CycleDetected { module: to });
            }
            successors[from.slot()].push(to.slot());
            predecessors[to.slot()].push(from.slot());
            in_degree[to.slot()] += 1;
        }
    }

    let live: Vec<bool> = graph.slots().iter().map(Option::is_some).collect();
    let active_count = live.iter().filter(|&&l| l).count();

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| live[i] && in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut sorted = Vec::with_capacity(active_count);
    let mut done = vec![false; n];

    while let Some(Reverse(idx)) = ready.pop() {
        sorted.push(idx);
        done[idx] = true;
        for &to in &successors[idx] {
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                ready.push(Reverse(to));
            }
        }
    }

    if sorted.len() != active_count {
        return Err(GraphError::CycleDetected {
            module: ModuleId(find_cycle_member(&live, &done, &predecessors) as u32),
        });
    }
    Ok(sorted)
}

/// Every module left after Kahn's algorithm has an unfinished predecessor.
/// Walking those back from the lowest leftover slot must revisit a module,
/// and the first revisited one lies on a cycle.
fn find_cycle_member(live: &[bool], done: &[bool], predecessors: &[Vec<usize>]) -> usize {
    let mut visited = vec![false; live.len()];
    let mut current = (0..live.len())
        .find(|&i| live[i] && !done[i])
        .unwrap_or_default();
    while !visited[current] {
        visited[current] = true;
        match predecessors[current].iter().copied().find(|&p| !done[p]) {
            Some(prev) => current = prev,
            None => break,
        }
    }
    current
}
