//! Property-based tests for graph compilation and execution.
//!
//! Builds random acyclic graphs of constant sources, pass-through modules
//! and summing mixers, then checks the structural invariants of the compiled
//! program and compares the rendered values against a direct evaluation.

use proptest::prelude::*;
use rackwire_core::{
    Action, BlockIo, Link, Module, ModuleGraph, ModuleId, OutputPort, PortSpec, Renderer,
};

const BLOCK: usize = 16;

enum Node {
    Source(f32),
    Pass,
    Mix,
}

const OUT: &[PortSpec] = &[PortSpec::of::<f32>("out")];
const IN: &[PortSpec] = &[PortSpec::of::<f32>("in")];
const SUM_IN: &[PortSpec] = &[PortSpec::of::<f32>("in").summing()];

impl Module for Node {
    fn name(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Pass => "pass",
            Self::Mix => "mix",
        }
    }

    fn inputs(&self) -> &'static [PortSpec] {
        match self {
            Self::Source(_) => &[],
            Self::Pass => IN,
            Self::Mix => SUM_IN,
        }
    }

    fn outputs(&self) -> &'static [PortSpec] {
        OUT
    }

    fn render(&mut self, io: &mut BlockIo<'_>, _frames: usize) {
        match self {
            Self::Source(value) => io.output::<f32>(0).fill(*value),
            Self::Pass | Self::Mix => {
                let (inputs, mut outputs) = io.split();
                outputs.get_mut::<f32>(0).copy_from_slice(inputs.get::<f32>(0));
            }
        }
    }
}

/// A random acyclic patch: node kinds plus forward edges `(from, to, scale)`.
#[derive(Debug, Clone)]
struct Patch {
    kinds: Vec<u8>,
    values: Vec<f32>,
    edges: Vec<(usize, usize, bool, f32)>,
}

fn patch_strategy() -> impl Strategy<Value = Patch> {
    (2usize..10).prop_flat_map(|n| {
        let kinds = prop::collection::vec(0u8..3, n);
        let values = prop::collection::vec(-4.0f32..4.0, n);
        let edges = prop::collection::vec(
            (0..n, 0..n, any::<bool>(), 0.25f32..2.0),
            0..(n * 2),
        );
        (kinds, values, edges).prop_map(|(kinds, values, edges)| Patch {
            kinds,
            values,
            edges,
        })
    })
}

/// Graph plus the links actually made and the reference value of each node.
struct Built {
    graph: ModuleGraph<Node>,
    ids: Vec<ModuleId>,
    links: Vec<(usize, usize)>,
    expected: Vec<f32>,
}

fn build(patch: &Patch) -> Built {
    let n = patch.kinds.len();
    let mut graph = ModuleGraph::new();
    let mut ids = Vec::with_capacity(n);
    for (i, &kind) in patch.kinds.iter().enumerate() {
        // Node 0 is always a source so every patch has at least one.
        let node = match (i, kind) {
            (0, _) | (_, 0) => Node::Source(patch.values[i]),
            (_, 1) => Node::Pass,
            _ => Node::Mix,
        };
        ids.push(graph.add_module(node).unwrap());
    }

    let mut links = Vec::new();
    let mut plain_into = vec![false; n];
    for &(a, b, plain, scale) in &patch.edges {
        let (from, to) = (a.min(b), a.max(b));
        if from == to || matches!(graph.module(ids[to]), Some(Node::Source(_))) {
            continue;
        }
        let summing = matches!(graph.module(ids[to]), Some(Node::Mix));
        let dest = graph.input::<f32>(ids[to], "in").unwrap();
        let src: OutputPort<f32> = graph.output(ids[from], "out").unwrap();
        let link = if plain && (summing || !plain_into[to]) {
            plain_into[to] = true;
            Link::new(dest, src)
        } else {
            Link::scaled(dest, src, scale)
        };
        graph.connect(link).unwrap();
        links.push((from, to));
    }

    // Edges always point to a higher index, so one ascending pass evaluates.
    let mut expected = vec![0.0f32; n];
    for i in 0..n {
        let value = match graph.module(ids[i]) {
            Some(Node::Source(v)) => *v,
            _ => graph
                .links()
                .filter(|(_, l)| l.dest().module == ids[i])
                .map(|(_, l)| {
                    let from = ids.iter().position(|&id| id == l.src().module).unwrap();
                    expected[from] * l.scale()
                })
                .sum(),
        };
        expected[i] = value;
    }

    Built {
        graph,
        ids,
        links,
        expected,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Action count = prep (one per input not fed by a `Copy`) + transfers
    /// + renders, and the compiled schedule passes verification.
    #[test]
    fn action_count_equation(patch in patch_strategy()) {
        let built = build(&patch);
        let seq = built.graph.compile().unwrap();
        let counts = seq.counts();

        let inputs: usize = built
            .ids
            .iter()
            .map(|&id| built.graph.module(id).unwrap().inputs().len())
            .sum();
        // An input is filled by `Copy` when it has several links or a single
        // scaled one; such inputs get no prep action.
        let copy_fed = built
            .ids
            .iter()
            .filter(|&&id| {
                let plain: Vec<bool> = built
                    .graph
                    .links()
                    .filter(|(_, l)| l.dest().module == id)
                    .map(|(_, l)| l.is_plain())
                    .collect();
                match plain.as_slice() {
                    [] => false,
                    [single] => !single,
                    _ => true,
                }
            })
            .count();
        prop_assert_eq!(counts.copy, copy_fed);
        prop_assert_eq!(counts.prep(), inputs - copy_fed);
        prop_assert_eq!(counts.render, built.ids.len());
        prop_assert_eq!(counts.transfers(), built.links.len() - counts.alias);
        prop_assert_eq!(seq.len(), counts.total());
        prop_assert!(seq.verify().is_ok(), "{:?}", seq.verify());
    }

    /// Every producer renders before every consumer it feeds.
    #[test]
    fn producers_render_first(patch in patch_strategy()) {
        let built = build(&patch);
        let seq = built.graph.compile().unwrap();
        for &(from, to) in &built.links {
            let producer = seq.render_position(built.ids[from]).unwrap();
            let consumer = seq.render_position(built.ids[to]).unwrap();
            prop_assert!(producer < consumer);
        }
    }

    /// An input fed by one unscaled link and no summation is aliased; every
    /// other fed input gets exactly one Copy (or Clear + Add when it sums).
    #[test]
    fn wiring_classification(patch in patch_strategy()) {
        let built = build(&patch);
        let seq = built.graph.compile().unwrap();
        for &id in &built.ids {
            let Some(slot) = seq.layout().input_slot(rackwire_core::PortRef::new(id, 0)) else {
                continue;
            };
            let links: Vec<_> = built
                .graph
                .links()
                .filter(|(_, l)| l.dest().module == id)
                .map(|(_, l)| *l)
                .collect();
            let aliased = seq
                .prep()
                .iter()
                .any(|a| matches!(a, Action::Alias { input, .. } if *input == slot));
            let alias_expected = links.len() == 1
                && links[0].is_plain()
                && !built.graph.is_summing(links[0].dest());
            prop_assert_eq!(aliased, alias_expected);
        }
    }

    /// Rendered values match a direct evaluation of the patch, and a second
    /// compile produces the same program and bit-identical buffers.
    #[test]
    fn render_matches_reference(patch in patch_strategy()) {
        let built = build(&patch);
        let ids = built.ids.clone();
        let expected = built.expected.clone();

        let mut first = Renderer::new(built.graph, BLOCK);
        let seq_a = first.compile().unwrap();
        first.process(BLOCK);
        for (i, &id) in ids.iter().enumerate() {
            let out = first.read_output(OutputPort::<f32>::new(id, 0)).unwrap();
            let tolerance = 1e-4 * expected[i].abs().max(1.0);
            prop_assert!(
                out.iter().all(|&v| (v - expected[i]).abs() <= tolerance),
                "node {} rendered {:?}, expected {}", i, out[0], expected[i]
            );
        }

        let snapshot: Vec<Vec<f32>> = ids
            .iter()
            .map(|&id| first.read_output(OutputPort::<f32>::new(id, 0)).unwrap().to_vec())
            .collect();
        let seq_b = first.compile().unwrap();
        prop_assert_eq!(&*seq_a, &*seq_b);
        first.process(BLOCK);
        for (i, &id) in ids.iter().enumerate() {
            let out = first.read_output(OutputPort::<f32>::new(id, 0)).unwrap();
            prop_assert!(
                out.iter().zip(&snapshot[i]).all(|(a, b)| a.to_bits() == b.to_bits())
            );
        }
    }
}
