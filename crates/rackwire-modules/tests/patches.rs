//! End-to-end patches built from concrete units.

use rackwire_core::{Action, Link, ModuleGraph, ModuleId, OutputPort, Renderer, VoiceAllocator};
use rackwire_modules::{Unit, VoiceAllocationMode, VoiceChain, VoicePool, Waveform};

const SR: f32 = 48000.0;
const BLOCK: usize = 128;

fn out(renderer: &Renderer<Unit>, id: ModuleId) -> &[f32] {
    renderer.read_output(OutputPort::<f32>::new(id, 0)).unwrap()
}

#[test]
fn oscillator_through_gain_into_probe() {
    let mut graph = ModuleGraph::new();
    let osc = graph.add_module(Unit::oscillator(SR, 480.0)).unwrap();
    if let Some(Unit::Oscillator(o)) = graph.module_mut(osc) {
        o.set_waveform(Waveform::Square);
    }
    let vca = graph.add_module(Unit::gain(0.25)).unwrap();
    let probe = graph.add_module(Unit::probe()).unwrap();
    graph
        .connect(Link::new(
            graph.input::<f32>(vca, "in").unwrap(),
            graph.output::<f32>(osc, "out").unwrap(),
        ))
        .unwrap();
    graph
        .connect(Link::new(
            graph.input::<f32>(probe, "in").unwrap(),
            graph.output::<f32>(vca, "out").unwrap(),
        ))
        .unwrap();

    let mut renderer = Renderer::new(graph, BLOCK);
    let seq = renderer.compile().unwrap();
    assert_eq!(seq.counts().alias, 2);
    // The oscillator's unconnected hz input is cleared.
    assert_eq!(seq.counts().clear, 1);

    renderer.process(BLOCK);
    assert_eq!(out(&renderer, vca), out(&renderer, probe));
    match renderer.graph().module(probe) {
        Some(Unit::Probe(p)) => assert!(p.peak > 0.2 && p.peak <= 0.3, "{}", p.peak),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn mixer_sums_constants() {
    let mut graph = ModuleGraph::new();
    let mix = graph.add_module(Unit::mixer(2.0)).unwrap();
    for value in [1.0, 2.0, 3.0] {
        let c = graph.add_module(Unit::constant(value)).unwrap();
        graph
            .connect(Link::new(
                graph.input::<f32>(mix, "in").unwrap(),
                graph.output::<f32>(c, "out").unwrap(),
            ))
            .unwrap();
    }

    let mut renderer = Renderer::new(graph, BLOCK);
    let seq = renderer.compile().unwrap();
    let counts = seq.counts();
    assert_eq!((counts.copy, counts.add), (1, 2));
    renderer.process(BLOCK);
    assert!(out(&renderer, mix).iter().all(|&v| v == 12.0));
}

#[test]
fn pitch_drives_oscillator_like_fixed_frequency() {
    let mut graph = ModuleGraph::new();
    let pitch = graph.add_module(Unit::pitch(480.0)).unwrap();
    let driven = graph.add_module(Unit::oscillator(SR, 0.0)).unwrap();
    let fixed = graph.add_module(Unit::oscillator(SR, 480.0)).unwrap();
    graph
        .connect(Link::new(
            graph.input::<f64>(driven, "hz").unwrap(),
            graph.output::<f64>(pitch, "hz").unwrap(),
        ))
        .unwrap();

    let mut renderer = Renderer::new(graph, BLOCK);
    let seq = renderer.compile().unwrap();
    assert!(
        seq.prep()
            .iter()
            .any(|a| matches!(a, Action::Alias { .. }))
    );
    renderer.process(BLOCK);
    let a = out(&renderer, driven);
    let b = out(&renderer, fixed);
    assert!(a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5));
}

#[test]
fn polyphonic_patch_plays_and_releases() {
    let mut graph = ModuleGraph::new();
    let bus = graph.add_module(Unit::mixer(0.5)).unwrap();
    let mut chains = Vec::new();
    for _ in 0..4 {
        let pitch = graph.add_module(Unit::pitch(0.0)).unwrap();
        let gate = graph.add_module(Unit::gate(false)).unwrap();
        let osc = graph.add_module(Unit::oscillator(SR, 0.0)).unwrap();
        let env = graph.add_module(Unit::envelope(SR, 0.002, 0.01)).unwrap();
        graph
            .connect(Link::new(
                graph.input::<f64>(osc, "hz").unwrap(),
                graph.output::<f64>(pitch, "hz").unwrap(),
            ))
            .unwrap();
        graph
            .connect(Link::new(
                graph.input::<i32>(env, "gate").unwrap(),
                graph.output::<i32>(gate, "gate").unwrap(),
            ))
            .unwrap();
        graph
            .connect(Link::controlled(
                graph.input::<f32>(bus, "in").unwrap(),
                graph.output::<f32>(osc, "out").unwrap(),
                graph.output::<f32>(env, "out").unwrap(),
                1.0,
            ))
            .unwrap();
        chains.push(VoiceChain {
            modules: vec![pitch, gate, osc, env],
            gate,
            pitch,
            envelope: Some(env),
        });
    }
    let mut pool = VoicePool::new(VoiceAllocationMode::OldestNote);
    for chain in chains {
        pool.add_voice(chain).unwrap();
    }

    let mut renderer = Renderer::new(graph, BLOCK);
    renderer.compile().unwrap();

    renderer.process(BLOCK);
    assert!(out(&renderer, bus).iter().all(|&v| v == 0.0));

    let c = pool.note_on(&mut renderer, 60).unwrap();
    let e = pool.note_on(&mut renderer, 64).unwrap();
    assert_ne!(c, e);
    for _ in 0..4 {
        renderer.process(BLOCK);
    }
    assert!(out(&renderer, bus).iter().any(|&v| v.abs() > 0.1));

    pool.note_off(&mut renderer, 60);
    pool.note_off(&mut renderer, 64);
    for _ in 0..40 {
        renderer.process(BLOCK);
    }
    pool.reap(renderer.graph());
    assert_eq!(pool.active_voice_count(), 0);
    assert!(out(&renderer, bus).iter().all(|&v| v == 0.0));
    assert!(!pool.voice_state(c).is_sounding());
}
