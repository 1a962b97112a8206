//! Polyphonic voice pool.
//!
//! A polyphonic patch instantiates the same module chain once per voice. The
//! pool tracks which chain plays which note, steals voices when all are busy,
//! and drives each chain's `Gate` and `Pitch` units on note events.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use rackwire_core::{ModuleGraph, ModuleId, Renderer, VoiceAllocator, VoiceHandle, VoiceState};

use crate::unit::Unit;

/// Which voice to steal when every voice is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceAllocationMode {
    /// Cycle through voices in order (default)
    #[default]
    RoundRobin,
    /// Steal the oldest note
    OldestNote,
    /// Steal the lowest pitch voice
    LowestNote,
    /// Steal the highest pitch voice
    HighestNote,
}

/// The modules of one voice chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceChain {
    /// Every module of the chain; all are reset when the voice is reassigned.
    pub modules: Vec<ModuleId>,
    /// The `Gate` unit opened by note-on.
    pub gate: ModuleId,
    /// The `Pitch` unit tuned by note-on.
    pub pitch: ModuleId,
    /// The `Envelope` whose release ends the voice, if any.
    pub envelope: Option<ModuleId>,
}

#[derive(Debug)]
struct Slot {
    chain: VoiceChain,
    state: VoiceState,
    age: u64,
}

/// Voice allocator over a fixed set of module chains.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = VoicePool::new(VoiceAllocationMode::OldestNote);
/// for chain in chains {
///     pool.add_voice(chain).unwrap();
/// }
/// pool.note_on(&mut renderer, 60);
/// renderer.process(256);
/// pool.note_off(&mut renderer, 60);
/// ```
#[derive(Debug, Default)]
pub struct VoicePool {
    slots: Vec<Slot>,
    mode: VoiceAllocationMode,
    /// Global voice age counter
    age_counter: u64,
    /// Round-robin index
    round_robin_idx: usize,
}

impl VoicePool {
    /// Creates an empty pool.
    pub fn new(mode: VoiceAllocationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Adds a voice chain and returns its handle, or `None` once every
    /// handle index is taken.
    pub fn add_voice(&mut self, chain: VoiceChain) -> Option<VoiceHandle> {
        let handle = VoiceHandle::new(u16::try_from(self.slots.len()).ok()?);
        self.slots.push(Slot {
            chain,
            state: VoiceState::Idle,
            age: 0,
        });
        Some(handle)
    }

    /// Set voice allocation mode.
    pub fn set_allocation_mode(&mut self, mode: VoiceAllocationMode) {
        self.mode = mode;
    }

    /// Get current allocation mode.
    pub fn allocation_mode(&self) -> VoiceAllocationMode {
        self.mode
    }

    /// Number of voices.
    pub fn voice_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of voices that are not idle.
    pub fn active_voice_count(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_sounding()).count()
    }

    /// The chain behind `voice`.
    pub fn chain(&self, voice: VoiceHandle) -> Option<&VoiceChain> {
        self.slots.get(voice.index()).map(|s| &s.chain)
    }

    /// Finds the voice currently holding `note` (not releasing).
    pub fn voice_for_note(&self, note: u8) -> Option<VoiceHandle> {
        self.slots
            .iter()
            .position(|s| s.state == VoiceState::Active { note })
            .map(|i| VoiceHandle::new(i as u16))
    }

    /// Starts `note` on a free or stolen voice: resets the chain, tunes its
    /// `Pitch` and opens its `Gate`. Returns `None` if the pool is empty.
    pub fn note_on(&mut self, renderer: &mut Renderer<Unit>, note: u8) -> Option<VoiceHandle> {
        let voice = self.allocate_voice()?;
        renderer.reset_voice(&*self, voice);

        let slot = &mut self.slots[voice.index()];
        slot.state = VoiceState::Active { note };
        let graph = renderer.graph_mut();
        if let Some(Unit::Pitch(pitch)) = graph.module_mut(slot.chain.pitch) {
            pitch.set_note(note);
        }
        set_gate(graph, slot.chain.gate, true);
        Some(voice)
    }

    /// Closes the gate of the voice holding `note`. The voice keeps sounding
    /// until [`reap`](Self::reap) sees its envelope finish.
    pub fn note_off(&mut self, renderer: &mut Renderer<Unit>, note: u8) {
        let Some(voice) = self.voice_for_note(note) else {
            return;
        };
        let slot = &mut self.slots[voice.index()];
        slot.state = VoiceState::Releasing { note };
        set_gate(renderer.graph_mut(), slot.chain.gate, false);
    }

    /// Frees releasing voices whose envelope has gone idle. Voices without an
    /// envelope are freed immediately.
    pub fn reap(&mut self, graph: &ModuleGraph<Unit>) {
        for slot in &mut self.slots {
            if !matches!(slot.state, VoiceState::Releasing { .. }) {
                continue;
            }
            let finished = match slot.chain.envelope.map(|id| graph.module(id)) {
                Some(Some(Unit::Envelope(env))) => env.is_idle(),
                _ => true,
            };
            if finished {
                slot.state = VoiceState::Idle;
            }
        }
    }

    /// Silences every voice immediately.
    pub fn all_notes_off(&mut self, renderer: &mut Renderer<Unit>) {
        for index in 0..self.slots.len() {
            let voice = VoiceHandle::new(index as u16);
            renderer.reset_voice(&*self, voice);
            set_gate(renderer.graph_mut(), self.slots[index].chain.gate, false);
            self.slots[index].state = VoiceState::Idle;
        }
    }

    /// Forgets ages and the round-robin position.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.state = VoiceState::Idle;
            slot.age = 0;
        }
        self.age_counter = 0;
        self.round_robin_idx = 0;
    }

    fn pick(&mut self) -> Option<usize> {
        let count = self.slots.len();
        if count == 0 {
            return None;
        }
        if let Some(free) = self.slots.iter().position(|s| !s.state.is_sounding()) {
            return Some(free);
        }

        let index = match self.mode {
            VoiceAllocationMode::RoundRobin => {
                let idx = self.round_robin_idx;
                self.round_robin_idx = (self.round_robin_idx + 1) % count;
                idx
            }
            VoiceAllocationMode::OldestNote => self
                .slots
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.age)
                .map_or(0, |(i, _)| i),
            VoiceAllocationMode::LowestNote => self
                .slots
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.state.note())
                .map_or(0, |(i, _)| i),
            VoiceAllocationMode::HighestNote => self
                .slots
                .iter()
                .enumerate()
                .max_by_key(|(_, s)| s.state.note())
                .map_or(0, |(i, _)| i),
        };
        Some(index)
    }
}

fn set_gate(graph: &mut ModuleGraph<Unit>, id: ModuleId, open: bool) {
    if let Some(Unit::Gate(gate)) = graph.module_mut(id) {
        gate.set_open(open);
    }
}

impl VoiceAllocator for VoicePool {
    /// Picks a free voice, or steals one per the allocation mode, and marks
    /// it active. [`note_on`](VoicePool::note_on) records the note.
    fn allocate_voice(&mut self) -> Option<VoiceHandle> {
        let index = self.pick()?;
        self.age_counter += 1;
        let slot = &mut self.slots[index];
        slot.age = self.age_counter;
        slot.state = VoiceState::Active {
            note: slot.state.note().unwrap_or(0),
        };
        Some(VoiceHandle::new(index as u16))
    }

    fn release_voice(&mut self, voice: VoiceHandle) {
        if let Some(slot) = self.slots.get_mut(voice.index()) {
            slot.state = VoiceState::Idle;
        }
    }

    fn voice_state(&self, voice: VoiceHandle) -> VoiceState {
        self.slots
            .get(voice.index())
            .map_or(VoiceState::Idle, |s| s.state)
    }

    fn voice_modules(&self, voice: VoiceHandle) -> &[ModuleId] {
        self.slots
            .get(voice.index())
            .map(|s| s.chain.modules.as_slice())
            .unwrap_or(&[])
    }
}
