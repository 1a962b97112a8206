//! Voice allocation contract.
//!
//! The core owns no allocation policy. A polyphonic patch instantiates the
//! same module chain once per voice; an allocator hands out [`VoiceHandle`]s
//! and reports which modules belong to each voice, and the renderer uses that
//! module set to reset a voice's state when it is (re)assigned.

use crate::module::ModuleId;

/// Opaque handle to one voice of an allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceHandle(u16);

impl VoiceHandle {
    /// Creates a handle for voice `index`.
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the voice index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state of one voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// Free for allocation.
    #[default]
    Idle,
    /// Holding a note.
    Active {
        /// MIDI note number.
        note: u8,
    },
    /// Note released, tail still sounding.
    Releasing {
        /// MIDI note number.
        note: u8,
    },
}

impl VoiceState {
    /// Returns true unless the voice is idle.
    pub fn is_sounding(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Returns the note held or releasing, if any.
    pub fn note(self) -> Option<u8> {
        match self {
            Self::Idle => None,
            Self::Active { note } | Self::Releasing { note } => Some(note),
        }
    }
}

/// Source of voices for polyphonic patches.
pub trait VoiceAllocator {
    /// Picks a voice for a new note, or `None` if no voice can be given out.
    fn allocate_voice(&mut self) -> Option<VoiceHandle>;

    /// Returns a voice to the pool.
    fn release_voice(&mut self, voice: VoiceHandle);

    /// Current lifecycle state of `voice`.
    fn voice_state(&self, voice: VoiceHandle) -> VoiceState;

    /// The modules instantiated for `voice`.
    fn voice_modules(&self, voice: VoiceHandle) -> &[ModuleId];
}
