// src/event.rs

use crate::voice::{GestureId, NoteId};

/// An event from the gesture source.
///
/// These events:
/// - arrive in order on the input thread
/// - may be duplicated or arrive for notes/gestures that are already gone
/// - are applied by the allocator immediately and atomically
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// A gesture lands on (or slides onto) a note.
    Touch {
        gesture: GestureId,
        note: NoteId,
        bend: f32,
    },

    /// A gesture lifts.
    Release { gesture: GestureId },

    /// A held note is bent to `bend` semitones.
    BendUpdate { note: NoteId, bend: f32 },

    /// Every voice returns to zero bend.
    Unbend,

    /// Hold pedal pressed.
    SustainPedalDown,

    /// Hold pedal released.
    SustainPedalUp,
}
