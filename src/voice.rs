// src/voice.rs

/// Pitch identity sent to the tone generator (MIDI note domain, 0-127).
pub type NoteId = u8;

/// Opaque id of one continuous touch interaction.
pub type GestureId = i64;

/// Playback slot on the tone generator.
pub type ChannelId = u8;

/// Seconds on the allocator's clock.
pub type Timestamp = f64;

/// Offset between layout key numbers and note ids.
const KEY_NOTE_OFFSET: i32 = 2;

/// Convert a layout key number into the note it sounds.
///
/// Returns `None` for keys that fall outside the 0-127 note domain.
pub fn note_from_key(number: i32) -> Option<NoteId> {
    let note = number - KEY_NOTE_OFFSET;
    if (0..=127).contains(&note) {
        Some(note as NoteId)
    } else {
        None
    }
}

/// Inverse of [`note_from_key`].
pub fn key_from_note(note: NoteId) -> i32 {
    note as i32 + KEY_NOTE_OFFSET
}

/// Who is keeping a voice audible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayState {
    /// Held directly by a live gesture.
    Touching(GestureId),

    /// The gesture is gone; the hold pedal keeps the note sounding.
    /// `since` is when the pedal took over.
    Sustaining { since: Timestamp },
}

impl PlayState {
    #[inline]
    pub fn is_touching(&self) -> bool {
        matches!(self, PlayState::Touching(_))
    }

    #[inline]
    pub fn is_sustaining(&self) -> bool {
        matches!(self, PlayState::Sustaining { .. })
    }

    /// True if this voice is held by `gesture`.
    #[inline]
    pub fn is_touched_by(&self, gesture: GestureId) -> bool {
        matches!(self, PlayState::Touching(g) if *g == gesture)
    }
}

/// One channel's worth of live sound state.
///
/// Voices do NOT own any DSP. They only mirror what has been
/// commanded on the tone generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub note: NoteId,
    pub channel: ChannelId,
    pub state: PlayState,
    /// Last commanded pitch bend in semitones.
    pub bend: f32,
}

impl Voice {
    #[inline]
    pub fn new(note: NoteId, channel: ChannelId, gesture: GestureId, bend: f32) -> Self {
        Self {
            note,
            channel,
            state: PlayState::Touching(gesture),
            bend,
        }
    }

    /// Re-strike: the voice is owned by `gesture` again.
    #[inline]
    pub fn touch(&mut self, gesture: GestureId) {
        self.state = PlayState::Touching(gesture);
    }

    /// Hand a touched voice over to the hold pedal.
    ///
    /// Returns false if the voice was already sustaining, in which case the
    /// original `since` is kept.
    #[inline]
    pub fn sustain(&mut self, now: Timestamp) -> bool {
        if self.state.is_touching() {
            self.state = PlayState::Sustaining { since: now };
            true
        } else {
            false
        }
    }
}
