// src/tone_generator.rs

use crate::voice::{ChannelId, NoteId};

/// Full 14-bit pitch bend range.
pub const MAX_PITCH_BEND: u16 = 16384;

/// Pitch bend value meaning "no bend".
pub const PITCH_BEND_CENTER: u16 = MAX_PITCH_BEND / 2;

/// The sound source the allocator drives.
///
/// Commands are fire-and-forget: the allocator assumes each call has
/// taken effect by the time it returns and never waits for an
/// acknowledgment.
pub trait ToneGenerator {
    fn start_note(&mut self, channel: ChannelId, note: NoteId, velocity: u8);

    fn stop_note(&mut self, channel: ChannelId, note: NoteId);

    /// `value` is a 14-bit bend, centered at [`PITCH_BEND_CENTER`].
    fn set_pitch_bend(&mut self, channel: ChannelId, value: u16);
}

impl<T: ToneGenerator + ?Sized> ToneGenerator for &mut T {
    fn start_note(&mut self, channel: ChannelId, note: NoteId, velocity: u8) {
        (**self).start_note(channel, note, velocity)
    }

    fn stop_note(&mut self, channel: ChannelId, note: NoteId) {
        (**self).stop_note(channel, note)
    }

    fn set_pitch_bend(&mut self, channel: ChannelId, value: u16) {
        (**self).set_pitch_bend(channel, value)
    }
}

/// Encode a bend in semitones as a 14-bit pitch bend value.
///
/// `max_note_bend` semitones span half of the bend range. Inputs are
/// clamped to `[-max_note_bend, max_note_bend]` and the result to the
/// representable range, so `+max_note_bend` lands on 16383.
pub fn pitch_bend_value(semitones: f32, max_note_bend: f32) -> u16 {
    if !max_note_bend.is_finite() || max_note_bend <= 0.0 {
        return PITCH_BEND_CENTER;
    }
    let center = PITCH_BEND_CENTER as f32;
    let diff = clamp_bend(semitones, max_note_bend);
    let value = diff * (center / max_note_bend) + center;
    (value as i32).clamp(0, MAX_PITCH_BEND as i32 - 1) as u16
}

/// Clamp a requested bend into the commandable range. NaN means no bend.
pub(crate) fn clamp_bend(semitones: f32, max_note_bend: f32) -> f32 {
    if semitones.is_nan() {
        0.0
    } else {
        semitones.clamp(-max_note_bend, max_note_bend)
    }
}

/// A single command issued to a tone generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneCommand {
    StartNote {
        channel: ChannelId,
        note: NoteId,
        velocity: u8,
    },

    StopNote {
        channel: ChannelId,
        note: NoteId,
    },

    PitchBend {
        channel: ChannelId,
        value: u16,
    },
}

impl ToneCommand {
    /// Numeric tag used when commands are flattened for foreign callers.
    pub fn kind(&self) -> u32 {
        match self {
            ToneCommand::StartNote { .. } => 0,
            ToneCommand::StopNote { .. } => 1,
            ToneCommand::PitchBend { .. } => 2,
        }
    }

    /// Flatten into `[kind, channel, a, b]`.
    ///
    /// StartNote: `a` = note, `b` = velocity.
    /// StopNote: `a` = note, `b` = 0.
    /// PitchBend: `a` = value, `b` = 0.
    pub fn to_words(&self) -> [u32; 4] {
        match *self {
            ToneCommand::StartNote {
                channel,
                note,
                velocity,
            } => [self.kind(), channel as u32, note as u32, velocity as u32],
            ToneCommand::StopNote { channel, note } => {
                [self.kind(), channel as u32, note as u32, 0]
            }
            ToneCommand::PitchBend { channel, value } => {
                [self.kind(), channel as u32, value as u32, 0]
            }
        }
    }
}

/// Tone generator that queues commands instead of playing them.
///
/// Used wherever the host pulls commands rather than receiving calls
/// (the web bindings), and as the fake generator in tests.
#[derive(Debug, Default, Clone)]
pub struct CommandBuffer {
    commands: Vec<ToneCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands issued since the last drain.
    pub fn commands(&self) -> &[ToneCommand] {
        &self.commands
    }

    /// Take all queued commands, oldest first.
    pub fn drain(&mut self) -> Vec<ToneCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl ToneGenerator for CommandBuffer {
    fn start_note(&mut self, channel: ChannelId, note: NoteId, velocity: u8) {
        self.commands.push(ToneCommand::StartNote {
            channel,
            note,
            velocity,
        });
    }

    fn stop_note(&mut self, channel: ChannelId, note: NoteId) {
        self.commands.push(ToneCommand::StopNote { channel, note });
    }

    fn set_pitch_bend(&mut self, channel: ChannelId, value: u16) {
        self.commands.push(ToneCommand::PitchBend { channel, value });
    }
}
