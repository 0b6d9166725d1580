// src/render.rs
//
// Visual feedback derived from allocator state.
//
// The renderer reads a snapshot on its own clock tick and turns each
// key's voice into an intensity and a color saturation. Nothing here
// mutates allocator state.

use crate::config::AllocatorConfig;
use crate::voice::{NoteId, PlayState, Timestamp, Voice};
use crate::voice_allocator::VoiceTable;

/// How a key should be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyCue {
    /// 1.0 while touched, fading while sustained, 0.0 when silent.
    pub opacity: f64,
    /// 1.0 unbent, dropping toward 0.0 at full bend.
    pub saturation: f64,
}

impl KeyCue {
    pub const SILENT: KeyCue = KeyCue {
        opacity: 0.0,
        saturation: 1.0,
    };

    pub fn for_voice(voice: &Voice, now: Timestamp, config: &AllocatorConfig) -> Self {
        let opacity = match voice.state {
            PlayState::Touching(_) => 1.0,
            PlayState::Sustaining { since } => {
                let progress = ((now - since).max(0.0) / config.sustain_fade).min(1.0);
                (1.0 - progress) * (1.0 - config.min_opacity) + config.min_opacity
            }
        };
        let saturation = 1.0 - (voice.bend.abs() / config.max_note_bend) as f64;

        Self {
            opacity,
            saturation: saturation.clamp(0.0, 1.0),
        }
    }
}

/// Cue for `note` as of `now`.
pub fn key_cue(
    table: &VoiceTable,
    note: NoteId,
    now: Timestamp,
    config: &AllocatorConfig,
) -> KeyCue {
    table
        .get(note)
        .map(|voice| KeyCue::for_voice(voice, now, config))
        .unwrap_or(KeyCue::SILENT)
}
