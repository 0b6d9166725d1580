// src/voice_allocator.rs

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::AllocatorConfig;
use crate::error::{AllocError, ConfigError};
use crate::event::GestureEvent;
use crate::render::{KeyCue, key_cue};
use crate::tone_generator::{PITCH_BEND_CENTER, ToneGenerator, clamp_bend, pitch_bend_value};
use crate::voice::{ChannelId, GestureId, NoteId, Voice};

/// Every audible note and the voice playing it.
///
/// Invariants:
/// - keys are exactly the notes currently sounding on the generator
/// - each voice owns one channel and no two voices share a channel
///
/// Only the allocator mutates the table. Everyone else gets `&VoiceTable`.
#[derive(Debug, Default, Clone)]
pub struct VoiceTable {
    voices: BTreeMap<NoteId, Voice>,
}

impl VoiceTable {
    pub fn get(&self, note: NoteId) -> Option<&Voice> {
        self.voices.get(&note)
    }

    /// Voices in ascending note order.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> + '_ {
        self.voices.values()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn contains(&self, note: NoteId) -> bool {
        self.voices.contains_key(&note)
    }

    /// Channels owned by a voice, in ascending note order.
    pub fn channels_in_use(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.voices.values().map(|v| v.channel)
    }

    fn is_channel_free(&self, channel: ChannelId) -> bool {
        !self.voices.values().any(|v| v.channel == channel)
    }
}

/// Maps gestures onto a fixed pool of tone generator channels.
///
/// Responsibilities:
/// - give each sounding note exactly one channel
/// - track which gesture (or the hold pedal) keeps each note alive
/// - keep the generator's per-channel bend in sync with each voice
///
/// Does NOT:
/// - steal channels (a full pool rejects the new note)
/// - block or queue
/// - keep an index from gesture to note; lookups scan the table
pub struct VoiceAllocator<G: ToneGenerator, C: Clock = MonotonicClock> {
    config: AllocatorConfig,
    generator: G,
    clock: C,
    table: VoiceTable,
}

impl<G: ToneGenerator> VoiceAllocator<G, MonotonicClock> {
    pub fn new(config: AllocatorConfig, generator: G) -> Result<Self, ConfigError> {
        Self::with_clock(config, generator, MonotonicClock::new())
    }
}

impl<G: ToneGenerator, C: Clock> VoiceAllocator<G, C> {
    pub fn with_clock(
        config: AllocatorConfig,
        generator: G,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            clock,
            table: VoiceTable::default(),
        })
    }

    /// Start (or re-strike) `note` for `gesture`.
    ///
    /// A note that is already sounding keeps its channel and its current
    /// bend; only a new start-note is sent. Otherwise the lowest free
    /// channel is bent to `bend` and started.
    ///
    /// Returns the channel playing the note.
    pub fn play(
        &mut self,
        gesture: GestureId,
        note: NoteId,
        bend: f32,
    ) -> Result<ChannelId, AllocError> {
        let velocity = self.config.velocity;

        if let Some(voice) = self.table.voices.get_mut(&note) {
            self.generator.start_note(voice.channel, note, velocity);
            voice.touch(gesture);
            debug!(
                "retouch note {} on channel {} by gesture {}",
                note, voice.channel, gesture
            );
            return Ok(voice.channel);
        }

        let Some(channel) = self.free_channel() else {
            warn!("no free channel, dropping note {} for gesture {}", note, gesture);
            return Err(AllocError::ChannelsExhausted { note });
        };

        let bend = clamp_bend(bend, self.config.max_note_bend);
        self.generator.set_pitch_bend(channel, pitch_bend_value(bend, self.config.max_note_bend));
        self.generator.start_note(channel, note, velocity);
        self.table
            .voices
            .insert(note, Voice::new(note, channel, gesture, bend));
        debug!("note {} on channel {} by gesture {}", note, channel, gesture);

        Ok(channel)
    }

    /// Stop every note held by `gesture`. Sustained notes are unaffected.
    pub fn release(&mut self, gesture: GestureId) {
        self.stop_where(|voice| voice.state.is_touched_by(gesture));
    }

    /// Bend a sounding note. No-op for silent notes.
    pub fn bend(&mut self, note: NoteId, amount: f32) {
        if let Some(voice) = self.table.voices.get_mut(&note) {
            let amount = clamp_bend(amount, self.config.max_note_bend);
            self.generator.set_pitch_bend(
                voice.channel,
                pitch_bend_value(amount, self.config.max_note_bend),
            );
            voice.bend = amount;
        }
    }

    /// Return every sounding voice to zero bend.
    pub fn unbend_all(&mut self) {
        for voice in self.table.voices.values_mut() {
            self.generator.set_pitch_bend(voice.channel, PITCH_BEND_CENTER);
            voice.bend = 0.0;
        }
    }

    /// Hold pedal down: every touched voice becomes sustained from now on,
    /// independent of the gesture that started it.
    pub fn sustain_all(&mut self) {
        let now = self.clock.now();
        let mut sustained = 0;
        for voice in self.table.voices.values_mut() {
            if voice.sustain(now) {
                sustained += 1;
            }
        }
        if sustained > 0 {
            debug!("sustaining {} voices at {:.3}", sustained, now);
        }
    }

    /// Hold pedal up: stop every sustained voice.
    pub fn release_sustained(&mut self) {
        self.stop_where(|voice| voice.state.is_sustaining());
    }

    /// Stop everything, whatever holds it.
    pub fn all_notes_off(&mut self) {
        self.stop_where(|_| true);
    }

    /// Apply one gesture source event.
    pub fn handle(&mut self, event: GestureEvent) -> Result<(), AllocError> {
        match event {
            GestureEvent::Touch {
                gesture,
                note,
                bend,
            } => {
                self.play(gesture, note, bend)?;
            }

            GestureEvent::Release { gesture } => self.release(gesture),

            GestureEvent::BendUpdate { note, bend } => self.bend(note, bend),

            GestureEvent::Unbend => self.unbend_all(),

            GestureEvent::SustainPedalDown => self.sustain_all(),

            GestureEvent::SustainPedalUp => self.release_sustained(),
        }
        Ok(())
    }

    /// Read-only view for the renderer.
    pub fn snapshot(&self) -> &VoiceTable {
        &self.table
    }

    /// Visual cue for `note` at the allocator's current time.
    pub fn key_cue(&self, note: NoteId) -> KeyCue {
        key_cue(&self.table, note, self.clock.now(), &self.config)
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    /// Number of currently sounding voices.
    pub fn active_count(&self) -> usize {
        self.table.len()
    }

    /// Lowest-numbered channel not owned by any voice.
    fn free_channel(&self) -> Option<ChannelId> {
        (0..self.config.channels)
            .map(|c| c as ChannelId)
            .find(|&c| self.table.is_channel_free(c))
    }

    fn stop_where<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&Voice) -> bool,
    {
        let generator = &mut self.generator;
        self.table.voices.retain(|_, voice| {
            if predicate(voice) {
                generator.stop_note(voice.channel, voice.note);
                debug!("stop note {} on channel {}", voice.note, voice.channel);
                false
            } else {
                true
            }
        });
    }
}

impl<G: ToneGenerator, C: Clock> Drop for VoiceAllocator<G, C> {
    fn drop(&mut self) {
        self.all_notes_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tone_generator::{CommandBuffer, ToneCommand};
    use crate::voice::PlayState;
    use std::collections::HashSet;

    const NOTE_A: NoteId = 60;
    const NOTE_B: NoteId = 62;
    const NOTE_C: NoteId = 64;

    fn allocator(channels: usize) -> VoiceAllocator<CommandBuffer, ManualClock> {
        VoiceAllocator::with_clock(
            AllocatorConfig::with_channels(channels),
            CommandBuffer::new(),
            ManualClock::new(0.0),
        )
        .expect("valid config")
    }

    fn drain(alloc: &mut VoiceAllocator<CommandBuffer, ManualClock>) -> Vec<ToneCommand> {
        alloc.generator_mut().drain()
    }

    fn assert_channels_unique(alloc: &VoiceAllocator<CommandBuffer, ManualClock>) {
        let channels: HashSet<ChannelId> = alloc.snapshot().channels_in_use().collect();
        assert_eq!(channels.len(), alloc.snapshot().len());
        for voice in alloc.snapshot().iter() {
            assert!((voice.channel as usize) < alloc.config().channels);
        }
    }

    #[test]
    fn test_play_assigns_lowest_channel() {
        let mut alloc = allocator(4);
        assert_eq!(alloc.play(1, NOTE_A, 0.0), Ok(0));
        assert_eq!(alloc.play(2, NOTE_B, 1.0), Ok(1));

        assert_eq!(
            drain(&mut alloc),
            vec![
                ToneCommand::PitchBend {
                    channel: 0,
                    value: 8192
                },
                ToneCommand::StartNote {
                    channel: 0,
                    note: NOTE_A,
                    velocity: 127
                },
                ToneCommand::PitchBend {
                    channel: 1,
                    value: 10240
                },
                ToneCommand::StartNote {
                    channel: 1,
                    note: NOTE_B,
                    velocity: 127
                },
            ]
        );

        let voice = alloc.snapshot().get(NOTE_B).unwrap();
        assert_eq!(voice.state, PlayState::Touching(2));
        assert_eq!(voice.bend, 1.0);
        assert_channels_unique(&alloc);
    }

    #[test]
    fn test_freed_channel_is_reused_lowest_first() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.play(2, NOTE_B, 0.0).unwrap();
        alloc.play(3, NOTE_C, 0.0).unwrap();
        alloc.release(1);

        assert_eq!(alloc.play(4, 67, 0.0), Ok(0));
        assert_channels_unique(&alloc);
    }

    #[test]
    fn test_retouch_reuses_channel() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.bend(NOTE_A, 1.5);
        drain(&mut alloc);

        assert_eq!(alloc.play(2, NOTE_A, -3.0), Ok(0));

        // only a start-note; the previous bend stays
        assert_eq!(
            drain(&mut alloc),
            vec![ToneCommand::StartNote {
                channel: 0,
                note: NOTE_A,
                velocity: 127
            }]
        );
        let voice = alloc.snapshot().get(NOTE_A).unwrap();
        assert_eq!(voice.state, PlayState::Touching(2));
        assert_eq!(voice.bend, 1.5);
        assert_eq!(alloc.active_count(), 1);
    }

    #[test]
    fn test_retouch_takes_over_sustained_note() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.sustain_all();
        alloc.play(2, NOTE_A, 0.0).unwrap();
        assert_eq!(
            alloc.snapshot().get(NOTE_A).unwrap().state,
            PlayState::Touching(2)
        );

        alloc.release_sustained();
        assert!(alloc.snapshot().contains(NOTE_A));
        alloc.release(2);
        assert!(alloc.snapshot().is_empty());
    }

    #[test]
    fn test_pool_of_two_exhausts() {
        let mut alloc = allocator(2);
        assert_eq!(alloc.play(1, NOTE_A, 0.0), Ok(0));
        assert_eq!(alloc.play(2, NOTE_B, 0.0), Ok(1));
        drain(&mut alloc);

        assert_eq!(
            alloc.play(3, NOTE_C, 0.0),
            Err(AllocError::ChannelsExhausted { note: NOTE_C })
        );

        assert!(drain(&mut alloc).is_empty());
        assert_eq!(alloc.active_count(), 2);
        assert_eq!(alloc.snapshot().get(NOTE_A).unwrap().channel, 0);
        assert_eq!(alloc.snapshot().get(NOTE_B).unwrap().channel, 1);
        assert!(!alloc.snapshot().contains(NOTE_C));
    }

    #[test]
    fn test_full_pool_exhausts_after_n_notes() {
        let mut alloc = allocator(128);
        for note in 0..128u8 {
            assert_eq!(alloc.play(note as GestureId, note, 0.0), Ok(note));
        }
        assert_channels_unique(&alloc);

        assert_eq!(
            alloc.play(500, 0, 0.0),
            Ok(0),
            "retouch still works on a full pool"
        );

        // every note is voiced, so exhaust with a smaller pool instead
        let mut alloc = allocator(3);
        for note in [10, 20, 30] {
            alloc.play(1, note, 0.0).unwrap();
        }
        assert!(alloc.play(1, 40, 0.0).is_err());
        assert_eq!(alloc.active_count(), 3);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.play(1, NOTE_B, 0.0).unwrap();
        alloc.play(2, NOTE_C, 0.0).unwrap();
        drain(&mut alloc);

        alloc.release(1);
        assert_eq!(
            drain(&mut alloc),
            vec![
                ToneCommand::StopNote {
                    channel: 0,
                    note: NOTE_A
                },
                ToneCommand::StopNote {
                    channel: 1,
                    note: NOTE_B
                },
            ]
        );

        alloc.release(1);
        alloc.release(99);
        assert!(drain(&mut alloc).is_empty());
        assert_eq!(alloc.active_count(), 1);
        assert!(alloc.snapshot().contains(NOTE_C));
    }

    #[test]
    fn test_bend_unknown_note_is_noop() {
        let mut alloc = allocator(4);
        alloc.bend(NOTE_A, 2.0);
        assert!(drain(&mut alloc).is_empty());
        assert!(alloc.snapshot().is_empty());
    }

    #[test]
    fn test_bend_keeps_play_state_and_clamps() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        drain(&mut alloc);

        alloc.bend(NOTE_A, 9.0);
        assert_eq!(
            drain(&mut alloc),
            vec![ToneCommand::PitchBend {
                channel: 0,
                value: 16383
            }]
        );
        let voice = alloc.snapshot().get(NOTE_A).unwrap();
        assert_eq!(voice.bend, 4.0);
        assert_eq!(voice.state, PlayState::Touching(1));
    }

    #[test]
    fn test_bend_then_unbend_all() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.play(2, NOTE_B, 0.0).unwrap();
        alloc.bend(NOTE_A, 2.0);
        drain(&mut alloc);

        alloc.unbend_all();

        assert_eq!(alloc.snapshot().get(NOTE_A).unwrap().bend, 0.0);
        assert_eq!(alloc.snapshot().get(NOTE_B).unwrap().bend, 0.0);
        assert_eq!(
            drain(&mut alloc),
            vec![
                ToneCommand::PitchBend {
                    channel: 0,
                    value: 8192
                },
                ToneCommand::PitchBend {
                    channel: 1,
                    value: 8192
                },
            ]
        );
    }

    #[test]
    fn test_sustain_survives_gesture_release() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.clock().set(2.5);
        alloc.sustain_all();
        alloc.release(1);

        assert_eq!(
            alloc.snapshot().get(NOTE_A).unwrap().state,
            PlayState::Sustaining { since: 2.5 }
        );

        drain(&mut alloc);
        alloc.release_sustained();
        assert!(alloc.snapshot().is_empty());
        assert_eq!(
            drain(&mut alloc),
            vec![ToneCommand::StopNote {
                channel: 0,
                note: NOTE_A
            }]
        );
    }

    #[test]
    fn test_sustain_keeps_channel_and_bend() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.play(2, NOTE_B, -1.0).unwrap();
        drain(&mut alloc);

        alloc.sustain_all();
        assert!(drain(&mut alloc).is_empty());

        let voice = alloc.snapshot().get(NOTE_B).unwrap();
        assert_eq!(voice.channel, 1);
        assert_eq!(voice.bend, -1.0);
        assert!(voice.state.is_sustaining());
    }

    #[test]
    fn test_release_sustained_leaves_touched_notes() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 0.0).unwrap();
        alloc.sustain_all();
        alloc.play(2, NOTE_B, 0.0).unwrap();

        alloc.release_sustained();
        assert!(!alloc.snapshot().contains(NOTE_A));
        assert_eq!(
            alloc.snapshot().get(NOTE_B).unwrap().state,
            PlayState::Touching(2)
        );

        // the freed channel goes to the next new note
        assert_eq!(alloc.play(3, NOTE_C, 0.0), Ok(0));
    }

    #[test]
    fn test_handle_dispatches_events() {
        let mut alloc = allocator(1);
        let events = [
            GestureEvent::Touch {
                gesture: 1,
                note: NOTE_A,
                bend: 0.0,
            },
            GestureEvent::BendUpdate {
                note: NOTE_A,
                bend: 1.0,
            },
            GestureEvent::SustainPedalDown,
            GestureEvent::Release { gesture: 1 },
        ];
        for event in events {
            alloc.handle(event).unwrap();
        }
        let voice = alloc.snapshot().get(NOTE_A).unwrap();
        assert!(voice.state.is_sustaining());
        assert_eq!(voice.bend, 1.0);

        assert_eq!(
            alloc.handle(GestureEvent::Touch {
                gesture: 2,
                note: NOTE_B,
                bend: 0.0
            }),
            Err(AllocError::ChannelsExhausted { note: NOTE_B })
        );

        alloc.handle(GestureEvent::Unbend).unwrap();
        assert_eq!(alloc.snapshot().get(NOTE_A).unwrap().bend, 0.0);

        alloc.handle(GestureEvent::SustainPedalUp).unwrap();
        assert!(alloc.snapshot().is_empty());
    }

    #[test]
    fn test_key_cue_follows_clock() {
        let mut alloc = allocator(4);
        alloc.play(1, NOTE_A, 2.0).unwrap();
        assert_eq!(alloc.key_cue(NOTE_A).opacity, 1.0);
        assert_eq!(alloc.key_cue(NOTE_A).saturation, 0.5);
        assert_eq!(alloc.key_cue(NOTE_B), KeyCue::SILENT);

        alloc.sustain_all();
        alloc.clock().advance(2.0);
        assert!((alloc.key_cue(NOTE_A).opacity - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_drop_stops_everything() {
        let mut buffer = CommandBuffer::new();
        {
            let mut alloc = VoiceAllocator::with_clock(
                AllocatorConfig::with_channels(4),
                &mut buffer,
                ManualClock::default(),
            )
            .unwrap();
            alloc.play(1, NOTE_A, 0.0).unwrap();
            alloc.sustain_all();
            alloc.play(2, NOTE_B, 0.0).unwrap();
        }
        let stops = buffer
            .commands()
            .iter()
            .filter(|c| matches!(c, ToneCommand::StopNote { .. }))
            .count();
        assert_eq!(stops, 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = VoiceAllocator::with_clock(
            AllocatorConfig::with_channels(0),
            CommandBuffer::new(),
            ManualClock::default(),
        );
        assert!(matches!(result, Err(ConfigError::NoChannels)));
    }

    #[test]
    fn test_invariant_holds_through_mixed_traffic() {
        let mut alloc = allocator(3);
        for step in 0..200i64 {
            let note = ((step * 7) % 11) as NoteId + 50;
            match step % 5 {
                0 | 1 => {
                    let _ = alloc.play(step % 4, note, 0.0);
                }
                2 => alloc.release(step % 4),
                3 => alloc.sustain_all(),
                _ => alloc.release_sustained(),
            }
            assert_channels_unique(&alloc);
            assert!(alloc.active_count() <= 3);
        }
    }
}
