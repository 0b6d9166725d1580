// src/main.rs
//
// Sanity run: replays a few gesture sequences against a tone generator that
// prints every command it receives.

use isomorf::{
    AllocatorConfig, ChannelId, GestureEvent, ManualClock, NoteId, ToneGenerator, VoiceAllocator,
    note_from_key,
};

/// Tone generator that prints instead of playing.
struct PrintingGenerator;

impl ToneGenerator for PrintingGenerator {
    fn start_note(&mut self, channel: ChannelId, note: NoteId, velocity: u8) {
        println!("  start  ch {:3} note {:3} vel {}", channel, note, velocity);
    }

    fn stop_note(&mut self, channel: ChannelId, note: NoteId) {
        println!("  stop   ch {:3} note {:3}", channel, note);
    }

    fn set_pitch_bend(&mut self, channel: ChannelId, value: u16) {
        println!("  bend   ch {:3} value {}", channel, value);
    }
}

fn run(name: &str, channels: usize, events: &[(f64, GestureEvent)]) {
    println!("--- {} ({} channels) ---", name, channels);

    let mut allocator = match VoiceAllocator::with_clock(
        AllocatorConfig::with_channels(channels),
        PrintingGenerator,
        ManualClock::default(),
    ) {
        Ok(allocator) => allocator,
        Err(e) => {
            println!("invalid config: {}", e);
            return;
        }
    };

    for (time, event) in events {
        allocator.clock().set(*time);
        println!("{:5.2}s {:?}", time, event);
        if let Err(e) = allocator.handle(*event) {
            println!("  dropped: {}", e);
        }
    }

    for voice in allocator.snapshot().iter() {
        let cue = allocator.key_cue(voice.note);
        println!(
            "  left sounding: note {} ch {} {:?} opacity {:.2} saturation {:.2}",
            voice.note, voice.channel, voice.state, cue.opacity, cue.saturation
        );
    }
}

fn main() {
    println!("Starting allocator sanity test...");

    let (Some(a), Some(b), Some(c)) = (note_from_key(62), note_from_key(64), note_from_key(66))
    else {
        return;
    };

    run(
        "exhaustion",
        2,
        &[
            (
                0.0,
                GestureEvent::Touch {
                    gesture: 1,
                    note: a,
                    bend: 0.0,
                },
            ),
            (
                0.1,
                GestureEvent::Touch {
                    gesture: 2,
                    note: b,
                    bend: 0.0,
                },
            ),
            (
                0.2,
                GestureEvent::Touch {
                    gesture: 3,
                    note: c,
                    bend: 0.0,
                },
            ),
            (0.3, GestureEvent::Release { gesture: 1 }),
            (0.4, GestureEvent::Release { gesture: 2 }),
        ],
    );

    run(
        "sustain",
        128,
        &[
            (
                0.0,
                GestureEvent::Touch {
                    gesture: 1,
                    note: a,
                    bend: 0.0,
                },
            ),
            (0.2, GestureEvent::BendUpdate { note: a, bend: 2.0 }),
            (0.4, GestureEvent::SustainPedalDown),
            (0.5, GestureEvent::Release { gesture: 1 }),
            (0.6, GestureEvent::Unbend),
            (
                0.9,
                GestureEvent::Touch {
                    gesture: 2,
                    note: b,
                    bend: -1.0,
                },
            ),
        ],
    );

    println!("Sanity test completed.");
}
